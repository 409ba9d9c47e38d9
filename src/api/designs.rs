use std::future::Future;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::client::{ApiClient, ApiError, ApiRequest};
use crate::wizard::SelectionMap;

pub const GENERATE_PATH: &str = "/api/generate";
pub const SAVE_DESIGN_PATH: &str = "/api/save-design";
pub const MY_DESIGNS_PATH: &str = "/api/my-designs";
pub const DESIGNS_PATH: &str = "/api/designs";
pub const FUN_FACTS_PATH: &str = "/api/fun-facts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub image_url: String,
    pub prompt: String,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    #[serde(flatten)]
    pub selections: SelectionMap,
    pub model: String,
    pub num_images: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(rename = "imageUrls", default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDesignRequest {
    pub prompt: String,
    #[serde(rename = "temporaryImageUrl")]
    pub temporary_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunFact {
    pub text: String,
}

pub trait DesignApi: Clone + Send + Sync + 'static {
    fn generate_designs(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<GenerateResponse, ApiError>> + Send;

    fn save_design(
        &self,
        request: SaveDesignRequest,
    ) -> impl Future<Output = Result<DesignRecord, ApiError>> + Send;

    fn my_designs(&self) -> impl Future<Output = Result<Vec<DesignRecord>, ApiError>> + Send;

    fn delete_design(&self, design_id: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn toggle_favorite(
        &self,
        design_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn fun_fact(&self) -> impl Future<Output = Result<FunFact, ApiError>> + Send;
}

impl DesignApi for ApiClient {
    async fn generate_designs(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateResponse, ApiError> {
        debug!(model = %request.model, "requesting design generation");
        let body = to_body(&request)?;
        let value = self
            .send(ApiRequest::post(GENERATE_PATH).json_body(body))
            .await?;
        from_value(value)
    }

    async fn save_design(&self, request: SaveDesignRequest) -> Result<DesignRecord, ApiError> {
        let body = to_body(&request)?;
        let value = self
            .send(ApiRequest::post(SAVE_DESIGN_PATH).json_body(body))
            .await?;
        from_value(value)
    }

    async fn my_designs(&self) -> Result<Vec<DesignRecord>, ApiError> {
        let value = self.send(ApiRequest::get(MY_DESIGNS_PATH)).await?;
        if !value.is_array() {
            return Err(ApiError::MalformedResponse(
                "Fetched data is not an array.".to_owned(),
            ));
        }
        from_value(value)
    }

    async fn delete_design(&self, design_id: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(DESIGNS_PATH).segment(design_id))
            .await?;
        Ok(())
    }

    async fn toggle_favorite(&self, design_id: &str) -> Result<(), ApiError> {
        self.send(
            ApiRequest::patch(DESIGNS_PATH)
                .segment(design_id)
                .segment("favorite")
                .json_body(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn fun_fact(&self) -> Result<FunFact, ApiError> {
        let value = self
            .send(ApiRequest::get(FUN_FACTS_PATH).anonymous())
            .await?;
        from_value(value)
    }
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload)
        .map_err(|error| ApiError::MalformedResponse(format!("failed to encode request: {error}")))
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|error| ApiError::MalformedResponse(error.to_string()))
}
