use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{DesignRecord, FunFact, GenerateResponse, SaveDesignRequest};
use crate::wizard::WizardStep;

pub const MOCK_IMAGE_HOST: &str = "https://mock-images.nail-studio.test";

const FUN_FACTS: &[&str] = &[
    "Fingernails grow about 3.5 millimeters per month.",
    "Nail polish was first used in China around 3000 BC.",
    "Your dominant hand's nails usually grow faster.",
    "The French manicure was popularised in Paris in the 1970s.",
    "Nails are made of keratin, the same protein as hair.",
];

#[derive(Default)]
struct MockStore {
    designs_by_user: HashMap<String, Vec<DesignRecord>>,
}

#[derive(Clone, Default)]
struct AppState {
    store: Arc<Mutex<MockStore>>,
    next_design_id: Arc<AtomicU64>,
    next_image_id: Arc<AtomicU64>,
    next_fact: Arc<AtomicUsize>,
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    model: String,
    #[serde(default = "default_num_images")]
    num_images: u32,
    #[serde(flatten)]
    selections: Map<String, Value>,
}

fn default_num_images() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

struct MockError {
    status: StatusCode,
    message: String,
}

impl MockError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn design_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Design not found")
    }
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn mock_backend_router() -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/generate", post(handle_generate))
        .route("/api/save-design", post(handle_save_design))
        .route("/api/my-designs", get(handle_my_designs))
        .route("/api/designs/:id", delete(handle_delete_design))
        .route("/api/designs/:id/favorite", patch(handle_toggle_favorite))
        .route("/api/fun-facts", get(handle_fun_fact))
        .with_state(AppState::default())
}

pub async fn run_mock_backend(bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind mock backend to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        "starting mock backend"
    );

    axum::serve(listener, mock_backend_router())
        .await
        .context("mock backend exited with an error")
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, MockError> {
    require_user(&headers)?;
    if body.model.trim().is_empty() {
        return Err(MockError::new(StatusCode::BAD_REQUEST, "model is required"));
    }
    for step in WizardStep::ALL {
        let present = body
            .selections
            .get(step.id())
            .and_then(Value::as_str)
            .is_some_and(|value| !value.trim().is_empty());
        if !present {
            return Err(MockError::new(
                StatusCode::BAD_REQUEST,
                format!("missing selection `{}`", step.id()),
            ));
        }
    }

    let model_slug = slugify(&body.model);
    let image_urls = (0..body.num_images.max(1))
        .map(|_| {
            let image_id = state.next_image_id.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{MOCK_IMAGE_HOST}/{model_slug}/{image_id}.png")
        })
        .collect();

    Ok(Json(GenerateResponse { image_urls }))
}

async fn handle_save_design(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SaveDesignRequest>,
) -> Result<(StatusCode, Json<DesignRecord>), MockError> {
    let user = require_user(&headers)?;
    if body.temporary_image_url.trim().is_empty() {
        return Err(MockError::new(
            StatusCode::BAD_REQUEST,
            "temporaryImageUrl is required",
        ));
    }

    let design_id = state.next_design_id.fetch_add(1, Ordering::SeqCst) + 1;
    let record = DesignRecord {
        id: format!("design-{design_id}"),
        image_url: body.temporary_image_url,
        prompt: body.prompt,
        is_favorite: false,
        created_at: Utc::now(),
    };

    let mut store = state.store.lock().await;
    store
        .designs_by_user
        .entry(user)
        .or_default()
        .push(record.clone());

    Ok((StatusCode::CREATED, Json(record)))
}

async fn handle_my_designs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DesignRecord>>, MockError> {
    let user = require_user(&headers)?;
    let store = state.store.lock().await;
    let designs = store
        .designs_by_user
        .get(&user)
        .cloned()
        .unwrap_or_default();
    Ok(Json(designs))
}

async fn handle_delete_design(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(design_id): Path<String>,
) -> Result<Json<MessageBody>, MockError> {
    let user = require_user(&headers)?;
    let mut store = state.store.lock().await;
    let designs = store
        .designs_by_user
        .get_mut(&user)
        .ok_or_else(MockError::design_not_found)?;
    let position = designs
        .iter()
        .position(|design| design.id == design_id)
        .ok_or_else(MockError::design_not_found)?;
    designs.remove(position);

    Ok(Json(MessageBody {
        message: "Design deleted",
    }))
}

async fn handle_toggle_favorite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(design_id): Path<String>,
) -> Result<Json<DesignRecord>, MockError> {
    let user = require_user(&headers)?;
    let mut store = state.store.lock().await;
    let design = store
        .designs_by_user
        .get_mut(&user)
        .and_then(|designs| designs.iter_mut().find(|design| design.id == design_id))
        .ok_or_else(MockError::design_not_found)?;
    design.is_favorite = !design.is_favorite;

    Ok(Json(design.clone()))
}

async fn handle_fun_fact(State(state): State<AppState>) -> Json<FunFact> {
    let index = state.next_fact.fetch_add(1, Ordering::SeqCst) % FUN_FACTS.len();
    Json(FunFact {
        text: FUN_FACTS[index].to_owned(),
    })
}

fn require_user(headers: &HeaderMap) -> Result<String, MockError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match token {
        Some(token) => Ok(token.to_owned()),
        None => {
            warn!("rejecting request without bearer token");
            Err(MockError::unauthorized())
        }
    }
}

fn slugify(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_identifies_user() {
        let mut headers = HeaderMap::new();
        assert!(require_user(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(require_user(&headers).ok().as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(require_user(&headers).is_err());
    }

    #[test]
    fn model_names_become_url_safe() {
        assert_eq!(
            slugify("stabilityai/sdxl-turbo:free"),
            "stabilityai-sdxl-turbo-free"
        );
    }
}
