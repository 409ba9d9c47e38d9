use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::{ApiError, DesignApi, GenerateRequest};
use crate::wizard::SelectionMap;

pub const IMAGE_GENERATION_MODELS: [&str; 4] = [
    "stabilityai/sdxl-turbo:free",
    "google/gemini-2.0-flash-exp:free",
    "black-forest-labs/FLUX-1-schnell:free",
    "HiDream-ai/HiDream-I1-Full:free",
];
pub const IMAGES_PER_MODEL: u32 = 1;
pub const IMAGE_SIZE: u32 = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub image_urls: Vec<String>,
}

impl GenerationResult {
    pub fn is_empty(&self) -> bool {
        self.image_urls.is_empty()
    }
}

/// The first failure aborts the remaining requests and fails the batch.
pub async fn generate_all<A: DesignApi>(
    api: &A,
    selections: &SelectionMap,
    models: &[&str],
) -> Result<GenerationResult, ApiError> {
    info!(
        model_count = models.len(),
        prompt = %selections.describe(),
        "starting generation fan-out"
    );

    let mut tasks = JoinSet::new();
    for (index, model) in models.iter().enumerate() {
        let api = api.clone();
        let request = GenerateRequest {
            selections: selections.clone(),
            model: (*model).to_owned(),
            num_images: IMAGES_PER_MODEL,
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
        };
        tasks.spawn(async move { (index, api.generate_designs(request).await) });
    }

    let mut per_model: Vec<Option<Vec<String>>> = vec![None; models.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = match joined {
            Ok(done) => done,
            Err(join_error) => {
                tasks.abort_all();
                return Err(ApiError::MalformedResponse(format!(
                    "generation task failed: {join_error}"
                )));
            }
        };

        match outcome {
            Ok(response) => per_model[index] = Some(response.image_urls),
            Err(error) => {
                warn!(model = models[index], error = %error, "generation failed; aborting batch");
                tasks.abort_all();
                return Err(error);
            }
        }
    }

    let image_urls: Vec<String> = per_model.into_iter().flatten().flatten().collect();
    info!(image_count = image_urls.len(), "generation fan-out complete");
    Ok(GenerationResult { image_urls })
}
