use tracing::{info, warn};

use crate::api::{ApiError, DesignApi, DesignRecord, SaveDesignRequest};
use crate::generation::GenerationResult;

pub const NO_IMAGES_MESSAGE: &str = "No images generated. Please go back and try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Unsaved,
    Saving,
    Saved { design_id: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub save_state: SaveState,
}

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error("no generated image at position {0}")]
    UnknownImage(usize),

    #[error("image {0} is already being saved")]
    SaveInFlight(usize),

    #[error("image {0} is already saved")]
    AlreadySaved(usize),

    #[error("Failed to save design: {0}")]
    Save(#[source] ApiError),
}

impl ResultsError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Save(error) => Some(error),
            Self::UnknownImage(_) | Self::SaveInFlight(_) | Self::AlreadySaved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    prompt: String,
    images: Vec<GeneratedImage>,
    full_screen: Option<usize>,
}

impl ResultsView {
    pub fn new(result: GenerationResult, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: result
                .image_urls
                .into_iter()
                .map(|url| GeneratedImage {
                    url,
                    save_state: SaveState::Unsaved,
                })
                .collect(),
            full_screen: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_IMAGES_MESSAGE)
    }

    pub fn open_full_screen(&mut self, index: usize) -> Option<&str> {
        let image = self.images.get(index)?;
        self.full_screen = Some(index);
        Some(&image.url)
    }

    pub fn close_full_screen(&mut self) {
        self.full_screen = None;
    }

    pub fn full_screen_image(&self) -> Option<&str> {
        self.full_screen
            .and_then(|index| self.images.get(index))
            .map(|image| image.url.as_str())
    }

    pub fn begin_save(&mut self, index: usize) -> Result<SaveDesignRequest, ResultsError> {
        let image = self
            .images
            .get_mut(index)
            .ok_or(ResultsError::UnknownImage(index))?;
        match image.save_state {
            SaveState::Saving => return Err(ResultsError::SaveInFlight(index)),
            SaveState::Saved { .. } => return Err(ResultsError::AlreadySaved(index)),
            SaveState::Unsaved | SaveState::Failed { .. } => {}
        }

        image.save_state = SaveState::Saving;
        Ok(SaveDesignRequest {
            prompt: self.prompt.clone(),
            temporary_image_url: image.url.clone(),
        })
    }

    pub fn finish_save(
        &mut self,
        index: usize,
        outcome: Result<DesignRecord, ApiError>,
    ) -> Result<DesignRecord, ResultsError> {
        let image = self
            .images
            .get_mut(index)
            .ok_or(ResultsError::UnknownImage(index))?;

        match outcome {
            Ok(record) => {
                info!(index, design_id = %record.id, "generated image saved");
                image.save_state = SaveState::Saved {
                    design_id: record.id.clone(),
                };
                Ok(record)
            }
            Err(error) => {
                warn!(index, error = %error, "saving generated image failed");
                image.save_state = SaveState::Failed {
                    message: error.to_string(),
                };
                Err(ResultsError::Save(error))
            }
        }
    }

    pub async fn save<A: DesignApi>(
        &mut self,
        api: &A,
        index: usize,
    ) -> Result<DesignRecord, ResultsError> {
        let request = self.begin_save(index)?;
        let outcome = api.save_design(request).await;
        self.finish_save(index, outcome)
    }
}
