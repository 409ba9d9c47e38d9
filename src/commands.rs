use anyhow::{Context, Result, bail};
use tracing::info;

use crate::api::{ApiClient, DesignApi, DesignRecord, SaveDesignRequest};
use crate::config::StudioSettings;
use crate::gallery::{GalleryState, SortMode};
use crate::generation::{GenerationResult, IMAGE_GENERATION_MODELS, generate_all};
use crate::session::SessionProvider;
use crate::wizard::{PICK_BASE_COLOR, SelectOutcome, SelectionMap, Wizard, WizardStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub length: String,
    pub shape: String,
    pub style: String,
    pub color: String,
    pub base_color: Option<String>,
}

impl GenerateOptions {
    fn value_for(&self, step: WizardStep) -> &str {
        match step {
            WizardStep::Length => &self.length,
            WizardStep::Shape => &self.shape,
            WizardStep::Style => &self.style,
            WizardStep::Color => &self.color,
        }
    }
}

pub struct AppContext {
    _session: SessionProvider,
    api: ApiClient,
}

impl AppContext {
    pub fn from_settings(settings: &StudioSettings) -> Result<Self> {
        let session = SessionProvider::from_token(settings.auth_token.as_deref());
        let api = ApiClient::from_settings(settings, session.handle())
            .context("failed to build API client")?;
        info!(
            api_base_url = %settings.api_base_url,
            signed_in = session.state().user().is_some(),
            "API context ready"
        );
        Ok(Self {
            _session: session,
            api,
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

pub fn selections_from_options(options: &GenerateOptions) -> Result<(Wizard, SelectionMap)> {
    let mut wizard = Wizard::new();

    for step in WizardStep::ALL {
        if step == WizardStep::Color
            && let Some(base_color) = options.base_color.as_deref()
        {
            wizard.select(PICK_BASE_COLOR)?;
            wizard.set_color_draft(base_color)?;
            wizard.confirm_color()?;
        }

        let value = options.value_for(step);
        if step == WizardStep::Color && value == PICK_BASE_COLOR {
            bail!("`{PICK_BASE_COLOR}` opens the color picker; pass --base-color and a palette option");
        }

        match wizard.select(value)? {
            SelectOutcome::Advanced { .. } => {}
            SelectOutcome::ReadyToSubmit(selections) => return Ok((wizard, selections)),
            other => bail!("unexpected wizard outcome at step `{step}`: {other:?}"),
        }
    }

    bail!("wizard did not reach the submit step")
}

pub async fn run_generate(context: &AppContext, options: &GenerateOptions) -> Result<()> {
    let (mut wizard, selections) = selections_from_options(options)?;
    println!("Prompt: {}", selections.describe());

    let outcome = generate_all(context.api(), &selections, &IMAGE_GENERATION_MODELS).await;
    let result: &GenerationResult = wizard.finish_submission(outcome)?;

    if result.is_empty() {
        println!("{}", crate::results::NO_IMAGES_MESSAGE);
        return Ok(());
    }
    for url in &result.image_urls {
        println!("{url}");
    }
    Ok(())
}

pub async fn run_save(context: &AppContext, prompt: &str, image_url: &str) -> Result<()> {
    let record = context
        .api()
        .save_design(SaveDesignRequest {
            prompt: prompt.to_owned(),
            temporary_image_url: image_url.to_owned(),
        })
        .await
        .context("Failed to save design")?;
    println!("Saved design {}", record.id);
    Ok(())
}

pub async fn run_designs(context: &AppContext, sort: SortMode, json: bool) -> Result<()> {
    let gallery = match GalleryState::load(context.api()).await {
        GalleryState::Ready(gallery) => gallery,
        GalleryState::Failed { message } => bail!("Error: {message}"),
        GalleryState::Loading => bail!("gallery did not finish loading"),
    };

    let sorted = gallery.sorted(sort);
    if json {
        let rendered =
            serde_json::to_string_pretty(&sorted).context("failed to render designs as JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    if let Some(message) = gallery.empty_message() {
        println!("{message}");
        return Ok(());
    }
    for record in sorted {
        println!("{}", format_design_line(record));
    }
    Ok(())
}

pub async fn run_favorite(context: &AppContext, design_id: &str) -> Result<()> {
    let mut state = GalleryState::load(context.api()).await;
    let gallery = loaded_gallery(&mut state)?;
    gallery.toggle_favorite(context.api(), design_id).await?;
    let is_favorite = gallery
        .get(design_id)
        .is_some_and(|item| item.record.is_favorite);
    println!(
        "{design_id} is {}",
        if is_favorite {
            "now a favorite"
        } else {
            "no longer a favorite"
        }
    );
    Ok(())
}

pub async fn run_delete(context: &AppContext, design_id: &str) -> Result<()> {
    let mut state = GalleryState::load(context.api()).await;
    let gallery = loaded_gallery(&mut state)?;
    gallery.delete(context.api(), design_id).await?;
    println!("Deleted design {design_id}");
    Ok(())
}

pub async fn run_fun_fact(context: &AppContext) -> Result<()> {
    let fact = context
        .api()
        .fun_fact()
        .await
        .context("failed to fetch fun fact")?;
    println!("{}", fact.text);
    Ok(())
}

fn loaded_gallery(state: &mut GalleryState) -> Result<&mut crate::gallery::Gallery> {
    match state {
        GalleryState::Ready(gallery) => Ok(gallery),
        GalleryState::Failed { message } => bail!("Error: {message}"),
        GalleryState::Loading => bail!("gallery did not finish loading"),
    }
}

fn format_design_line(record: &DesignRecord) -> String {
    let marker = if record.is_favorite { '*' } else { ' ' };
    format!(
        "{marker} {}  {}  {}  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.prompt,
        record.image_url
    )
}
