use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use nail_studio::commands::{
    AppContext, GenerateOptions, run_delete, run_designs, run_favorite, run_fun_fact,
    run_generate, run_save,
};
use nail_studio::config::{FileLogSettings, StudioSettings};
use nail_studio::gallery::SortMode;
use nail_studio::server::run_mock_backend;
use nail_studio::studio::run_studio;

const LOG_FILE_PREFIX: &str = "nail_studio.log";

#[derive(Debug, Parser)]
#[command(name = "nail_studio", about = "Nail-art design generator client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the wizard with the given options and print the generated image URLs.
    Generate {
        #[arg(long)]
        length: String,
        #[arg(long)]
        shape: String,
        #[arg(long)]
        style: String,
        #[arg(long)]
        color: String,
        /// Base color as #rrggbb, applied through the color picker.
        #[arg(long)]
        base_color: Option<String>,
    },
    /// Save a generated image to your designs.
    Save {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        image_url: String,
    },
    /// List saved designs.
    Designs {
        #[arg(long, default_value = "recent")]
        sort: SortMode,
        #[arg(long)]
        json: bool,
    },
    /// Toggle the favorite flag on a saved design.
    Favorite { id: String },
    /// Delete a saved design.
    Delete { id: String },
    /// Print one fun fact.
    FunFact,
    /// Launch the native desktop studio.
    Studio,
    /// Run the in-memory development backend.
    MockBackend {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before tracing so NAIL_LOG_DIR and RUST_LOG can come from it.
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    if let Commands::MockBackend { bind } = &cli.command {
        return run_mock_backend(bind).await;
    }

    let settings = StudioSettings::from_env().context("failed to load configuration")?;
    if let Commands::Studio = cli.command {
        return run_studio(&settings);
    }

    let context = AppContext::from_settings(&settings)?;
    match cli.command {
        Commands::Generate {
            length,
            shape,
            style,
            color,
            base_color,
        } => {
            let options = GenerateOptions {
                length,
                shape,
                style,
                color,
                base_color,
            };
            run_generate(&context, &options).await?
        }
        Commands::Save { prompt, image_url } => run_save(&context, &prompt, &image_url).await?,
        Commands::Designs { sort, json } => run_designs(&context, sort, json).await?,
        Commands::Favorite { id } => run_favorite(&context, &id).await?,
        Commands::Delete { id } => run_delete(&context, &id).await?,
        Commands::FunFact => run_fun_fact(&context).await?,
        Commands::Studio | Commands::MockBackend { .. } => {}
    }

    Ok(())
}

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nail_studio=debug"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    let (file_layer, guard) = match FileLogSettings::from_env() {
        Some(file_log) => {
            let file_filter = EnvFilter::try_new(&file_log.filter)
                .with_context(|| format!("invalid NAIL_FILE_LOG filter `{}`", file_log.filter))?;
            let appender = tracing_appender::rolling::daily(&file_log.directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(guard)
}
