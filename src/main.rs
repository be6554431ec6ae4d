use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use voxnote_core::summary::Summarizer;
use voxnote_settings::{StoreBackend, VoxnoteSettings};
use voxnote_store::{Database, PostgrestRecordStore, RecordStore, SqliteRecordStore};
use voxnote_summarizer::{ResilientSummarizer, RetryPolicy};
use voxnote_telemetry::TelemetryConfig;
use voxnote_transcription::UnavailableTranscriber;

#[derive(Parser)]
#[command(name = "voxnote", version, about = "Voice memo transcription and summarization server")]
struct Cli {
    /// Settings file (default: ~/.voxnote/settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch the speech model into the configured model directory.
    DownloadModel,
    /// Summarize TEXT once and print the result.
    Summarize { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => voxnote_settings::load_settings_from_path(path),
        None => voxnote_settings::load_settings(),
    }
    .context("loading settings")?;

    let telemetry = TelemetryConfig::from_level_name(&settings.logging.level, settings.logging.json)?;
    voxnote_telemetry::init_telemetry(&telemetry)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(settings, port).await,
        Command::DownloadModel => download_model(&settings).await,
        Command::Summarize { text } => summarize_once(&settings, &text).await,
    }
}

async fn serve(settings: VoxnoteSettings, port: Option<u16>) -> Result<()> {
    tracing::info!("starting voxnote");

    let store = open_store(&settings)?;
    let summarizer = build_summarizer(&settings)?;
    if summarizer.is_none() {
        tracing::warn!("no summarization token configured, summaries disabled");
    }

    let model_dir = settings.transcription.model_dir();
    let transcriber =
        match voxnote_transcription::load_transcriber(&model_dir, settings.transcription.auto_download)
            .await
        {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, dir = %model_dir.display(), "speech model unavailable");
                Arc::new(UnavailableTranscriber::new(e.to_string()))
            }
        };

    let config = voxnote_server::ServerConfig {
        host: settings.server.host.clone(),
        port: port.unwrap_or(settings.server.port),
        max_upload_bytes: usize::try_from(settings.server.max_upload_bytes)
            .context("server.maxUploadBytes")?,
    };
    let state = voxnote_server::AppState {
        transcriber,
        summarizer,
        store,
    };
    let handle = voxnote_server::start(config, state)
        .await
        .context("starting server")?;

    tracing::info!(addr = %handle.addr, "voxnote ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}

fn open_store(settings: &VoxnoteSettings) -> Result<Arc<dyn RecordStore>> {
    let store = &settings.store;
    match store.backend {
        StoreBackend::Sqlite => {
            let path = store.sqlite_path();
            let db = Database::open(&path)
                .with_context(|| format!("opening database {}", path.display()))?;
            tracing::info!(path = %path.display(), "database opened");
            Ok(Arc::new(SqliteRecordStore::new(db)))
        }
        StoreBackend::Postgrest => {
            let (Some(url), Some(key)) = (store.postgrest_url.as_deref(), store.key()) else {
                bail!("postgrest backend needs store.postgrestUrl and store.postgrestKey");
            };
            tracing::info!(url, table = %store.table, "using postgrest store");
            Ok(Arc::new(PostgrestRecordStore::new(url, key, &store.table)?))
        }
    }
}

fn build_summarizer(settings: &VoxnoteSettings) -> Result<Option<Arc<dyn Summarizer>>> {
    let s = &settings.summarizer;
    if !s.is_available() {
        return Ok(None);
    }
    let Some(token) = s.token() else {
        return Ok(None);
    };
    let policy = RetryPolicy {
        max_retries: s.max_retries,
        request_timeout: s.request_timeout(),
        model_loading_delay: s.model_loading_delay(),
        rate_limit_delay: s.rate_limit_delay(),
        transport_delay: s.transport_delay(),
    };
    tracing::info!(url = %s.api_url, max_retries = s.max_retries, "summarizer configured");
    let summarizer =
        ResilientSummarizer::huggingface(s.api_url.clone(), token, policy, s.parameters())?;
    Ok(Some(Arc::new(summarizer)))
}

async fn download_model(settings: &VoxnoteSettings) -> Result<()> {
    let dir = settings.transcription.model_dir();
    voxnote_transcription::model::ensure_model(&dir).await?;
    println!("model ready in {}", dir.display());
    Ok(())
}

async fn summarize_once(settings: &VoxnoteSettings, text: &str) -> Result<()> {
    let Some(summarizer) = build_summarizer(settings)? else {
        bail!(
            "summarizer disabled or no token set ({})",
            voxnote_settings::TOKEN_ENV_VARS.join(" or ")
        );
    };
    match summarizer.summarize(text).await {
        Some(summary) => {
            println!("{summary}");
            Ok(())
        }
        None => bail!("no summary produced"),
    }
}
