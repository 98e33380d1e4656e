use anyhow::Context;
use clap::Parser;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

use logger_redacted::{init_tracing, LoggerConfig};
use speech_assessment::{create_provider, AssessmentConfig};
use therapy_progress::{
    ExerciseLibrary, ExerciseStore, InMemoryCatalog, InMemoryExerciseStore, InMemoryProgressStore, InMemoryTrialLog,
    PostgresStore, ProgressStore, TherapyService, TrialLog,
};
use therapy_server::{create_app, AppState, ServerConfig, StorageConfig};

/// SpeechCare Engine HTTP Server
#[derive(Parser, Debug)]
#[command(name = "therapy-server")]
#[command(about = "Speech therapy trials, progress tracking and exercise catalog API")]
struct Args {
    /// Server bind address, overrides SPEECHCARE_HOST
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides SPEECHCARE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Use the in-memory store even when DATABASE_URL is set
    #[arg(long)]
    in_memory: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is normal outside development
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut logger_config = LoggerConfig::from_env();
    if args.verbose {
        logger_config = logger_config.with_level("debug");
    }
    init_tracing(&logger_config)?;

    let mut config = ServerConfig::from_env().context("Invalid server configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.in_memory {
        config.storage = StorageConfig::Memory;
    }

    info!("Starting SpeechCare Engine HTTP Server");
    info!(version = env!("CARGO_PKG_VERSION"), bind = %config.bind_address(), "Server configuration loaded");

    let storage = open_storage(&config.storage).await?;
    let catalog = Arc::new(InMemoryCatalog::default());
    let exercises = ExerciseLibrary::open(catalog.clone(), storage.exercises)
        .await
        .context("Failed to load the exercise catalog")?;

    let assessment_config = AssessmentConfig::from_env().context("Invalid assessment configuration")?;
    let provider = create_provider(&assessment_config).context("Failed to create assessment provider")?;

    let therapy = TherapyService::new(
        Arc::from(provider),
        catalog,
        storage.progress,
        storage.trials,
    )
    .with_pause_threshold_ms(assessment_config.pause_threshold_ms);

    let state = AppState::new(therapy, exercises, &config);
    let app = create_app(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address()))?;

    info!(address = %config.bind_address(), "SpeechCare server running");
    info!("Health check available at /health, API v1 at /api/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

struct Storage {
    progress: Arc<dyn ProgressStore>,
    trials: Arc<dyn TrialLog>,
    exercises: Arc<dyn ExerciseStore>,
}

async fn open_storage(storage: &StorageConfig) -> anyhow::Result<Storage> {
    match storage {
        StorageConfig::Memory => {
            warn!("Using in-memory storage; progress and catalog edits are lost on restart");
            Ok(Storage {
                progress: Arc::new(InMemoryProgressStore::new()),
                trials: Arc::new(InMemoryTrialLog::new()),
                exercises: Arc::new(InMemoryExerciseStore::new()),
            })
        }
        StorageConfig::Postgres { database_url } => {
            let store = PostgresStore::from_connection_string(database_url.expose_secret())
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.ensure_schema().await.context("Failed to prepare database schema")?;
            info!("Using PostgreSQL storage");

            let store = Arc::new(store);
            Ok(Storage {
                progress: store.clone(),
                trials: store.clone(),
                exercises: store,
            })
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
