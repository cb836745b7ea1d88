//! Wayfarer application binary - composition root.
//!
//! 1. Load `.env`, configuration and CLI overrides
//! 2. Initialize tracing
//! 3. Build the data gateway, prompt library, LLM client and orchestrator
//! 4. Serve the axum API until Ctrl-C

mod cli;

use std::sync::Arc;

use clap::Parser;

use wayfarer_api::state::AppState;
use wayfarer_chat::{
    ChatOrchestrator, ConversationStore, GeminiClient, GenerationParams, PromptLibrary,
};
use wayfarer_core::config::WayfarerConfig;
use wayfarer_data::ExternalDataGateway;

use cli::CliArgs;

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Wire every service described by `config` into the API state.
fn build_state(config: WayfarerConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let gateway = Arc::new(ExternalDataGateway::from_config(&config)?);
    tracing::info!(ttl_secs = config.cache.ttl_secs, "External data gateway ready");

    let prompts = Arc::new(PromptLibrary::load(&config.prompts.dir)?);

    let llm = Arc::new(GeminiClient::new(&config.llm)?);
    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM API key configured; chat requests will return the apology reply");
    }
    tracing::info!(endpoint = %llm.endpoint(), "LLM client ready");

    let orchestrator = ChatOrchestrator::new(
        llm,
        prompts,
        gateway,
        ConversationStore::from_config(&config.conversation),
        GenerationParams::from(&config.llm),
    )
    .with_attraction_augmentation(config.augmentation.attractions)
    .with_max_message_length(config.server.max_message_length);

    Ok(AppState::new(config, orchestrator))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = dotenvy::dotenv();
    let args = CliArgs::parse();

    // Config: file, then env, then CLI.
    let config_file = args.resolve_config_path();
    let mut config = WayfarerConfig::load_or_default(&config_file)?;
    config.apply_env_overrides();
    args.apply_to(&mut config);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Wayfarer v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env"),
    }
    if config_file.exists() {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    let state = build_state(config.clone())?;
    wayfarer_api::start_server(&config, state, shutdown_signal()).await?;

    tracing::info!("Wayfarer stopped");
    Ok(())
}
