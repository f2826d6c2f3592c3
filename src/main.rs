use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use translation_gateway::config::Config;
use translation_gateway::scheduler::{refresh_languages, start_scheduler};
use translation_gateway::server::{create_router, serve, AppState};
use translation_gateway::{DeepLBackend, SqliteStore, SystemClock, TranslationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_gateway=info".parse()?),
        )
        .init();

    info!("Starting translation gateway");

    // Load configuration from environment
    let config = Config::from_env()?;
    let clock = Arc::new(SystemClock);

    let store = SqliteStore::connect(&config.database_url, clock.clone(), config.cache_ttl())
        .await
        .with_context(|| format!("Failed to open cache store at {}", config.database_url))?;

    let backend = DeepLBackend::new(
        &config.deepl_api_url,
        &config.deepl_api_key,
        config.backend_timeout(),
    )
    .context("Failed to build DeepL client")?;

    let service = Arc::new(TranslationService::new(
        Arc::new(store),
        Arc::new(backend),
        clock,
        config.service_settings(),
    ));

    // Warm the priority cache in the background, then keep it fresh
    refresh_languages(&service, &config.warm_languages);
    let _scheduler = start_scheduler(
        Arc::clone(&service),
        config.warm_languages.clone(),
        &config.warm_schedule_times,
    )
    .await
    .context("Failed to start scheduler")?;

    let state = AppState {
        service,
        admin_key: config.admin_api_key.as_deref().map(Arc::from),
        trust_proxy_headers: config.trust_proxy_headers,
    };

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    serve(listener, create_router(state))
        .await
        .context("Server error")?;

    Ok(())
}
