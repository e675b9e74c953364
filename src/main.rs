use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod models;
mod services;

use config::AppConfig;
use services::pacing::{FixedDelay, NoDelay, RateLimiter};
use services::plex::PlexClient;
use services::sync::GenreSync;
use services::tmdb::TmdbClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plex_genre_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e.into());
        }
    };

    config.log_config();

    let plex = PlexClient::new(
        &config.library_url,
        config.library_token.clone(),
        config.http_timeout,
    )
    .context("Error initializing library server client")?;

    match plex.identity().await {
        Ok(identity) => tracing::info!(
            "Connected to library server {} (version {})",
            identity.machine_identifier.as_deref().unwrap_or("unknown"),
            identity.version.as_deref().unwrap_or("unknown")
        ),
        Err(e) => {
            tracing::error!("Error connecting to library server: {:#}", e);
            return Err(e.context("Error initializing APIs"));
        }
    }

    let tmdb = TmdbClient::new(
        config.catalog_api_key.clone(),
        config.catalog_language.clone(),
        config.http_timeout,
    )
    .context("Error initializing catalog client")?;

    let limiter: Arc<dyn RateLimiter> = if config.pacing.is_zero() {
        Arc::new(NoDelay)
    } else {
        Arc::new(FixedDelay::new(config.pacing))
    };

    let sync = GenreSync::new(Arc::new(plex), Arc::new(tmdb), limiter, config.sync_mode);

    let summary = sync.run().await;
    summary.log();

    tracing::info!("Genre tagging process completed!");
    Ok(())
}
