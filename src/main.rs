/// Films Catalog
///
/// An HTTP service for a catalog of films. Anyone may browse; a film and
/// its poster can only be changed by the user who created it.

mod api;
mod attachment_store;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod films;
mod permissions;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::CatalogResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CatalogResult<()> {
    let config = ServerConfig::from_env()?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}
