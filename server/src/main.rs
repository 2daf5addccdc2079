mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::services::sketches::{MemorySketchRepository, PgSketchRepository, SketchRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let sketches: Arc<dyn SketchRepository> = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_connections).await?;
            tracing::info!(max_connections = config.db_max_connections, "sketch storage: postgres");
            Arc::new(PgSketchRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; saved sketches are kept in memory only");
            Arc::new(MemorySketchRepository::new())
        }
    };

    let port = config.port;
    let app = routes::app(state::AppState::new(sketches, config));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "sketch relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
