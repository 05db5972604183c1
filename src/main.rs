//! DogSquad - backend service for reporting and coordinating stray-dog
//! welfare rescues.
//!
//! # API Endpoints
//!
//! - `POST /reports` - Submit a welfare report
//! - `GET /reports/:id` - Fetch a report
//! - `PATCH /reports/:id/status` - Move a report through its lifecycle
//! - `GET /reports/:id/timeline` - Audit trail, oldest first
//! - `POST /reports/:id/alerts` - Record dispatched volunteer alerts
//! - `GET /reports/:id/alerts` - Alerts for a report
//! - `POST /alerts/:id/response` - Record a volunteer's response
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use dogsquad::api::{AppState, router};
use dogsquad::images::HttpImageStore;
use dogsquad::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:dogsquad.db?mode=rwc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("dogsquad=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("DOGSQUAD_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("DOGSQUAD_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    // Image store is optional; without it, photo attachments are dropped
    // with a warning but reports still go through.
    let images = env::var("DOGSQUAD_IMAGE_STORE_URL")
        .ok()
        .map(|url| HttpImageStore::new(&url));

    info!(port, db_url = %db_url, image_store = images.is_some(), "Starting DogSquad server");

    // Initialize storage
    let storage = Storage::new(&db_url).await?;
    info!("Database initialized");

    let state = AppState { storage, images };
    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "DogSquad is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
