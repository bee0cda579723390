//! HTTP surface for the loaded model.
//!
//! ## Endpoints
//!
//! - `GET /` - fixed status payload
//! - `POST /query` - `{"prompt": ...}` in, `{"text": ...}` out

mod handlers;

use crate::domain::ports::TextGenerator;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use handlers::{query_handler, root_handler};

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub monitor: Arc<SystemMonitor>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            monitor: Arc::new(SystemMonitor::new(false)),
        }
    }

    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/query", post(query_handler))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("🛑 Shutdown signal received"),
        Err(e) => tracing::error!("❌ Failed to listen for shutdown signal: {}", e),
    }
}
