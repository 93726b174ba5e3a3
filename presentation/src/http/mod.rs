//! HTTP transports.
//!
//! One axum router carries both HTTP-shaped transports plus the
//! operational endpoints:
//!
//! | Route | Transport |
//! |-------|-----------|
//! | `POST /v1/message` | Web request/response |
//! | `POST /telegram/webhook` | Telegram Bot API updates |
//! | `GET /health` | Liveness and component status |
//! | `GET /stats` | Gateway counters |

pub mod message;
pub mod status;
pub mod telegram;

use anyhow::Result;
use crossbar_application::{OutboundDelivery, ProcessMessageUseCase};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Telegram transport wiring: where replies go and what authenticates
/// inbound updates.
pub struct TelegramContext {
    pub delivery: Arc<dyn OutboundDelivery>,
    pub webhook_secret: String,
}

/// Application state shared across handlers
pub struct AppState {
    pub use_case: Arc<ProcessMessageUseCase>,
    /// `None` disables the webhook route (404)
    pub telegram: Option<TelegramContext>,
    /// Keys accepted in X-Api-Key on the web endpoint; empty disables the check
    pub api_keys: Vec<String>,
}

pub type AppStateArc = Arc<AppState>;

/// Build the gateway router.
pub fn router(state: AppStateArc) -> axum::Router {
    axum::Router::new()
        .merge(message::routes())
        .merge(telegram::routes())
        .merge(status::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process ends.
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("http transports listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
