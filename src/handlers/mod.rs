mod generate;
mod health;
mod metrics;

use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use crate::prompt::MAX_BODY_BYTES;
pub use generate::generate_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;

pub const GENERATE_PATH: &str = "/api/generate-background";

// creating the router with routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // any method: the gateway answers OPTIONS and 405 itself
        .route(GENERATE_PATH, any(generate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
