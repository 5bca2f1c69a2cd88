//! Web server module for the relay.
//!
//! Routes:
//! - `GET /` serves the static landing page
//! - `GET /health` liveness check
//! - `POST /webhook?url=<destination>` relays a webhook delivery

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeFile, trace::TraceLayer};

pub use handlers::{destination_param, health, relay_webhook, AppState, HealthResponse};

/// Build the router. Serve it with connect info so `peer` address mode works.
pub fn router(state: AppState) -> Router {
    let index = ServeFile::new(&state.config.index_path);

    Router::new()
        .route_service("/", index)
        .route("/health", get(health))
        .route("/webhook", post(relay_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
