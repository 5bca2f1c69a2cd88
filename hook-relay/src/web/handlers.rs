//! Webhook endpoint handlers.
//!
//! The relay handler gates on origin before the body is read, so untrusted
//! callers cost neither buffering nor any outbound call.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::Uri,
    response::Response,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::origin::client_address;
use crate::relay::Relay;
use crate::Config;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config, relay: Relay) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Relay Webhook
// =============================================================================

/// Query parameter naming the destination.
pub const DESTINATION_PARAM: &str = "url";

/// Destination from the first `url` pair of the query string.
///
/// Later repeats are ignored and an empty first value counts as absent.
pub fn destination_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == DESTINATION_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Relay endpoint.
///
/// This endpoint:
/// 1. Verifies the caller is the trusted webhook source
/// 2. Validates the destination and event type
/// 3. Buffers the body and hands it to the relay pipeline
/// 4. Mirrors the destination's status and body
pub async fn relay_webhook(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, RelayError> {
    let (parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let caller = client_address(state.config.client_address_source, &parts.headers, peer);
    state.relay.authorize(caller.as_deref()).await?;

    let Some(raw_destination) = destination_param(&parts.uri) else {
        warn!("relay_destination_missing");
        return Err(RelayError::MissingDestination);
    };
    let destination = state.relay.forwarder.resolve_destination(&raw_destination)?;

    let Some(event) = parts
        .headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
    else {
        warn!("relay_event_missing");
        return Err(RelayError::MissingEvent);
    };

    let delivery = parts
        .headers
        .get(DELIVERY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();

    let raw = to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| RelayError::ReadBody(e.to_string()))?;

    info!(
        event = %event,
        delivery = %delivery,
        body_length = raw.len(),
        "relay_webhook_received"
    );

    state
        .relay
        .relay(&event, destination, &parts.headers, raw)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(uri: &str) -> Option<String> {
        destination_param(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_destination_param_first_value_wins() {
        assert_eq!(
            param("/webhook?url=https%3A%2F%2Fa.example%2Fhook&url=https%3A%2F%2Fb.example"),
            Some("https://a.example/hook".to_string())
        );
    }

    #[test]
    fn test_destination_param_missing_or_empty() {
        assert_eq!(param("/webhook"), None);
        assert_eq!(param("/webhook?other=1"), None);
        assert_eq!(param("/webhook?url="), None);
        assert_eq!(param("/webhook?url=&url=https%3A%2F%2Fa.example"), None);
    }

    #[test]
    fn test_destination_param_tolerates_odd_pairs() {
        assert_eq!(
            param("/webhook?flag&url=http%3A%2F%2Fa.example&%zz=1"),
            Some("http://a.example".to_string())
        );
    }
}
