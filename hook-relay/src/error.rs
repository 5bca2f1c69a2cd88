//! Relay error taxonomy and its mapping onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Diagnostic returned when the destination query parameter is absent.
pub const MISSING_DESTINATION_MESSAGE: &str = "'webhook' parameter must be specified";

/// Errors that end a relay request before or during forwarding.
///
/// Best-effort failures (avatar fingerprinting, reputation lookups) never
/// become a `RelayError`; they are absorbed where they happen.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Caller address is not a verified webhook source.
    #[error("origin not trusted")]
    Untrusted,

    #[error("'webhook' parameter must be specified")]
    MissingDestination,

    #[error("invalid destination url: {0}")]
    InvalidDestination(String),

    #[error("destination host not allowed: {0}")]
    DestinationNotAllowed(String),

    #[error("missing X-GitHub-Event header")]
    MissingEvent,

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Destination could not be reached at all.
    #[error("forward failed: {0}")]
    Downstream(#[from] reqwest::Error),

    /// Destination accepted the connection but sent no response head in time.
    #[error("destination did not respond within {0:?}")]
    ForwardTimeout(std::time::Duration),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Untrusted => {
                // No body: the reason is not disclosed to the caller.
                StatusCode::FORBIDDEN.into_response()
            }
            Self::MissingDestination => {
                (StatusCode::BAD_REQUEST, MISSING_DESTINATION_MESSAGE).into_response()
            }
            Self::MissingEvent | Self::MalformedPayload(_) | Self::ReadBody(_) => {
                StatusCode::BAD_REQUEST.into_response()
            }
            Self::InvalidDestination(_) | Self::DestinationNotAllowed(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Self::Downstream(e) => {
                warn!(error = %e, is_timeout = e.is_timeout(), "relay_forward_failed");
                StatusCode::BAD_REQUEST.into_response()
            }
            Self::ForwardTimeout(after) => {
                warn!(timeout_ms = after.as_millis() as u64, "relay_forward_timed_out");
                StatusCode::BAD_REQUEST.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_maps_to_403() {
        let resp = RelayError::Untrusted.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn client_errors_map_to_400() {
        let malformed = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let cases = vec![
            RelayError::MissingDestination,
            RelayError::InvalidDestination("nope".to_string()),
            RelayError::DestinationNotAllowed("internal.example".to_string()),
            RelayError::MissingEvent,
            RelayError::ReadBody("x".to_string()),
            RelayError::MalformedPayload(malformed),
            RelayError::ForwardTimeout(std::time::Duration::from_secs(30)),
        ];
        for err in cases {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn missing_destination_display_is_diagnostic() {
        assert_eq!(
            RelayError::MissingDestination.to_string(),
            MISSING_DESTINATION_MESSAGE
        );
    }
}
