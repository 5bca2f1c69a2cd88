//! Outbound forwarding of a buffered webhook delivery.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::error::RelayError;

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    timeout: Duration,
    allowlist: Option<Vec<String>>,
}

impl Forwarder {
    /// `allowlist` of `None` forwards to any host.
    pub fn new(client: Client, timeout: Duration, allowlist: Option<Vec<String>>) -> Self {
        let allowlist =
            allowlist.map(|hosts| hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect());
        Self {
            client,
            timeout,
            allowlist,
        }
    }

    /// Parse the caller-supplied destination and apply the host policy.
    pub fn resolve_destination(&self, raw: &str) -> Result<Url, RelayError> {
        let url = Url::parse(raw).map_err(|e| RelayError::InvalidDestination(e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidDestination(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::InvalidDestination("missing host".to_string()))?
            .to_ascii_lowercase();

        if let Some(allowed) = &self.allowlist {
            if !allowed.iter().any(|h| *h == host) {
                return Err(RelayError::DestinationNotAllowed(host));
            }
        }

        Ok(url)
    }

    /// POST `body` to `destination` with the inbound headers and mirror the
    /// destination's status and body back.
    ///
    /// The timeout bounds the exchange up to the destination's response head.
    /// The response body is streamed without a deadline; dropping the returned
    /// response (or the future, when the caller disconnects) cancels the
    /// outbound request.
    pub async fn forward(
        &self,
        destination: Url,
        inbound_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, RelayError> {
        let host = destination.host_str().unwrap_or_default().to_string();
        let body_length = body.len();

        let send = self
            .client
            .post(destination)
            .headers(outbound_headers(inbound_headers))
            .body(body)
            .send();
        let upstream = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| RelayError::ForwardTimeout(self.timeout))??;

        let status = upstream.status();
        info!(
            destination_host = %host,
            body_length = body_length,
            status_code = status.as_u16(),
            "relay_forwarded"
        );

        let stream = upstream.bytes_stream().inspect_err(move |e| {
            warn!(destination_host = %host, error = %e, "relay_response_stream_failed");
        });

        Ok((status, Body::from_stream(stream)).into_response())
    }
}

/// Copy inbound headers minus hop-by-hop and framing headers.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    // These describe the inbound hop or its framing, not the delivery.
    let skipped: [HeaderName; 10] = [
        header::HOST,
        header::CONTENT_LENGTH,
        header::TRANSFER_ENCODING,
        header::CONNECTION,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
        header::PROXY_AUTHORIZATION,
        header::PROXY_AUTHENTICATE,
        HeaderName::from_static("keep-alive"),
    ];

    let mut headers = inbound.clone();
    for name in &skipped {
        headers.remove(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn open() -> Forwarder {
        Forwarder::new(Client::new(), Duration::from_secs(1), None)
    }

    #[test]
    fn test_resolve_open_destination() {
        let url = open()
            .resolve_destination("https://discord.example/api/webhooks/1/abc?wait=true")
            .unwrap();
        assert_eq!(url.host_str(), Some("discord.example"));
        assert_eq!(url.query(), Some("wait=true"));
    }

    #[test]
    fn test_resolve_rejects_garbage_and_schemes() {
        assert!(matches!(
            open().resolve_destination("not a url"),
            Err(RelayError::InvalidDestination(_))
        ));
        assert!(matches!(
            open().resolve_destination("file:///etc/passwd"),
            Err(RelayError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_resolve_applies_allowlist() {
        let forwarder = Forwarder::new(
            Client::new(),
            Duration::from_secs(1),
            Some(vec!["Hooks.Example".to_string()]),
        );

        assert!(forwarder.resolve_destination("https://hooks.example/x").is_ok());
        assert!(matches!(
            forwarder.resolve_destination("http://169.254.169.254/latest"),
            Err(RelayError::DestinationNotAllowed(host)) if host == "169.254.169.254"
        ));
    }

    #[test]
    fn test_outbound_headers_strip_hop_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("relay.example"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        inbound.insert("x-github-event", HeaderValue::from_static("watch"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let out = outbound_headers(&inbound);

        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get("keep-alive").is_none());
        assert_eq!(out.get("x-github-event").unwrap(), "watch");
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_forward_times_out_waiting_for_response_head() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new(Client::new(), Duration::from_millis(200), None);
        let dest = Url::parse(&server.uri()).unwrap();

        let err = forwarder
            .forward(dest, &HeaderMap::new(), Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ForwardTimeout(t) if t == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_forward_mirrors_body_after_head_arrives() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = Forwarder::new(Client::new(), Duration::from_millis(500), None);
        let dest = Url::parse(&server.uri()).unwrap();

        let resp = forwarder
            .forward(dest, &HeaderMap::new(), Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        // Collected after the deadline has passed; only the send is bounded.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"accepted");
    }
}
