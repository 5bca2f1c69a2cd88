//! The relay pipeline: origin gate, stargazer dedup, avatar rewrite, forward.

pub mod forwarder;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::dedup::{dedup_key, DedupTracker};
use crate::error::RelayError;
use crate::origin::OriginVerifier;
use crate::payload::{EventPayload, WATCH_EVENT};
use crate::rewrite::{rewrite_avatar, AvatarRewriter};

pub use forwarder::Forwarder;

/// Everything a webhook delivery passes through after it is buffered.
#[derive(Debug)]
pub struct Relay {
    pub verifier: OriginVerifier,
    pub dedup: Arc<DedupTracker>,
    pub rewriter: Option<AvatarRewriter>,
    pub forwarder: Forwarder,
}

impl Relay {
    /// Build the pipeline around a single shared HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let verifier = OriginVerifier::from_config(config, client.clone())
            .context("Invalid trusted range")?;

        let rewriter = config
            .avatar_rewrite_enabled
            .then(|| AvatarRewriter::new(client.clone(), config.avatar_timeout));

        Ok(Self {
            verifier,
            dedup: Arc::new(DedupTracker::new(config.dedup_ttl)),
            rewriter,
            forwarder: Forwarder::new(
                client,
                config.forward_timeout,
                config.destination_allowlist.clone(),
            ),
        })
    }

    /// Reject callers that are not the verified webhook source.
    pub async fn authorize(&self, caller: Option<&str>) -> Result<(), RelayError> {
        let Some(caller) = caller else {
            warn!("relay_origin_missing");
            return Err(RelayError::Untrusted);
        };

        if self.verifier.is_trusted(caller).await {
            Ok(())
        } else {
            warn!(address = %caller, strategy = self.verifier.strategy(), "relay_origin_rejected");
            Err(RelayError::Untrusted)
        }
    }

    /// Run a buffered delivery through dedup and rewrite, then forward it.
    ///
    /// The payload is only parsed when a stage needs it. A suppressed
    /// duplicate answers `200 OK` without contacting the destination.
    pub async fn relay(
        &self,
        event: &str,
        destination: Url,
        headers: &HeaderMap,
        raw: Bytes,
    ) -> Result<Response, RelayError> {
        let needs_payload = event == WATCH_EVENT || self.rewriter.is_some();

        let body = if needs_payload {
            let payload = EventPayload::parse(&raw).map_err(|e| {
                warn!(event = %event, error = %e, "relay_payload_malformed");
                RelayError::MalformedPayload(e)
            })?;

            if payload.is_star_started(event) {
                let key = dedup_key(&payload);
                if !self.dedup.should_process(&key) {
                    info!(key = %key, "relay_duplicate_suppressed");
                    return Ok(StatusCode::OK.into_response());
                }
            }

            match &self.rewriter {
                Some(rewriter) => rewrite_avatar(rewriter, raw, &payload).await,
                None => raw,
            }
        } else {
            raw
        };

        self.forwarder.forward(destination, headers, body).await
    }
}
