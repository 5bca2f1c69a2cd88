//! Avatar URL fingerprinting.
//!
//! A small byte window of the avatar image is fetched and appended to its URL
//! as a `hash` parameter, so the destination sees a URL derived from the image
//! content rather than a stable per-user reference.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::RANGE, Client};
use tracing::{debug, warn};

/// Byte window requested from the avatar resource.
pub const FINGERPRINT_RANGE: &str = "bytes=200-250";

/// Name of the appended query parameter.
pub const HASH_PARAM: &str = "hash";

#[derive(Debug, Clone)]
pub struct AvatarRewriter {
    client: Client,
    timeout: Duration,
}

impl AvatarRewriter {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Compute the fingerprinted form of `avatar_url`.
    ///
    /// Returns `None` on any fetch failure or non-success status; callers then
    /// forward the payload unmodified.
    pub async fn fingerprint_url(&self, avatar_url: &str) -> Option<String> {
        let response = match self
            .client
            .get(avatar_url)
            .header(RANGE, FINGERPRINT_RANGE)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = avatar_url, error = %e, is_timeout = e.is_timeout(), "avatar_fetch_failed");
                return None;
            }
        };

        let status = response.status().as_u16();
        if status >= 300 {
            warn!(url = avatar_url, status_code = status, "avatar_fetch_rejected");
            return None;
        }

        let window = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = avatar_url, error = %e, "avatar_read_failed");
                return None;
            }
        };

        debug!(url = avatar_url, window_length = window.len(), "avatar_fetch_complete");

        Some(append_hash(avatar_url, &window))
    }
}

/// Append the encoded window as a `hash` query parameter.
///
/// The URL is extended textually so existing parameters keep their order.
pub fn append_hash(avatar_url: &str, window: &[u8]) -> String {
    let separator = if avatar_url.contains('?') { '&' } else { '?' };
    let encoded = STANDARD.encode(window);
    format!(
        "{}{}{}={}",
        avatar_url,
        separator,
        HASH_PARAM,
        urlencoding::encode(&encoded)
    )
}
