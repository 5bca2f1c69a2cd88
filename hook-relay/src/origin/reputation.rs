//! Origin check through an external IP reputation lookup.
//!
//! A lookup succeeds only if the response body names the expected
//! organisation. Positive results are cached for a bounded time; negative
//! results are never cached, so an untrusted caller triggers a fresh lookup
//! on every request.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::dedup::TtlStore;
use crate::origin::ranges::normalize;

/// Placeholder in the lookup URL template replaced by the candidate address.
pub const IP_PLACEHOLDER: &str = "{ip}";

#[derive(Debug)]
pub struct ReputationVerifier {
    client: Client,
    lookup_url: String,
    expected_org: String,
    timeout: Duration,
    verified: TtlStore,
    cache_ttl: Duration,
}

impl ReputationVerifier {
    pub fn new(
        client: Client,
        lookup_url: String,
        expected_org: String,
        timeout: Duration,
        cache_ttl: Duration,
        cache_max_entries: usize,
    ) -> Self {
        Self {
            client,
            lookup_url,
            expected_org,
            timeout,
            verified: TtlStore::bounded(cache_max_entries),
            cache_ttl,
        }
    }

    pub async fn is_trusted(&self, candidate: &str) -> bool {
        // Only well-formed addresses are ever substituted into the lookup URL.
        let Ok(addr) = candidate.trim().parse::<IpAddr>() else {
            return false;
        };
        let key = normalize(addr).to_string();

        if self.verified.contains(&key) {
            return true;
        }

        // No lock is held across the lookup.
        if self.lookup(&key).await {
            self.verified.insert_if_absent(&key, self.cache_ttl);
            true
        } else {
            false
        }
    }

    pub fn cached(&self) -> usize {
        self.verified.len()
    }

    async fn lookup(&self, addr: &str) -> bool {
        let url = self.lookup_url.replace(IP_PLACEHOLDER, addr);

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(address = %addr, error = %e, "origin_lookup_failed");
                return false;
            }
        };

        let org = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(address = %addr, error = %e, "origin_lookup_read_failed");
                return false;
            }
        };

        // Lookup services terminate the value with a newline.
        let matched = org.trim_end() == self.expected_org;
        debug!(address = %addr, org = %org.trim_end(), matched = matched, "origin_lookup_complete");
        matched
    }
}
