//! Origin verification: decides whether a caller address is the trusted
//! webhook sender. Every strategy fails closed.

pub mod ranges;
pub mod reputation;

use std::net::SocketAddr;

use axum::http::HeaderMap;
use ipnetwork::IpNetworkError;
use reqwest::Client;

use crate::config::{ClientAddressSource, Config, OriginStrategy};

pub use ranges::RangeAllowList;
pub use reputation::ReputationVerifier;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug)]
pub enum OriginVerifier {
    Ranges(RangeAllowList),
    Reputation(ReputationVerifier),
}

impl OriginVerifier {
    pub fn from_config(config: &Config, client: Client) -> Result<Self, IpNetworkError> {
        Ok(match config.origin_strategy {
            OriginStrategy::Ranges => Self::Ranges(RangeAllowList::new(config.trusted_ranges.as_slice())?),
            OriginStrategy::Reputation => Self::Reputation(ReputationVerifier::new(
                client,
                config.reputation_lookup_url.clone(),
                config.reputation_expected_org.clone(),
                config.lookup_timeout,
                config.reputation_cache_ttl,
                config.reputation_cache_max_entries,
            )),
        })
    }

    pub async fn is_trusted(&self, candidate: &str) -> bool {
        match self {
            Self::Ranges(list) => list.is_trusted(candidate),
            Self::Reputation(verifier) => verifier.is_trusted(candidate).await,
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Ranges(_) => "ranges",
            Self::Reputation(_) => "reputation",
        }
    }
}

/// Resolve the address to verify for a request.
///
/// With `ForwardedFor` the rightmost `X-Forwarded-For` entry is used: it is
/// the one appended by the proxy directly in front of the relay, while
/// earlier entries are caller-controlled.
pub fn client_address(
    source: ClientAddressSource,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Option<String> {
    match source {
        ClientAddressSource::ForwardedFor => headers
            .get_all(FORWARDED_FOR_HEADER)
            .iter()
            .last()
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned),
        ClientAddressSource::Peer => peer.map(|addr| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_uses_rightmost_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static("140.82.112.1, 203.0.113.9"),
        );

        let addr = client_address(ClientAddressSource::ForwardedFor, &headers, None);
        assert_eq!(addr.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_forwarded_for_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert!(client_address(ClientAddressSource::ForwardedFor, &headers, None).is_none());

        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("  "));
        assert!(client_address(ClientAddressSource::ForwardedFor, &headers, None).is_none());
    }

    #[test]
    fn test_peer_source_ignores_header() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static("140.82.112.1"));
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();

        let addr = client_address(ClientAddressSource::Peer, &headers, Some(peer));
        assert_eq!(addr.as_deref(), Some("10.1.2.3"));
        assert!(client_address(ClientAddressSource::Peer, &headers, None).is_none());
    }

    #[tokio::test]
    async fn test_default_config_uses_static_ranges() {
        let verifier = OriginVerifier::from_config(&Config::default(), Client::new()).unwrap();
        assert_eq!(verifier.strategy(), "ranges");
        assert!(verifier.is_trusted("185.199.108.20").await);
        assert!(!verifier.is_trusted("127.0.0.1").await);
    }
}
