//! Configuration module for environment variable parsing.
//!
//! Every knob has a default that reproduces the behaviour of the original
//! relay: port 1337, GitHub's published hook ranges, a 15 minute stargazer
//! window and an open destination policy.

use std::env;
use std::time::Duration;

use tracing::warn;

/// GitHub webhook source ranges as published at `https://api.github.com/meta`.
pub const GITHUB_HOOK_RANGES: &[&str] = &[
    "192.30.252.0/22",
    "185.199.108.0/22",
    "140.82.112.0/20",
    "143.55.64.0/20",
    "2a0a:a440::/29",
    "2606:50c0::/32",
];

const DEFAULT_LOOKUP_URL: &str = "https://ipinfo.io/{ip}/org";
const DEFAULT_EXPECTED_ORG: &str = "AS36459 GitHub, Inc.";

/// Which origin verification strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginStrategy {
    /// Static CIDR allow-list.
    Ranges,
    /// External reputation lookup with a cache of positive results.
    Reputation,
}

/// Where the caller's address is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAddressSource {
    /// Rightmost entry of `X-Forwarded-For`, as appended by the fronting proxy.
    ForwardedFor,
    /// Socket peer address.
    Peer,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Static landing page served on `GET /`
    pub index_path: String,

    pub origin_strategy: OriginStrategy,

    /// CIDR ranges trusted by the static strategy
    pub trusted_ranges: Vec<String>,

    pub client_address_source: ClientAddressSource,

    /// Lookup URL template; `{ip}` is replaced by the candidate address
    pub reputation_lookup_url: String,

    /// Organisation literal the lookup must return verbatim
    pub reputation_expected_org: String,

    pub reputation_cache_ttl: Duration,

    pub reputation_cache_max_entries: usize,

    /// How long a starred (sender, repository) pair is suppressed
    pub dedup_ttl: Duration,

    pub avatar_rewrite_enabled: bool,

    pub avatar_timeout: Duration,

    pub lookup_timeout: Duration,

    pub forward_timeout: Duration,

    /// Maximum accepted inbound body size in bytes
    pub max_body_bytes: usize,

    /// Optional list of destination hosts the relay may forward to.
    /// `None` keeps the relay open to any destination.
    pub destination_allowlist: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 1337,
            index_path: "index.html".to_string(),
            origin_strategy: OriginStrategy::Ranges,
            trusted_ranges: GITHUB_HOOK_RANGES.iter().map(|r| r.to_string()).collect(),
            client_address_source: ClientAddressSource::ForwardedFor,
            reputation_lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            reputation_expected_org: DEFAULT_EXPECTED_ORG.to_string(),
            reputation_cache_ttl: Duration::from_secs(24 * 60 * 60),
            reputation_cache_max_entries: 10_000,
            dedup_ttl: Duration::from_secs(15 * 60),
            avatar_rewrite_enabled: true,
            avatar_timeout: Duration::from_millis(5000),
            lookup_timeout: Duration::from_millis(5000),
            forward_timeout: Duration::from_millis(30_000),
            max_body_bytes: 25 * 1024 * 1024,
            destination_allowlist: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_or("PORT", defaults.port),

            index_path: env::var("INDEX_PATH").unwrap_or(defaults.index_path),

            origin_strategy: match env::var("ORIGIN_STRATEGY").ok().as_deref() {
                None | Some("ranges") => OriginStrategy::Ranges,
                Some("reputation") => OriginStrategy::Reputation,
                Some(other) => {
                    warn!(env_var = "ORIGIN_STRATEGY", value = %other, "Unknown strategy, using ranges");
                    OriginStrategy::Ranges
                }
            },

            trusted_ranges: parse_csv("TRUSTED_RANGES")
                .filter(|ranges| !ranges.is_empty())
                .unwrap_or(defaults.trusted_ranges),

            client_address_source: match env::var("CLIENT_ADDRESS_SOURCE").ok().as_deref() {
                None | Some("forwarded-for") => ClientAddressSource::ForwardedFor,
                Some("peer") => ClientAddressSource::Peer,
                Some(other) => {
                    warn!(env_var = "CLIENT_ADDRESS_SOURCE", value = %other, "Unknown source, using forwarded-for");
                    ClientAddressSource::ForwardedFor
                }
            },

            reputation_lookup_url: env::var("REPUTATION_LOOKUP_URL")
                .unwrap_or(defaults.reputation_lookup_url),

            reputation_expected_org: env::var("REPUTATION_EXPECTED_ORG")
                .unwrap_or(defaults.reputation_expected_org),

            reputation_cache_ttl: Duration::from_secs(parse_or(
                "REPUTATION_CACHE_TTL_SECS",
                defaults.reputation_cache_ttl.as_secs(),
            )),

            reputation_cache_max_entries: parse_or(
                "REPUTATION_CACHE_MAX_ENTRIES",
                defaults.reputation_cache_max_entries,
            ),

            dedup_ttl: Duration::from_secs(parse_or("DEDUP_TTL_SECS", defaults.dedup_ttl.as_secs())),

            avatar_rewrite_enabled: parse_bool("AVATAR_REWRITE_ENABLED", defaults.avatar_rewrite_enabled),

            avatar_timeout: Duration::from_millis(parse_or("AVATAR_TIMEOUT_MS", 5000)),

            lookup_timeout: Duration::from_millis(parse_or("LOOKUP_TIMEOUT_MS", 5000)),

            forward_timeout: Duration::from_millis(parse_or("FORWARD_TIMEOUT_MS", 30_000)),

            max_body_bytes: parse_or("MAX_BODY_BYTES", defaults.max_body_bytes),

            destination_allowlist: parse_csv("DESTINATION_ALLOWLIST"),
        }
    }
}

/// Parse a variable into `T`, warning and falling back on malformed values.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn parse_bool(name: &str, default: bool) -> bool {
    match env::var(name).ok().as_deref().map(str::trim) {
        None => default,
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        Some(other) => {
            warn!(env_var = name, value = %other, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_relay() {
        let config = Config::default();
        assert_eq!(config.port, 1337);
        assert_eq!(config.dedup_ttl, Duration::from_secs(900));
        assert_eq!(config.origin_strategy, OriginStrategy::Ranges);
        assert_eq!(config.trusted_ranges.len(), GITHUB_HOOK_RANGES.len());
        assert!(config.destination_allowlist.is_none());
        assert!(config.avatar_rewrite_enabled);
    }

    #[test]
    fn test_parse_or_valid_and_invalid() {
        env::set_var("HOOK_RELAY_TEST_PORT", "9090");
        assert_eq!(parse_or("HOOK_RELAY_TEST_PORT", 1u16), 9090);
        env::set_var("HOOK_RELAY_TEST_PORT", "not-a-port");
        assert_eq!(parse_or("HOOK_RELAY_TEST_PORT", 1u16), 1);
        env::remove_var("HOOK_RELAY_TEST_PORT");
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or("HOOK_RELAY_NONEXISTENT", 42u64), 42);
    }

    #[test]
    fn test_parse_bool() {
        env::set_var("HOOK_RELAY_TEST_BOOL", "off");
        assert!(!parse_bool("HOOK_RELAY_TEST_BOOL", true));
        env::set_var("HOOK_RELAY_TEST_BOOL", "maybe");
        assert!(parse_bool("HOOK_RELAY_TEST_BOOL", true));
        env::remove_var("HOOK_RELAY_TEST_BOOL");
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("HOOK_RELAY_TEST_CSV", "a.example, b.example,,");
        let result = parse_csv("HOOK_RELAY_TEST_CSV");
        assert_eq!(
            result,
            Some(vec!["a.example".to_string(), "b.example".to_string()])
        );
        env::remove_var("HOOK_RELAY_TEST_CSV");
    }
}
