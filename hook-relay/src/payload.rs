//! Parsed view of the handful of webhook payload fields the relay decides on.
//!
//! The raw bytes stay the source of truth for forwarding. This view is only
//! ever read from, never serialized back, so unknown fields survive untouched.

use serde::Deserialize;

/// Event type whose `started` action is subject to dedup.
pub const WATCH_EVENT: &str = "watch";

/// Action that marks a new star on a repository.
pub const STARTED_ACTION: &str = "started";

/// Subset of a GitHub webhook payload.
///
/// Every field is optional: missing or `null` values read as empty, matching
/// a lenient decoder. Type mismatches are still rejected.
#[derive(Debug, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub repository: Option<Repository>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub id: Option<i64>,
}

impl EventPayload {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn action(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }

    pub fn sender_login(&self) -> &str {
        self.sender
            .as_ref()
            .and_then(|s| s.login.as_deref())
            .unwrap_or("")
    }

    /// Sender avatar URL, `None` when absent or empty.
    pub fn avatar_url(&self) -> Option<&str> {
        self.sender
            .as_ref()
            .and_then(|s| s.avatar_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn repository_id(&self) -> i64 {
        self.repository.as_ref().and_then(|r| r.id).unwrap_or(0)
    }

    /// Whether this delivery is a new star, the only dedup-eligible event.
    pub fn is_star_started(&self, event: &str) -> bool {
        event == WATCH_EVENT && self.action() == STARTED_ACTION
    }
}
