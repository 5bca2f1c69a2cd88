//! Hook Relay - GitHub webhook relay.
//!
//! Receives webhook deliveries from GitHub, suppresses repeated stars,
//! fingerprints sender avatar URLs and forwards each delivery to the
//! destination named in its `url` query parameter.
//!
//! ## Architecture
//!
//! ```text
//! GitHub → origin check → buffer → stargazer dedup → avatar rewrite → destination
//!                                                                        │
//! GitHub ←────────────────── status + body mirrored ─────────────────────┘
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod origin;
pub mod payload;
pub mod relay;
pub mod rewrite;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dedup::{DedupTracker, TtlStore};
pub use error::RelayError;
pub use origin::OriginVerifier;
pub use payload::EventPayload;
pub use relay::{Forwarder, Relay};
pub use rewrite::AvatarRewriter;
pub use web::{router, AppState};
