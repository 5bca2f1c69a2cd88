//! Stargazer dedup: suppresses repeated `watch`/`started` deliveries for the
//! same (sender, repository) pair within a fixed window.

pub mod ttl_store;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::payload::EventPayload;

pub use ttl_store::TtlStore;

/// Build the dedup key for a payload.
///
/// Logins cannot contain `/`, so the separator keeps keys unique per pair.
pub fn dedup_key(payload: &EventPayload) -> String {
    format!("{}/{}", payload.sender_login(), payload.repository_id())
}

/// Process-wide record of recently accepted star events.
#[derive(Debug)]
pub struct DedupTracker {
    store: TtlStore,
    ttl: Duration,
}

impl DedupTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: TtlStore::new(),
            ttl,
        }
    }

    /// `true` the first time `key` is seen within the window, `false` after.
    ///
    /// A repeat never extends the window of the original acceptance.
    pub fn should_process(&self, key: &str) -> bool {
        self.store.insert_if_absent(key, self.ttl)
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }

    /// Periodically drop expired keys so idle keys don't linger in memory.
    ///
    /// The task stops once the tracker is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let tracker = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                let removed = tracker.store.purge_expired();
                if removed > 0 {
                    debug!(removed = removed, remaining = tracker.tracked(), "dedup_sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(login: &str, repo: i64) -> EventPayload {
        let raw = format!(
            r#"{{"action":"started","sender":{{"login":"{}"}},"repository":{{"id":{}}}}}"#,
            login, repo
        );
        EventPayload::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_dedup_key_distinguishes_pairs() {
        assert_eq!(dedup_key(&star("octocat", 42)), "octocat/42");
        assert_ne!(dedup_key(&star("ab", 12)), dedup_key(&star("ab1", 2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_process_within_and_after_window() {
        let tracker = DedupTracker::new(Duration::from_secs(900));
        let key = dedup_key(&star("octocat", 42));

        assert!(tracker.should_process(&key));
        assert!(!tracker.should_process(&key));
        assert!(tracker.should_process("someone-else/42"));

        tokio::time::advance(Duration::from_secs(900)).await;
        assert!(tracker.should_process(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_keys() {
        let tracker = Arc::new(DedupTracker::new(Duration::from_secs(10)));
        tracker.should_process("a/1");
        tracker.should_process("b/2");
        assert_eq!(tracker.tracked(), 2);

        let sweeper = tracker.spawn_sweeper(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(tracker.tracked(), 0);
        sweeper.abort();
    }
}
