use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{Clock, Result, StateStore, load, save};

const KEY_PREFIX: &str = "download_rate_limit_";

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Mark {
    last: i64,
    expires: i64,
}

/// Fixed-window, one-success-per-window limiter keyed by user.
///
/// Marks live in the state store and expire after one window, so a request
/// exactly one window after the last success passes.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window,
        }
    }

    fn key(user_id: u64) -> String {
        format!("{KEY_PREFIX}{user_id}")
    }

    /// Returns `false` if the user already passed within the current window;
    /// otherwise records this request and returns `true`.
    pub fn check_and_mark(&self, user_id: u64) -> Result<bool> {
        let key = Self::key(user_id);
        let now = self.clock.now().timestamp();
        let window = self.window.num_seconds();

        if let Some(mark) = load::<Mark>(self.store.as_ref(), &key)? {
            if mark.expires > now && now - mark.last < window {
                return Ok(false);
            }
        }

        save(
            self.store.as_ref(),
            &key,
            &Mark {
                last: now,
                expires: now + window,
            },
        )?;
        Ok(true)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedClock, MemoryStore};

    #[test]
    fn test_mark_is_stored_per_user_key() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::at_timestamp(1_000));
        let limiter = RateLimiter::new(store.clone(), clock, Duration::seconds(60));

        assert!(limiter.check_and_mark(7).unwrap());
        let mark = store.get("download_rate_limit_7").unwrap().unwrap();
        assert_eq!(mark["last"], 1_000);
        assert_eq!(mark["expires"], 1_060);
        assert!(store.get("download_rate_limit_8").unwrap().is_none());
    }

    fn limiter(clock: Arc<FixedClock>) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), clock, Duration::seconds(60))
    }

    #[test]
    fn test_second_request_within_window_rejected() {
        let clock = Arc::new(FixedClock::at_timestamp(1_000));
        let limiter = limiter(clock.clone());

        assert!(limiter.check_and_mark(1).unwrap());
        clock.advance(Duration::seconds(59));
        assert!(!limiter.check_and_mark(1).unwrap());
    }

    #[test]
    fn test_request_at_window_boundary_passes() {
        let clock = Arc::new(FixedClock::at_timestamp(1_000));
        let limiter = limiter(clock.clone());

        assert!(limiter.check_and_mark(1).unwrap());
        clock.advance(Duration::seconds(60));
        assert!(limiter.check_and_mark(1).unwrap());
        clock.advance(Duration::seconds(1));
        assert!(!limiter.check_and_mark(1).unwrap());
    }

    #[test]
    fn test_users_are_independent() {
        let clock = Arc::new(FixedClock::at_timestamp(1_000));
        let limiter = limiter(clock);

        assert!(limiter.check_and_mark(1).unwrap());
        assert!(limiter.check_and_mark(2).unwrap());
        assert!(!limiter.check_and_mark(1).unwrap());
    }
}
