use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" for token expiry.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        get_timestamp()
    }
}

/// A clock frozen at one instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        // Clock set before 1970: treat as the epoch.
        .unwrap_or(0)
}

/// `now + ttl`, where a negative ttl yields an instant in the past.
pub fn calculate_expiry(now: i64, ttl_secs: i64) -> i64 {
    now.saturating_add(ttl_secs)
}

/// A token is expired once `now` has passed its expiry.
pub fn is_expired(expiry: i64, now: i64) -> bool {
    now > expiry
}
