use std::time::{Duration, SystemTime};

/// Returns the current unix timestamp (seconds elapsed since 1970-01-01).
#[inline]
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Closed timelike curve, reality compromised")
        .as_secs()
}

/// Whether `fetched_at + ttl` is still in the future relative to now.
#[inline]
pub fn is_fresh(fetched_at: u64, ttl: Duration) -> bool {
    timestamp_secs() < fetched_at.saturating_add(ttl.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_within_ttl() {
        let now = timestamp_secs();
        assert!(is_fresh(now, Duration::from_secs(300)));
    }

    #[test]
    fn stale_past_ttl() {
        let past = timestamp_secs().saturating_sub(1000);
        assert!(!is_fresh(past, Duration::from_secs(300)));
    }
}
