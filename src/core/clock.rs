//! Server timestamps.
//!
//! All simulation code takes `now` as an argument; only the loops and the
//! gateway read the wall clock.

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Current wall-clock time in epoch milliseconds.
#[inline]
pub fn now_ms() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        // Sanity: after 2020-01-01
        assert!(a > 1_577_836_800_000);
    }
}
