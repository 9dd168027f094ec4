//! Time and timestamp utilities

/// Get current Unix timestamp in milliseconds
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next write timestamp that is strictly greater than `last`
///
/// Journal timestamps double as a global ordering hint, so two appends in
/// the same millisecond must still get distinct, increasing values.
pub fn next_monotonic_timestamp(last: i64) -> i64 {
    current_timestamp_millis().max(last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(current_timestamp_millis() > 1_704_067_200_000);
    }

    #[test]
    fn test_next_monotonic_timestamp_never_goes_backwards() {
        let far_future = current_timestamp_millis() + 60_000;
        assert_eq!(next_monotonic_timestamp(far_future), far_future + 1);

        let now = current_timestamp_millis();
        assert!(next_monotonic_timestamp(0) >= now);
    }
}
