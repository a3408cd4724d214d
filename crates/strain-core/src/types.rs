//! Shared primitive types

/// Milliseconds since the Unix epoch.
pub type EpochMillis = u64;

/// Current wall-clock time in epoch milliseconds.
///
/// Clocks set before 1970 report `0`.
#[inline]
#[must_use]
pub fn epoch_millis() -> EpochMillis {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(epoch_millis() > 1_577_836_800_000);
    }
}
