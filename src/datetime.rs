//! Date values (Hessian 2.0 grammar: `date`).
//!
//! The wire format carries a UTC instant in one of two tiers: a signed 64-bit
//! millisecond offset from the Unix epoch, or a signed 32-bit minute offset
//! for instants that fall exactly on a minute boundary.

/// A UTC instant, stored as signed milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    millis: i64,
}

impl Timestamp {
    /// 1970-01-01T00:00:00Z.
    pub const UNIX_EPOCH: Timestamp = Timestamp { millis: 0 };

    /// Instant at `millis` milliseconds from the Unix epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Timestamp { millis }
    }

    /// Instant at `minutes` minutes from the Unix epoch (compact date tier).
    pub const fn from_minutes(minutes: i32) -> Self {
        Timestamp { millis: minutes as i64 * 60_000 }
    }

    /// Milliseconds since the Unix epoch.
    pub const fn millis(self) -> i64 {
        self.millis
    }

    /// The instant as whole minutes since the epoch, if it falls exactly on a
    /// minute boundary and fits the 32-bit wire tier.
    pub fn as_minutes(self) -> Option<i32> {
        if self.millis % 60_000 != 0 {
            return None;
        }
        i32::try_from(self.millis / 60_000).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_scale_to_millis() {
        assert_eq!(Timestamp::from_minutes(1).millis(), 60_000);
        assert_eq!(Timestamp::from_minutes(-1).millis(), -60_000);
        assert_eq!(Timestamp::from_minutes(0), Timestamp::UNIX_EPOCH);
    }

    #[test]
    fn as_minutes_requires_minute_boundary() {
        assert_eq!(Timestamp::from_millis(120_000).as_minutes(), Some(2));
        assert_eq!(Timestamp::from_millis(120_001).as_minutes(), None);
        assert_eq!(Timestamp::from_millis(-60_000).as_minutes(), Some(-1));
    }

    #[test]
    fn as_minutes_rejects_values_outside_i32() {
        let too_far = (i64::from(i32::MAX) + 1) * 60_000;
        assert_eq!(Timestamp::from_millis(too_far).as_minutes(), None);
        assert_eq!(Timestamp::from_minutes(i32::MAX).as_minutes(), Some(i32::MAX));
    }

    #[test]
    fn ordering_follows_the_timeline() {
        assert!(Timestamp::from_millis(-1) < Timestamp::UNIX_EPOCH);
        assert!(Timestamp::from_minutes(1) > Timestamp::from_millis(59_999));
    }
}
