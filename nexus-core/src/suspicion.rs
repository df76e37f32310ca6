use serde::{Deserialize, Serialize};

/// Ordered label derived from recent validator rejections. Ordering
/// matters: `detectCheating` and the suspicion window both compare levels,
/// so the derive order here is the authoritative severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuspicionLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl SuspicionLevel {
    /// Maps a count of suspicious entries observed in the last minute to a
    /// suspicion level: `≥3 low, ≥5 medium, ≥10 high, ≥20 critical`.
    #[must_use]
    pub fn from_recent_count(count: usize) -> Self {
        if count >= 20 {
            Self::Critical
        } else if count >= 10 {
            Self::High
        } else if count >= 5 {
            Self::Medium
        } else if count >= 3 {
            Self::Low
        } else {
            Self::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_match_spec_boundaries() {
        assert_eq!(SuspicionLevel::from_recent_count(0), SuspicionLevel::None);
        assert_eq!(SuspicionLevel::from_recent_count(2), SuspicionLevel::None);
        assert_eq!(SuspicionLevel::from_recent_count(3), SuspicionLevel::Low);
        assert_eq!(SuspicionLevel::from_recent_count(4), SuspicionLevel::Low);
        assert_eq!(SuspicionLevel::from_recent_count(5), SuspicionLevel::Medium);
        assert_eq!(SuspicionLevel::from_recent_count(9), SuspicionLevel::Medium);
        assert_eq!(SuspicionLevel::from_recent_count(10), SuspicionLevel::High);
        assert_eq!(SuspicionLevel::from_recent_count(19), SuspicionLevel::High);
        assert_eq!(
            SuspicionLevel::from_recent_count(20),
            SuspicionLevel::Critical
        );
    }

    #[test]
    fn ordering_is_severity_order() {
        assert!(SuspicionLevel::Critical > SuspicionLevel::High);
        assert!(SuspicionLevel::High > SuspicionLevel::Medium);
        assert!(SuspicionLevel::Medium > SuspicionLevel::Low);
        assert!(SuspicionLevel::Low > SuspicionLevel::None);
    }
}
