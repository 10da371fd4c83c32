// Verdict utilities
// Maps the composite score onto the four verdict tiers and keeps the tiers ordered

use crate::models::{ThresholdConfig, Verdict};

impl ThresholdConfig {
    /// True when high >= moderate >= low.
    pub fn is_monotonic(&self) -> bool {
        self.high_plagiarism >= self.moderate_plagiarism && self.moderate_plagiarism >= self.low_plagiarism
    }

    /// Replace the moderate tier, pushing the other tiers out of the way so
    /// the ordering survives: `high = max(high, t)`, `low = min(low, t)`.
    pub fn with_moderate(self, threshold: f64) -> Self {
        let threshold = threshold.clamp(0.0, 1.0);
        Self {
            high_plagiarism: self.high_plagiarism.max(threshold),
            moderate_plagiarism: threshold,
            low_plagiarism: self.low_plagiarism.min(threshold),
        }
    }
}

/// Highest tier whose cut point (as a percentage) the score reaches; lower
/// bounds are inclusive.
pub fn decide_verdict(similarity_percentage: f64, thresholds: &ThresholdConfig) -> Verdict {
    if similarity_percentage >= thresholds.high_plagiarism * 100.0 {
        Verdict::HighPlagiarism
    } else if similarity_percentage >= thresholds.moderate_plagiarism * 100.0 {
        Verdict::ModeratePlagiarism
    } else if similarity_percentage >= thresholds.low_plagiarism * 100.0 {
        Verdict::LowPlagiarism
    } else {
        Verdict::Original
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_boundaries_are_inclusive() {
        let t = ThresholdConfig::default();
        assert_eq!(decide_verdict(75.0, &t), Verdict::HighPlagiarism);
        assert_eq!(decide_verdict(74.99, &t), Verdict::ModeratePlagiarism);
        assert_eq!(decide_verdict(50.0, &t), Verdict::ModeratePlagiarism);
        assert_eq!(decide_verdict(30.0, &t), Verdict::LowPlagiarism);
        assert_eq!(decide_verdict(29.99, &t), Verdict::Original);
        assert_eq!(decide_verdict(0.0, &t), Verdict::Original);
        assert_eq!(decide_verdict(100.0, &t), Verdict::HighPlagiarism);
    }

    #[test]
    fn test_with_moderate_above_high_raises_high() {
        let t = ThresholdConfig::default().with_moderate(0.85);
        assert_eq!(t.moderate_plagiarism, 0.85);
        assert_eq!(t.high_plagiarism, 0.85);
        assert_eq!(t.low_plagiarism, 0.30);
        assert!(t.is_monotonic());
        // moderate tier is unreachable, scores at the cut point are high
        assert_eq!(decide_verdict(85.0, &t), Verdict::HighPlagiarism);
    }

    #[test]
    fn test_with_moderate_below_low_lowers_low() {
        let t = ThresholdConfig::default().with_moderate(0.2);
        assert_eq!(t.low_plagiarism, 0.2);
        assert_eq!(t.high_plagiarism, 0.75);
        assert!(t.is_monotonic());
    }

    #[test]
    fn test_unclamped_tiers_are_reported_non_monotonic() {
        let t = ThresholdConfig {
            high_plagiarism: 0.75,
            moderate_plagiarism: 0.85,
            low_plagiarism: 0.30,
        };
        assert!(!t.is_monotonic());
    }

    proptest! {
        #[test]
        fn prop_severity_never_increases_as_score_drops(
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
            moderate in 0.0f64..=1.0,
        ) {
            let t = ThresholdConfig::default().with_moderate(moderate);
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(decide_verdict(lo, &t).severity() <= decide_verdict(hi, &t).severity());
        }
    }
}
