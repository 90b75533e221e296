use analysis_core::{AnalysisError, Judgment};
use serde::{Deserialize, Serialize};

/// Slack applied at the inclusive threshold edges so that weighted sums
/// like `0.6 * 1.0 + 0.4 * 0.0` land on the boundary they were meant to hit.
const EDGE_TOLERANCE: f64 = 1e-9;

/// How a numeric score in [0, 1] is turned into a three-way judgment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Two cutoffs with a "fair" band in between. Both edges are inclusive.
    DeadZone { lower: f64, upper: f64 },
    /// Single cutoff, no fair band. A score equal to the cutoff goes to the
    /// high side.
    Binary { cutoff: f64 },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::DeadZone {
            lower: 0.3,
            upper: 0.6,
        }
    }
}

impl ThresholdPolicy {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        match *self {
            ThresholdPolicy::DeadZone { lower, upper } => {
                if !in_unit(lower) || !in_unit(upper) || lower > upper {
                    return Err(AnalysisError::Config(format!(
                        "dead-zone thresholds must satisfy 0 <= lower <= upper <= 1 (got {} / {})",
                        lower, upper
                    )));
                }
            }
            ThresholdPolicy::Binary { cutoff } => {
                if !in_unit(cutoff) {
                    return Err(AnalysisError::Config(format!(
                        "binary cutoff must be within [0, 1] (got {})",
                        cutoff
                    )));
                }
            }
        }
        Ok(())
    }

    /// Classify a favorability score, where 1 means "better than peers".
    /// High favorability reads as undervalued.
    pub fn classify_favorability(&self, score: f64) -> Judgment {
        match *self {
            ThresholdPolicy::DeadZone { lower, upper } => {
                if score >= upper - EDGE_TOLERANCE {
                    Judgment::Undervalued
                } else if score <= lower + EDGE_TOLERANCE {
                    Judgment::Overvalued
                } else {
                    Judgment::Fair
                }
            }
            ThresholdPolicy::Binary { cutoff } => {
                if score >= cutoff - EDGE_TOLERANCE {
                    Judgment::Undervalued
                } else {
                    Judgment::Overvalued
                }
            }
        }
    }

    /// Classify a score on the canonical axis (0 undervalued, 1 overvalued).
    pub fn classify_overvaluation(&self, score: f64) -> Judgment {
        match *self {
            ThresholdPolicy::DeadZone { lower, upper } => {
                if score >= upper - EDGE_TOLERANCE {
                    Judgment::Overvalued
                } else if score <= lower + EDGE_TOLERANCE {
                    Judgment::Undervalued
                } else {
                    Judgment::Fair
                }
            }
            ThresholdPolicy::Binary { cutoff } => {
                if score >= cutoff - EDGE_TOLERANCE {
                    Judgment::Overvalued
                } else {
                    Judgment::Undervalued
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_zone_favorability_edges_are_inclusive() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.classify_favorability(0.6), Judgment::Undervalued);
        assert_eq!(policy.classify_favorability(0.3), Judgment::Overvalued);
        assert_eq!(policy.classify_favorability(0.45), Judgment::Fair);
        assert_eq!(policy.classify_favorability(2.0 / 3.0), Judgment::Undervalued);
        assert_eq!(policy.classify_favorability(1.0 / 3.0), Judgment::Fair);
    }

    #[test]
    fn test_dead_zone_overvaluation() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.classify_overvaluation(1.0), Judgment::Overvalued);
        assert_eq!(policy.classify_overvaluation(0.6), Judgment::Overvalued);
        assert_eq!(policy.classify_overvaluation(0.5), Judgment::Fair);
        assert_eq!(policy.classify_overvaluation(0.4), Judgment::Fair);
        assert_eq!(policy.classify_overvaluation(0.25), Judgment::Undervalued);
        assert_eq!(policy.classify_overvaluation(0.0), Judgment::Undervalued);
    }

    #[test]
    fn test_binary_breaks_ties_high() {
        let policy = ThresholdPolicy::Binary { cutoff: 0.5 };
        assert_eq!(policy.classify_overvaluation(0.5), Judgment::Overvalued);
        assert_eq!(policy.classify_overvaluation(0.49), Judgment::Undervalued);
        assert_eq!(policy.classify_favorability(0.5), Judgment::Undervalued);
        assert_eq!(policy.classify_favorability(0.2), Judgment::Overvalued);
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let policy = ThresholdPolicy::DeadZone {
            lower: 0.7,
            upper: 0.6,
        };
        assert!(policy.validate().is_err());
        assert!(ThresholdPolicy::default().validate().is_ok());
        assert!(ThresholdPolicy::Binary { cutoff: 1.5 }.validate().is_err());
    }
}
