use analysis_core::{
    Judgment, Metric, MetricSnapshot, PeerBaseline, SubJudgment, UnavailableReason,
    INDETERMINATE_SCORE,
};
use serde::{Deserialize, Serialize};

use crate::ThresholdPolicy;

/// Which side of the peer average counts as favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

/// Metrics compared against the industry, with their direction rule.
pub const INDUSTRY_METRICS: [(Metric, Direction); 3] = [
    (Metric::Pe, Direction::LowerIsBetter),
    (Metric::Pb, Direction::LowerIsBetter),
    (Metric::Roe, Direction::HigherIsBetter),
];

/// Partial score for one metric: 0.5 when either side is missing,
/// 1 when the subject is strictly favorable, 0 otherwise.
pub fn partial_score(subject: Option<f64>, peer_average: Option<f64>, direction: Direction) -> f64 {
    match (subject, peer_average) {
        (Some(value), Some(avg)) if value.is_finite() && avg.is_finite() => {
            let favorable = match direction {
                Direction::LowerIsBetter => value < avg,
                Direction::HigherIsBetter => value > avg,
            };
            if favorable {
                1.0
            } else {
                0.0
            }
        }
        _ => INDETERMINATE_SCORE,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub direction: Direction,
    pub subject: Option<f64>,
    pub peer_average: Option<f64>,
    pub partial: f64,
}

impl MetricComparison {
    /// Short "+ pe below industry" style note, `None` when indeterminate.
    pub fn note(&self) -> Option<String> {
        if self.partial == INDETERMINATE_SCORE {
            return None;
        }
        let favorable = self.partial > INDETERMINATE_SCORE;
        let side = match (self.direction, favorable) {
            (Direction::LowerIsBetter, true) | (Direction::HigherIsBetter, false) => "below",
            (Direction::LowerIsBetter, false) | (Direction::HigherIsBetter, true) => "above",
        };
        // equality is unfavorable but neither above nor below
        if self.subject == self.peer_average {
            return Some(format!("- {} level with industry", self.metric));
        }
        Some(format!(
            "{} {} {} industry",
            if favorable { "+" } else { "-" },
            self.metric,
            side
        ))
    }
}

/// Result of comparing a subject against its industry baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryComparison {
    pub comparisons: Vec<MetricComparison>,
    /// Mean of the partial scores; 1 = favorable on every metric.
    pub score: f64,
    pub judgment: SubJudgment,
}

impl IndustryComparison {
    pub fn compare(subject: &MetricSnapshot, baseline: &PeerBaseline, policy: &ThresholdPolicy) -> Self {
        let comparisons: Vec<MetricComparison> = INDUSTRY_METRICS
            .iter()
            .map(|&(metric, direction)| {
                let value = subject.get(metric);
                let avg = baseline.average(metric);
                MetricComparison {
                    metric,
                    direction,
                    subject: value,
                    peer_average: avg,
                    partial: partial_score(value, avg, direction),
                }
            })
            .collect();

        let score = comparisons.iter().map(|c| c.partial).sum::<f64>() / comparisons.len() as f64;

        let judgment = if baseline.has_any_average() {
            SubJudgment::Judged(policy.classify_favorability(score))
        } else {
            SubJudgment::Unavailable(UnavailableReason::NoPeerData)
        };

        Self {
            comparisons,
            score,
            judgment,
        }
    }

    pub fn judgment(&self) -> Option<Judgment> {
        self.judgment.judgment()
    }

    pub fn notes(&self) -> Vec<String> {
        self.comparisons.iter().filter_map(|c| c.note()).collect()
    }
}
