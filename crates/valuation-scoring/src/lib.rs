//! Valuation scoring: turns an industry comparison, a model fair-price
//! prediction and a news-sentiment reading into one three-way judgment.
//!
//! Every stage converts categorical inputs with the canonical map
//! (undervalued 0, fair 0.5, overvalued 1). Inputs that could not be formed
//! enter as 0.5, so thin data pulls the result toward "fair" instead of
//! failing the evaluation.

use analysis_core::{
    stats, AnalysisError, FeatureVector, Judgment, Metric, MetricSnapshot, PeerBaseline,
    SubJudgment, UnavailableReason, ValuationModel, Verdict,
};
use serde::{Deserialize, Serialize};

pub mod industry;
pub mod sentiment;
pub mod thresholds;

pub use industry::{partial_score, Direction, IndustryComparison, MetricComparison, INDUSTRY_METRICS};
pub use sentiment::{SentimentPolarity, SentimentReading};
pub use thresholds::ThresholdPolicy;

/// Blend weights for the two composite stages. Each stage must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub technical: f64,
    pub sentiment: f64,
    pub model: f64,
    pub industry: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            technical: 0.6,
            sentiment: 0.4,
            model: 0.5,
            industry: 0.5,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let all = [self.technical, self.sentiment, self.model, self.industry];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::Config(
                "scoring weights must be non-negative".to_string(),
            ));
        }
        for (stage, sum) in [
            ("model", self.technical + self.sentiment),
            ("final", self.model + self.industry),
        ] {
            if (sum - 1.0).abs() > 1e-6 {
                return Err(AnalysisError::Config(format!(
                    "{} stage weights must sum to 1 (got {})",
                    stage, sum
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub policy: ThresholdPolicy,
    /// Pass the sentiment score to the model as an extra feature.
    #[serde(default = "default_include_sentiment")]
    pub include_sentiment_feature: bool,
}

fn default_include_sentiment() -> bool {
    true
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            policy: ThresholdPolicy::default(),
            include_sentiment_feature: true,
        }
    }
}

/// Model-based call: the fair price the model predicted and how the current
/// price compares with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAssessment {
    pub predicted_price: Option<f64>,
    pub judgment: SubJudgment,
}

impl TechnicalAssessment {
    fn unavailable(reason: UnavailableReason) -> Self {
        Self {
            predicted_price: None,
            judgment: SubJudgment::Unavailable(reason),
        }
    }
}

/// Score and judgment of one composite stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub score: f64,
    pub judgment: Judgment,
}

/// Everything the engine decided for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub technical: TechnicalAssessment,
    pub sentiment: SentimentReading,
    pub industry: IndustryComparison,
    pub model: StageOutcome,
    pub overall: StageOutcome,
    pub verdict: Verdict,
    pub reason: String,
}

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Result<Self, AnalysisError> {
        config.weights.validate()?;
        config.policy.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Compare the subject's pe, pb and roe against the peer averages.
    pub fn industry(&self, subject: &MetricSnapshot, baseline: &PeerBaseline) -> IndustryComparison {
        IndustryComparison::compare(subject, baseline, &self.config.policy)
    }

    /// Strict less-than: a price equal to the prediction is overvalued.
    pub fn technical_judgment(current_price: f64, predicted_price: f64) -> Judgment {
        if current_price < predicted_price {
            Judgment::Undervalued
        } else {
            Judgment::Overvalued
        }
    }

    /// Ask the model for a fair price and compare it with the current price.
    /// The model is only called when every feature is present.
    pub async fn technical(
        &self,
        snapshot: &MetricSnapshot,
        sentiment: &SentimentReading,
        model: Option<&dyn ValuationModel>,
    ) -> TechnicalAssessment {
        let current_price = match snapshot.get(Metric::CurrentPrice) {
            Some(p) => p,
            None => {
                return TechnicalAssessment::unavailable(UnavailableReason::MissingFeature(
                    Metric::CurrentPrice,
                ))
            }
        };

        let sentiment_feature = self
            .config
            .include_sentiment_feature
            .then_some(sentiment.score);
        let features = match FeatureVector::from_snapshot(snapshot, sentiment_feature) {
            Ok(f) => f,
            Err(missing) => {
                tracing::debug!("{}: technical unavailable, missing {}", snapshot.ticker, missing);
                return TechnicalAssessment::unavailable(UnavailableReason::MissingFeature(missing));
            }
        };

        let model = match model {
            Some(m) => m,
            None => return TechnicalAssessment::unavailable(UnavailableReason::ModelUnavailable),
        };

        match model.predict(&features).await {
            Ok(predicted) if predicted.is_finite() => TechnicalAssessment {
                predicted_price: Some(predicted),
                judgment: SubJudgment::Judged(Self::technical_judgment(current_price, predicted)),
            },
            Ok(predicted) => TechnicalAssessment::unavailable(UnavailableReason::PredictionFailed(
                format!("non-finite prediction {}", predicted),
            )),
            Err(AnalysisError::ModelUnavailable(e)) => {
                tracing::warn!("{}: valuation model unavailable: {}", snapshot.ticker, e);
                TechnicalAssessment::unavailable(UnavailableReason::ModelUnavailable)
            }
            Err(e) => {
                tracing::warn!("{}: prediction failed: {}", snapshot.ticker, e);
                TechnicalAssessment::unavailable(UnavailableReason::PredictionFailed(e.to_string()))
            }
        }
    }

    /// First stage: technical and sentiment blended into the model judgment.
    pub fn model_stage(&self, technical: &SubJudgment, sentiment: &SentimentReading) -> StageOutcome {
        let w = &self.config.weights;
        let score = stats::weighted_sum(&[
            (technical.score(), w.technical),
            (sentiment.judgment().score(), w.sentiment),
        ]);
        StageOutcome {
            score,
            judgment: self.config.policy.classify_overvaluation(score),
        }
    }

    /// Second stage: model judgment blended with the industry judgment.
    pub fn final_stage(&self, model: Judgment, industry: &SubJudgment) -> StageOutcome {
        let w = &self.config.weights;
        let score = stats::weighted_sum(&[(model.score(), w.model), (industry.score(), w.industry)]);
        StageOutcome {
            score,
            judgment: self.config.policy.classify_overvaluation(score),
        }
    }

    pub fn combine(
        &self,
        technical: TechnicalAssessment,
        sentiment: SentimentReading,
        industry: IndustryComparison,
    ) -> ScoreCard {
        let model = self.model_stage(&technical.judgment, &sentiment);
        let overall = self.final_stage(model.judgment, &industry.judgment);

        let available = [
            technical.judgment.is_available(),
            industry.judgment.is_available(),
            !sentiment.fell_back,
        ]
        .iter()
        .filter(|&&a| a)
        .count();
        let coverage = available as f64 / 3.0;
        let decisiveness = ((overall.score - 0.5).abs() * 2.0).min(1.0);
        let confidence = (decisiveness * 0.6 + coverage * 0.4).clamp(0.0, 1.0);

        let reason = Self::reason(&technical, &sentiment, &industry);

        ScoreCard {
            verdict: Verdict {
                judgment: overall.judgment,
                score: overall.score,
                confidence,
            },
            technical,
            sentiment,
            industry,
            model,
            overall,
            reason,
        }
    }

    /// Full pipeline for one subject once its inputs have been gathered.
    pub async fn score(
        &self,
        subject: &MetricSnapshot,
        baseline: &PeerBaseline,
        sentiment: SentimentReading,
        model: Option<&dyn ValuationModel>,
    ) -> ScoreCard {
        let industry = self.industry(subject, baseline);
        let technical = self.technical(subject, &sentiment, model).await;
        self.combine(technical, sentiment, industry)
    }

    fn reason(
        technical: &TechnicalAssessment,
        sentiment: &SentimentReading,
        industry: &IndustryComparison,
    ) -> String {
        let mut notes = Vec::new();

        match &technical.judgment {
            SubJudgment::Judged(Judgment::Undervalued) => {
                notes.push("+ price below model fair value".to_string())
            }
            SubJudgment::Judged(_) => notes.push("- price at or above model fair value".to_string()),
            SubJudgment::Unavailable(r) => notes.push(format!("? technical unavailable ({})", r)),
        }

        if sentiment.fell_back {
            notes.push("? sentiment unavailable, assumed neutral".to_string());
        } else {
            match sentiment.polarity {
                SentimentPolarity::Positive => notes.push("+ positive news sentiment".to_string()),
                SentimentPolarity::Negative => notes.push("- negative news sentiment".to_string()),
                SentimentPolarity::Neutral => {}
            }
        }

        match &industry.judgment {
            SubJudgment::Unavailable(r) => notes.push(format!("? industry unavailable ({})", r)),
            SubJudgment::Judged(_) => notes.extend(industry.notes()),
        }

        notes.join(", ")
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedModel(Result<f64, AnalysisError>);

    #[async_trait]
    impl ValuationModel for FixedModel {
        async fn predict(&self, _features: &FeatureVector) -> Result<f64, AnalysisError> {
            self.0.clone()
        }
    }

    fn complete_snapshot(price: f64) -> MetricSnapshot {
        MetricSnapshot {
            pe: Some(15.0),
            pb: Some(3.0),
            roe: Some(0.18),
            eps: Some(6.5),
            revenue_growth: Some(0.12),
            gross_margin: Some(0.45),
            free_cashflow: Some(2.0e9),
            market_cap: Some(1.5e11),
            current_price: Some(price),
            ..MetricSnapshot::new("AMD")
        }
    }

    #[test]
    fn test_weights_validation() {
        assert!(ScoringWeights::default().validate().is_ok());
        let bad = ScoringWeights {
            technical: 0.7,
            ..ScoringWeights::default()
        };
        assert!(bad.validate().is_err());
        assert!(ScoringEngine::new(ScoringConfig {
            weights: bad,
            ..ScoringConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_equal_price_and_prediction_is_overvalued() {
        assert_eq!(ScoringEngine::technical_judgment(100.0, 100.0), Judgment::Overvalued);
        assert_eq!(ScoringEngine::technical_judgment(99.99, 100.0), Judgment::Undervalued);
    }

    #[test]
    fn test_model_stage_overvalued_and_negative() {
        let engine = ScoringEngine::default();
        let outcome = engine.model_stage(
            &SubJudgment::Judged(Judgment::Overvalued),
            &SentimentReading::from_score(-0.5),
        );
        assert!((outcome.score - 1.0).abs() < 1e-12);
        assert_eq!(outcome.judgment, Judgment::Overvalued);
    }

    #[test]
    fn test_model_stage_undervalued_with_positive_news() {
        let engine = ScoringEngine::default();
        let outcome = engine.model_stage(
            &SubJudgment::Judged(Judgment::Undervalued),
            &SentimentReading::from_score(0.4),
        );
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.judgment, Judgment::Undervalued);
    }

    #[test]
    fn test_final_stage_tie_is_fair_under_dead_zone() {
        let engine = ScoringEngine::default();
        let outcome = engine.final_stage(
            Judgment::Undervalued,
            &SubJudgment::Judged(Judgment::Overvalued),
        );
        assert_eq!(outcome.score, 0.5);
        assert_eq!(outcome.judgment, Judgment::Fair);
    }

    #[test]
    fn test_final_stage_tie_is_overvalued_under_binary() {
        let engine = ScoringEngine::new(ScoringConfig {
            policy: ThresholdPolicy::Binary { cutoff: 0.5 },
            ..ScoringConfig::default()
        })
        .unwrap();
        let outcome = engine.final_stage(
            Judgment::Undervalued,
            &SubJudgment::Judged(Judgment::Overvalued),
        );
        assert_eq!(outcome.judgment, Judgment::Overvalued);
    }

    #[test]
    fn test_everything_unavailable_degrades_to_fair() {
        let engine = ScoringEngine::default();
        let card = engine.combine(
            TechnicalAssessment::unavailable(UnavailableReason::ModelUnavailable),
            SentimentReading::fallback(),
            engine.industry(&MetricSnapshot::new("XYZ"), &PeerBaseline::empty("Retail")),
        );
        assert_eq!(card.model.score, 0.5);
        assert_eq!(card.overall.score, 0.5);
        assert_eq!(card.verdict.judgment, Judgment::Fair);
        assert_eq!(card.verdict.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_technical_missing_feature_skips_model() {
        let engine = ScoringEngine::default();
        let snapshot = MetricSnapshot {
            free_cashflow: None,
            ..complete_snapshot(100.0)
        };
        let model = FixedModel(Ok(150.0));
        let result = engine
            .technical(&snapshot, &SentimentReading::from_score(0.0), Some(&model))
            .await;
        assert_eq!(
            result.judgment,
            SubJudgment::Unavailable(UnavailableReason::MissingFeature(Metric::FreeCashflow))
        );
        assert_eq!(result.predicted_price, None);
    }

    #[tokio::test]
    async fn test_technical_without_model() {
        let engine = ScoringEngine::default();
        let result = engine
            .technical(&complete_snapshot(100.0), &SentimentReading::from_score(0.0), None)
            .await;
        assert_eq!(
            result.judgment,
            SubJudgment::Unavailable(UnavailableReason::ModelUnavailable)
        );
    }

    #[tokio::test]
    async fn test_technical_prediction_error_is_typed() {
        let engine = ScoringEngine::default();
        let model = FixedModel(Err(AnalysisError::PredictionFailed("boom".to_string())));
        let result = engine
            .technical(&complete_snapshot(100.0), &SentimentReading::from_score(0.0), Some(&model))
            .await;
        assert!(matches!(
            result.judgment,
            SubJudgment::Unavailable(UnavailableReason::PredictionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_full_score_undervalued() {
        let engine = ScoringEngine::default();
        let baseline = PeerBaseline {
            avg_pe: Some(20.0),
            avg_pb: Some(2.0),
            avg_roe: Some(0.15),
            ..PeerBaseline::empty("Semiconductors")
        };
        let model = FixedModel(Ok(130.0));
        let card = engine
            .score(
                &complete_snapshot(105.0),
                &baseline,
                SentimentReading::from_score(0.3),
                Some(&model),
            )
            .await;

        assert_eq!(card.technical.predicted_price, Some(130.0));
        assert_eq!(card.model.judgment, Judgment::Undervalued);
        assert_eq!(card.industry.judgment(), Some(Judgment::Undervalued));
        assert_eq!(card.verdict.judgment, Judgment::Undervalued);
        assert_eq!(card.verdict.score, 0.0);
        assert!((card.verdict.confidence - 1.0).abs() < 1e-12);
        assert!(card.reason.contains("+ price below model fair value"));
        assert!(card.reason.contains("- pb above industry"));
    }
}
