use analysis_core::Judgment;
use serde::{Deserialize, Serialize};

/// Scores strictly above this are positive.
pub const POSITIVE_BOUND: f64 = 0.1;
/// Scores strictly below this are negative.
pub const NEGATIVE_BOUND: f64 = -0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentPolarity {
    Positive,
    Neutral,
    Negative,
}

impl SentimentPolarity {
    pub fn from_score(score: f64) -> Self {
        if score > POSITIVE_BOUND {
            SentimentPolarity::Positive
        } else if score < NEGATIVE_BOUND {
            SentimentPolarity::Negative
        } else {
            SentimentPolarity::Neutral
        }
    }

    /// Positive news means the price has room to rise, so it leans
    /// undervalued; negative news leans overvalued.
    pub fn judgment(&self) -> Judgment {
        match self {
            SentimentPolarity::Positive => Judgment::Undervalued,
            SentimentPolarity::Neutral => Judgment::Fair,
            SentimentPolarity::Negative => Judgment::Overvalued,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            SentimentPolarity::Positive => "Positive",
            SentimentPolarity::Neutral => "Neutral",
            SentimentPolarity::Negative => "Negative",
        }
    }
}

/// Sentiment reading as used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Clamped to [-1, 1].
    pub score: f64,
    pub polarity: SentimentPolarity,
    /// The source failed and the neutral fallback (0.0) was used.
    pub fell_back: bool,
}

impl SentimentReading {
    pub fn from_score(score: f64) -> Self {
        let score = if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            score,
            polarity: SentimentPolarity::from_score(score),
            fell_back: false,
        }
    }

    /// "No news" reading used when the sentiment source errors.
    pub fn fallback() -> Self {
        Self {
            fell_back: true,
            ..Self::from_score(0.0)
        }
    }

    pub fn judgment(&self) -> Judgment {
        self.polarity.judgment()
    }
}
