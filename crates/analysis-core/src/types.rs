use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stats::finite;

/// Score given to an indeterminate input in every weighted blend.
pub const INDETERMINATE_SCORE: f64 = 0.5;

/// Financial metric fields carried by a [`MetricSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Pe,
    Pb,
    Roe,
    Eps,
    RevenueGrowth,
    GrossMargin,
    FreeCashflow,
    MarketCap,
    CurrentPrice,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Pe => "pe",
            Metric::Pb => "pb",
            Metric::Roe => "roe",
            Metric::Eps => "eps",
            Metric::RevenueGrowth => "revenue_growth",
            Metric::GrossMargin => "gross_margin",
            Metric::FreeCashflow => "free_cashflow",
            Metric::MarketCap => "market_cap",
            Metric::CurrentPrice => "current_price",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time metrics for one ticker. Every value may be missing.
///
/// Ratios are fractions (`roe = 0.18` means 18%), `market_cap` and
/// `free_cashflow` are in the listing currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub ticker: String,
    #[serde(default)]
    pub company_name: Option<String>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub roe: Option<f64>,
    pub eps: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub gross_margin: Option<f64>,
    pub free_cashflow: Option<f64>,
    pub market_cap: Option<f64>,
    pub current_price: Option<f64>,
}

impl MetricSnapshot {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    /// Replace non-finite values with `None`.
    pub fn normalized(self) -> Self {
        Self {
            pe: finite(self.pe),
            pb: finite(self.pb),
            roe: finite(self.roe),
            eps: finite(self.eps),
            revenue_growth: finite(self.revenue_growth),
            gross_margin: finite(self.gross_margin),
            free_cashflow: finite(self.free_cashflow),
            market_cap: finite(self.market_cap),
            current_price: finite(self.current_price),
            ..self
        }
    }

    /// Value of a metric; non-finite values read as missing.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        let raw = match metric {
            Metric::Pe => self.pe,
            Metric::Pb => self.pb,
            Metric::Roe => self.roe,
            Metric::Eps => self.eps,
            Metric::RevenueGrowth => self.revenue_growth,
            Metric::GrossMargin => self.gross_margin,
            Metric::FreeCashflow => self.free_cashflow,
            Metric::MarketCap => self.market_cap,
            Metric::CurrentPrice => self.current_price,
        };
        finite(raw)
    }
}

/// Field-wise contributor counts behind a [`PeerBaseline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorCounts {
    pub pe: usize,
    pub pb: usize,
    pub roe: usize,
}

/// Industry averages over the peers that reported each metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerBaseline {
    pub industry: String,
    pub avg_pe: Option<f64>,
    pub avg_pb: Option<f64>,
    pub avg_roe: Option<f64>,
    pub peers_requested: usize,
    pub peers_fetched: usize,
    pub contributors: ContributorCounts,
}

impl PeerBaseline {
    /// Baseline with no peer data at all.
    pub fn empty(industry: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            ..Default::default()
        }
    }

    pub fn average(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pe => finite(self.avg_pe),
            Metric::Pb => finite(self.avg_pb),
            Metric::Roe => finite(self.avg_roe),
            _ => None,
        }
    }

    /// True when at least one of the three averages is defined.
    pub fn has_any_average(&self) -> bool {
        [Metric::Pe, Metric::Pb, Metric::Roe]
            .iter()
            .any(|m| self.average(*m).is_some())
    }
}

/// Three-way valuation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Undervalued,
    Fair,
    Overvalued,
}

impl Judgment {
    /// Canonical scoring map used by every composite stage.
    pub fn score(&self) -> f64 {
        match self {
            Judgment::Undervalued => 0.0,
            Judgment::Fair => 0.5,
            Judgment::Overvalued => 1.0,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Judgment::Undervalued => "Undervalued",
            Judgment::Fair => "Fair",
            Judgment::Overvalued => "Overvalued",
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_label())
    }
}

/// Why a sub-judgment could not be formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    MissingFeature(Metric),
    ModelUnavailable,
    PredictionFailed(String),
    NoPeerData,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::MissingFeature(metric) => write!(f, "missing feature {}", metric),
            UnavailableReason::ModelUnavailable => f.write_str("model unavailable"),
            UnavailableReason::PredictionFailed(e) => write!(f, "prediction failed: {}", e),
            UnavailableReason::NoPeerData => f.write_str("no peer data"),
        }
    }
}

/// A categorical signal feeding the composite, or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SubJudgment {
    Judged(Judgment),
    Unavailable(UnavailableReason),
}

impl SubJudgment {
    /// Numeric input to the next stage; unavailable reads as indeterminate.
    pub fn score(&self) -> f64 {
        match self {
            SubJudgment::Judged(j) => j.score(),
            SubJudgment::Unavailable(_) => INDETERMINATE_SCORE,
        }
    }

    pub fn judgment(&self) -> Option<Judgment> {
        match self {
            SubJudgment::Judged(j) => Some(*j),
            SubJudgment::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SubJudgment::Judged(_))
    }
}

impl From<Judgment> for SubJudgment {
    fn from(j: Judgment) -> Self {
        SubJudgment::Judged(j)
    }
}

impl fmt::Display for SubJudgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubJudgment::Judged(j) => write!(f, "{}", j),
            SubJudgment::Unavailable(reason) => write!(f, "Unavailable ({})", reason),
        }
    }
}

/// Final call for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub judgment: Judgment,
    /// Final composite score, 0 = undervalued, 1 = overvalued.
    pub score: f64,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// Model input. Field names on the wire match the training columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "trailingPE")]
    pub pe: f64,
    #[serde(rename = "priceToBook")]
    pub pb: f64,
    #[serde(rename = "returnOnEquity")]
    pub roe: f64,
    #[serde(rename = "trailingEps")]
    pub eps: f64,
    #[serde(rename = "revenueGrowth")]
    pub revenue_growth: f64,
    #[serde(rename = "grossMargins")]
    pub gross_margin: f64,
    #[serde(rename = "marketCap")]
    pub market_cap: f64,
    #[serde(rename = "freeCashflow")]
    pub free_cashflow: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<f64>,
}

impl FeatureVector {
    /// Build the model input in training column order, or report the first
    /// missing feature.
    pub fn from_snapshot(snapshot: &MetricSnapshot, sentiment: Option<f64>) -> Result<Self, Metric> {
        let take = |m: Metric| snapshot.get(m).ok_or(m);
        Ok(Self {
            pe: take(Metric::Pe)?,
            pb: take(Metric::Pb)?,
            roe: take(Metric::Roe)?,
            eps: take(Metric::Eps)?,
            revenue_growth: take(Metric::RevenueGrowth)?,
            gross_margin: take(Metric::GrossMargin)?,
            market_cap: take(Metric::MarketCap)?,
            free_cashflow: take(Metric::FreeCashflow)?,
            sentiment: finite(sentiment),
        })
    }
}

/// One line of a rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub ticker: String,
    pub company_name: String,
    pub current_price: f64,
    pub predicted_price: Option<f64>,
    pub judgment: Judgment,
}

impl ReportRow {
    pub fn current_price_display(&self) -> String {
        format_currency(self.current_price)
    }

    pub fn predicted_price_display(&self) -> String {
        self.predicted_price
            .map(format_currency)
            .unwrap_or_else(|| "n/a".to_string())
    }
}

/// Two-decimal currency display.
pub fn format_currency(value: f64) -> String {
    format!("${:.2}", value)
}

/// Everything a renderer needs for one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub total_scanned: usize,
    pub skipped: usize,
    /// Rows were filtered down to undervalued verdicts.
    #[serde(default)]
    pub only_undervalued: bool,
}

impl ValuationReport {
    pub const NO_UNDERVALUED_MESSAGE: &'static str = "No undervalued stocks this week.";
    pub const NO_RESULTS_MESSAGE: &'static str = "No tickers could be evaluated.";

    /// Text shown in place of an empty table.
    pub fn empty_message(&self) -> &'static str {
        if self.only_undervalued {
            Self::NO_UNDERVALUED_MESSAGE
        } else {
            Self::NO_RESULTS_MESSAGE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_score_map() {
        assert_eq!(Judgment::Undervalued.score(), 0.0);
        assert_eq!(Judgment::Fair.score(), 0.5);
        assert_eq!(Judgment::Overvalued.score(), 1.0);
    }

    #[test]
    fn test_unavailable_is_indeterminate() {
        let sub = SubJudgment::Unavailable(UnavailableReason::ModelUnavailable);
        assert_eq!(sub.score(), INDETERMINATE_SCORE);
        assert!(sub.judgment().is_none());
    }

    #[test]
    fn test_normalized_drops_nan() {
        let snap = MetricSnapshot {
            pe: Some(f64::NAN),
            pb: Some(f64::INFINITY),
            roe: Some(0.2),
            ..MetricSnapshot::new("AAPL")
        }
        .normalized();
        assert_eq!(snap.pe, None);
        assert_eq!(snap.pb, None);
        assert_eq!(snap.roe, Some(0.2));
    }

    #[test]
    fn test_feature_vector_reports_missing_feature() {
        let snap = MetricSnapshot {
            pe: Some(20.0),
            pb: Some(3.0),
            roe: Some(0.2),
            eps: Some(5.0),
            revenue_growth: Some(0.1),
            gross_margin: None,
            market_cap: Some(1.0e9),
            free_cashflow: Some(1.0e8),
            current_price: Some(100.0),
            ..MetricSnapshot::new("AAPL")
        };
        assert_eq!(FeatureVector::from_snapshot(&snap, None), Err(Metric::GrossMargin));
    }

    #[test]
    fn test_feature_vector_wire_names() {
        let fv = FeatureVector {
            pe: 1.0,
            pb: 2.0,
            roe: 3.0,
            eps: 4.0,
            revenue_growth: 5.0,
            gross_margin: 6.0,
            market_cap: 7.0,
            free_cashflow: 8.0,
            sentiment: None,
        };
        let value = serde_json::to_value(&fv).unwrap();
        assert_eq!(value["trailingPE"], 1.0);
        assert_eq!(value["freeCashflow"], 8.0);
        assert!(value.get("sentiment").is_none());
    }

    #[test]
    fn test_report_row_currency_display() {
        let row = ReportRow {
            ticker: "NVO".to_string(),
            company_name: "Novo Nordisk".to_string(),
            current_price: 75.333,
            predicted_price: None,
            judgment: Judgment::Undervalued,
        };
        assert_eq!(row.current_price_display(), "$75.33");
        assert_eq!(row.predicted_price_display(), "n/a");
    }

    #[test]
    fn test_empty_message_follows_filter() {
        let mut report = ValuationReport {
            title: "Valuation scan".to_string(),
            generated_at: Utc::now(),
            rows: vec![],
            total_scanned: 2,
            skipped: 2,
            only_undervalued: false,
        };
        assert_eq!(report.empty_message(), "No tickers could be evaluated.");

        report.only_undervalued = true;
        assert_eq!(report.empty_message(), "No undervalued stocks this week.");
    }
}
