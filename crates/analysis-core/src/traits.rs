use async_trait::async_trait;
use crate::{AnalysisError, FeatureVector, MetricSnapshot, ValuationReport};

/// Source of per-ticker financial metrics.
///
/// Missing fields come back as `None` inside an `Ok` snapshot; `Err` is
/// reserved for total failures (network error, unknown ticker).
/// Implementations bound each network exchange themselves and report an
/// expired one as [`AnalysisError::Timeout`]; callers add no deadline.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError>;
}

/// News sentiment for a company, in [-1, 1].
#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn sentiment(&self, identifier: &str) -> Result<f64, AnalysisError>;

    fn name(&self) -> &str;
}

/// Pretrained fair-price regression model.
#[async_trait]
pub trait ValuationModel: Send + Sync {
    async fn predict(&self, features: &FeatureVector) -> Result<f64, AnalysisError>;
}

/// Output channel for a finished scan (console table, e-mail, ...).
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, report: &ValuationReport) -> Result<(), AnalysisError>;

    fn name(&self) -> &str;
}
