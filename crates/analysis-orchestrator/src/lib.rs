//! Per-ticker valuation and watch-list scanning.
//!
//! [`ValuationOrchestrator`] gathers the subject snapshot, its news
//! sentiment and the industry baseline concurrently, then hands them to the
//! [`ScoringEngine`]. [`Screener`] runs that over a list of tickers.

use analysis_core::{
    AnalysisError, Judgment, MetricSnapshot, MetricsFetcher, PeerBaseline, ReportRow,
    SentimentSource, ValuationModel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use valuation_scoring::{ScoreCard, ScoringEngine, SentimentReading};

pub mod cache;
pub mod peers;
pub mod screener;

pub use cache::CachedMetricsFetcher;
pub use peers::{aggregate, PeerAverager, StockEntry, StockMap};
pub use screener::{ScanResult, Screener, SkippedTicker, WatchList};

/// Industry label used when a ticker is missing from the stock map.
pub const UNKNOWN_INDUSTRY: &str = "Unknown";

/// Network timeouts are not set here: each collaborator bounds its own HTTP
/// exchanges, so waiting in a client's rate-limit queue never fails a fetch.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub snapshot_cache_ttl: Duration,
    pub peer_concurrency: usize,
    pub scan_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            snapshot_cache_ttl: Duration::from_secs(900),
            peer_concurrency: 8,
            scan_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Scored(Box<ScoreCard>),
    /// No current price, so nothing can be judged.
    Unavailable { reason: String },
}

/// Result of evaluating one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ticker: String,
    pub company_name: String,
    pub industry: String,
    pub snapshot: MetricSnapshot,
    pub baseline: PeerBaseline,
    pub outcome: EvaluationOutcome,
}

impl Evaluation {
    pub fn score_card(&self) -> Option<&ScoreCard> {
        match &self.outcome {
            EvaluationOutcome::Scored(card) => Some(card),
            EvaluationOutcome::Unavailable { .. } => None,
        }
    }

    pub fn judgment(&self) -> Option<Judgment> {
        self.score_card().map(|c| c.verdict.judgment)
    }

    pub fn is_undervalued(&self) -> bool {
        self.judgment() == Some(Judgment::Undervalued)
    }

    /// Report line; `None` when the evaluation produced no verdict.
    pub fn to_report_row(&self) -> Option<ReportRow> {
        let card = self.score_card()?;
        Some(ReportRow {
            ticker: self.ticker.clone(),
            company_name: self.company_name.clone(),
            current_price: self.snapshot.current_price?,
            predicted_price: card.technical.predicted_price,
            judgment: card.verdict.judgment,
        })
    }
}

pub struct ValuationOrchestrator {
    fetcher: Arc<CachedMetricsFetcher>,
    peers: PeerAverager,
    sentiment: Arc<dyn SentimentSource>,
    model: Option<Arc<dyn ValuationModel>>,
    engine: ScoringEngine,
    stock_map: Arc<StockMap>,
    config: OrchestratorConfig,
}

impl ValuationOrchestrator {
    pub fn new(
        fetcher: Arc<dyn MetricsFetcher>,
        sentiment: Arc<dyn SentimentSource>,
        model: Option<Arc<dyn ValuationModel>>,
        engine: ScoringEngine,
        stock_map: Arc<StockMap>,
        config: OrchestratorConfig,
    ) -> Self {
        let fetcher = Arc::new(CachedMetricsFetcher::new(fetcher, config.snapshot_cache_ttl));
        let peers = PeerAverager::new(
            fetcher.clone() as Arc<dyn MetricsFetcher>,
            Arc::clone(&stock_map),
            config.peer_concurrency,
        );

        if model.is_none() {
            tracing::warn!("No valuation model configured; technical judgments will be unavailable");
        }

        Self {
            fetcher,
            peers,
            sentiment,
            model,
            engine,
            stock_map,
            config,
        }
    }

    pub fn stock_map(&self) -> &StockMap {
        &self.stock_map
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Sentiment for the ticker, falling back to neutral on any error
    /// (including a timed-out request).
    async fn sentiment_reading(&self, ticker: &str) -> SentimentReading {
        match self.sentiment.sentiment(ticker).await {
            Ok(score) => SentimentReading::from_score(score),
            Err(e) => {
                tracing::warn!("{}: {} sentiment failed, using 0.0: {}", ticker, self.sentiment.name(), e);
                SentimentReading::fallback()
            }
        }
    }

    async fn baseline(&self, industry: &str, ticker: &str) -> PeerBaseline {
        if industry == UNKNOWN_INDUSTRY {
            return PeerBaseline::empty(industry);
        }
        self.peers.baseline(industry, ticker).await
    }

    /// Evaluate one ticker. `Err` only when its snapshot cannot be fetched
    /// at all; every other gap degrades the verdict toward "fair".
    pub async fn evaluate(&self, ticker: &str) -> Result<Evaluation, AnalysisError> {
        let ticker = ticker.trim().to_uppercase();
        let industry = match self.stock_map.industry_of(&ticker) {
            Some(industry) => industry.to_string(),
            None => {
                tracing::warn!("{}: not in stock map, industry comparison unavailable", ticker);
                UNKNOWN_INDUSTRY.to_string()
            }
        };

        let (snapshot, sentiment, baseline) = tokio::join!(
            self.fetcher.fetch(&ticker),
            self.sentiment_reading(&ticker),
            self.baseline(&industry, &ticker),
        );
        let snapshot = snapshot?;

        let company_name = self
            .stock_map
            .entry(&ticker)
            .and_then(|e| e.name.clone())
            .or_else(|| snapshot.company_name.clone())
            .unwrap_or_else(|| ticker.clone());

        let outcome = if snapshot.current_price.is_none() {
            tracing::warn!("{}: no current price, evaluation unavailable", ticker);
            EvaluationOutcome::Unavailable {
                reason: "missing current price".to_string(),
            }
        } else {
            let card = self
                .engine
                .score(&snapshot, &baseline, sentiment, self.model.as_deref())
                .await;
            tracing::info!(
                "{}: {} (score {:.2}, confidence {:.2}) {}",
                ticker,
                card.verdict.judgment,
                card.verdict.score,
                card.verdict.confidence,
                card.reason
            );
            EvaluationOutcome::Scored(Box::new(card))
        };

        Ok(Evaluation {
            ticker,
            company_name,
            industry,
            snapshot,
            baseline,
            outcome,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use analysis_core::FeatureVector;
    use async_trait::async_trait;
    use std::collections::HashMap;

    pub const MAP_JSON: &str = r#"[
        {"ticker": "AMD", "industry": "Semiconductors", "name": "Advanced Micro Devices"},
        {"ticker": "NVDA", "industry": "Semiconductors", "name": "NVIDIA"},
        {"ticker": "INTC", "industry": "Semiconductors", "name": "Intel"},
        {"ticker": "AAPL", "industry": "Consumer Electronics", "name": "Apple"}
    ]"#;

    pub struct StubFetcher(pub HashMap<String, MetricSnapshot>);

    #[async_trait]
    impl MetricsFetcher for StubFetcher {
        async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError> {
            self.0
                .get(ticker)
                .cloned()
                .ok_or_else(|| AnalysisError::UnknownTicker(ticker.to_string()))
        }
    }

    pub struct StubSentiment(pub Result<f64, AnalysisError>);

    #[async_trait]
    impl SentimentSource for StubSentiment {
        async fn sentiment(&self, _identifier: &str) -> Result<f64, AnalysisError> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Predicts a fixed multiple of the pe feature.
    pub struct PeModel(pub f64);

    #[async_trait]
    impl ValuationModel for PeModel {
        async fn predict(&self, features: &FeatureVector) -> Result<f64, AnalysisError> {
            Ok(features.pe * self.0)
        }
    }

    pub fn full(ticker: &str, price: f64, pe: f64, pb: f64, roe: f64) -> MetricSnapshot {
        MetricSnapshot {
            current_price: Some(price),
            pe: Some(pe),
            pb: Some(pb),
            roe: Some(roe),
            eps: Some(price / pe),
            revenue_growth: Some(0.1),
            gross_margin: Some(0.5),
            free_cashflow: Some(1e9),
            market_cap: Some(1e11),
            ..MetricSnapshot::new(ticker)
        }
    }

    pub fn universe() -> HashMap<String, MetricSnapshot> {
        let mut data = HashMap::new();
        data.insert("AMD".to_string(), full("AMD", 150.0, 15.0, 3.0, 0.18));
        data.insert("NVDA".to_string(), full("NVDA", 800.0, 20.0, 2.0, 0.15));
        data.insert("INTC".to_string(), full("INTC", 30.0, 20.0, 2.0, 0.15));
        data.insert("AAPL".to_string(), full("AAPL", 200.0, 30.0, 40.0, 1.5));
        data
    }

    pub fn orchestrator(
        data: HashMap<String, MetricSnapshot>,
        sentiment: Result<f64, AnalysisError>,
        model: Option<Arc<dyn ValuationModel>>,
    ) -> ValuationOrchestrator {
        orchestrator_with(Arc::new(StubFetcher(data)), Arc::new(StubSentiment(sentiment)), model)
    }

    pub fn orchestrator_with(
        fetcher: Arc<dyn MetricsFetcher>,
        sentiment: Arc<dyn SentimentSource>,
        model: Option<Arc<dyn ValuationModel>>,
    ) -> ValuationOrchestrator {
        ValuationOrchestrator::new(
            fetcher,
            sentiment,
            model,
            ScoringEngine::default(),
            Arc::new(StockMap::from_json(MAP_JSON).unwrap()),
            OrchestratorConfig::default(),
        )
    }
}
