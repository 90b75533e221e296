use super::{Evaluation, ValuationOrchestrator};
use analysis_core::{AnalysisError, ReportRow, ValuationReport};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::StockMap;

/// Which tickers a scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchList {
    Custom(Vec<String>),
    /// Every ticker in the stock map.
    All,
    Industry(String),
}

impl WatchList {
    pub fn tickers(&self, stock_map: &StockMap) -> Vec<String> {
        match self {
            WatchList::Custom(tickers) => {
                let mut seen = std::collections::HashSet::new();
                tickers
                    .iter()
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty() && seen.insert(t.clone()))
                    .collect()
            }
            WatchList::All => stock_map.tickers(),
            WatchList::Industry(industry) => stock_map.tickers_in(industry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// In watch-list order.
    pub evaluations: Vec<Evaluation>,
    pub skipped: Vec<SkippedTicker>,
    pub total_scanned: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ScanResult {
    pub fn undervalued(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.is_undervalued())
    }

    /// Report rows for every verdict, or only the undervalued ones.
    pub fn rows(&self, only_undervalued: bool) -> Vec<ReportRow> {
        self.evaluations
            .iter()
            .filter(|e| !only_undervalued || e.is_undervalued())
            .filter_map(|e| e.to_report_row())
            .collect()
    }

    pub fn to_report(&self, title: impl Into<String>, only_undervalued: bool) -> ValuationReport {
        let unavailable = self
            .evaluations
            .iter()
            .filter(|e| e.score_card().is_none())
            .count();
        ValuationReport {
            title: title.into(),
            generated_at: self.timestamp,
            rows: self.rows(only_undervalued),
            total_scanned: self.total_scanned,
            skipped: self.skipped.len() + unavailable,
            only_undervalued,
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("evaluation panicked: {}", detail)
}

pub struct Screener {
    orchestrator: Arc<ValuationOrchestrator>,
}

impl Screener {
    pub fn new(orchestrator: Arc<ValuationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn scan(&self, watch_list: &WatchList) -> ScanResult {
        let tickers = watch_list.tickers(self.orchestrator.stock_map());
        let total_scanned = tickers.len();
        let concurrency = self.orchestrator.config().scan_concurrency.max(1);

        tracing::info!("Starting valuation scan of {} tickers ({} at a time)", total_scanned, concurrency);

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for (index, ticker) in tickers.into_iter().enumerate() {
            let orchestrator = Arc::clone(&self.orchestrator);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => AssertUnwindSafe(orchestrator.evaluate(&ticker))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(AnalysisError::ApiError(panic_message(panic)))),
                    Err(e) => Err(AnalysisError::ApiError(e.to_string())),
                };
                (index, ticker, result)
            });
        }

        let mut evaluations = Vec::new();
        let mut skipped = Vec::new();

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((index, _ticker, Ok(evaluation))) => evaluations.push((index, evaluation)),
                Ok((index, ticker, Err(e))) => {
                    tracing::warn!("Skipping {}: {}", ticker, e);
                    skipped.push((index, SkippedTicker { ticker, reason: e.to_string() }));
                }
                Err(e) => {
                    tracing::error!("Task error: {}", e);
                }
            }
        }

        evaluations.sort_by_key(|(index, _)| *index);
        skipped.sort_by_key(|(index, _)| *index);

        let result = ScanResult {
            evaluations: evaluations.into_iter().map(|(_, e)| e).collect(),
            skipped: skipped.into_iter().map(|(_, s)| s).collect(),
            total_scanned,
            timestamp: chrono::Utc::now(),
        };

        tracing::info!(
            "Scan complete: {} evaluated, {} undervalued, {} skipped",
            result.evaluations.len(),
            result.undervalued().count(),
            result.skipped.len()
        );

        result
    }
}
