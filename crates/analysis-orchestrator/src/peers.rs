use analysis_core::{stats, AnalysisError, ContributorCounts, MetricSnapshot, MetricsFetcher, PeerBaseline};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// One row of the peer mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub ticker: String,
    pub industry: String,
    /// Display name used in reports.
    #[serde(default)]
    pub name: Option<String>,
}

/// Ticker → industry mapping loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct StockMap {
    entries: Vec<StockEntry>,
}

impl StockMap {
    pub fn new(entries: Vec<StockEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| StockEntry {
                ticker: e.ticker.trim().to_uppercase(),
                industry: e.industry.trim().to_string(),
                name: e.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            })
            .filter(|e| !e.ticker.is_empty())
            .collect();
        Self { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let entries: Vec<StockEntry> = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidData(format!("stock map: {}", e)))?;
        Ok(Self::new(entries))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read stock map {}: {}", path.display(), e))
        })?;
        let map = Self::from_json(&json)?;
        tracing::info!(
            "Loaded stock map: {} tickers across {} industries",
            map.len(),
            map.industries().len()
        );
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, ticker: &str) -> Option<&StockEntry> {
        let ticker = ticker.trim().to_uppercase();
        self.entries.iter().find(|e| e.ticker == ticker)
    }

    pub fn industry_of(&self, ticker: &str) -> Option<&str> {
        self.entry(ticker).map(|e| e.industry.as_str())
    }

    /// All tickers in table order, without duplicates.
    pub fn tickers(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|e| seen.insert(e.ticker.clone()))
            .map(|e| e.ticker.clone())
            .collect()
    }

    pub fn tickers_in(&self, industry: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|e| e.industry.eq_ignore_ascii_case(industry.trim()))
            .filter(|e| seen.insert(e.ticker.clone()))
            .map(|e| e.ticker.clone())
            .collect()
    }

    /// Other tickers sharing `industry`; the subject is excluded.
    pub fn peers_of(&self, industry: &str, subject: &str) -> Vec<String> {
        let subject = subject.trim().to_uppercase();
        self.tickers_in(industry)
            .into_iter()
            .filter(|t| *t != subject)
            .collect()
    }

    pub fn industries(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.industry.as_str()).collect()
    }
}

/// Average pe, pb and roe over the snapshots that reported them.
pub fn aggregate(industry: &str, peers_requested: usize, snapshots: &[MetricSnapshot]) -> PeerBaseline {
    let (avg_pe, pe) = stats::mean_present(snapshots.iter().map(|s| s.pe));
    let (avg_pb, pb) = stats::mean_present(snapshots.iter().map(|s| s.pb));
    let (avg_roe, roe) = stats::mean_present(snapshots.iter().map(|s| s.roe));

    PeerBaseline {
        industry: industry.to_string(),
        avg_pe,
        avg_pb,
        avg_roe,
        peers_requested,
        peers_fetched: snapshots.len(),
        contributors: ContributorCounts { pe, pb, roe },
    }
}

/// Builds industry baselines from concurrent, best-effort peer fetches.
pub struct PeerAverager {
    fetcher: Arc<dyn MetricsFetcher>,
    stock_map: Arc<StockMap>,
    concurrency: usize,
}

impl PeerAverager {
    pub fn new(fetcher: Arc<dyn MetricsFetcher>, stock_map: Arc<StockMap>, concurrency: usize) -> Self {
        Self {
            fetcher,
            stock_map,
            concurrency: concurrency.max(1),
        }
    }

    /// Peer averages for `industry`, excluding `subject`. Failed peers are
    /// logged and skipped; this never fails.
    pub async fn baseline(&self, industry: &str, subject: &str) -> PeerBaseline {
        let peers = self.stock_map.peers_of(industry, subject);
        if peers.is_empty() {
            tracing::warn!("{}: no peers listed for industry '{}'", subject, industry);
            return PeerBaseline::empty(industry);
        }

        let requested = peers.len();
        let snapshots: Vec<MetricSnapshot> = stream::iter(peers)
            .map(|peer| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    match fetcher.fetch(&peer).await {
                        Ok(snapshot) => Some(snapshot),
                        Err(e) => {
                            tracing::warn!("Skipping peer {}: {}", peer, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|s| async move { s })
            .collect()
            .await;

        let baseline = aggregate(industry, requested, &snapshots);
        tracing::debug!(
            "{} baseline: {}/{} peers, pe={:?} pb={:?} roe={:?}",
            industry,
            baseline.peers_fetched,
            baseline.peers_requested,
            baseline.avg_pe,
            baseline.avg_pb,
            baseline.avg_roe
        );
        baseline
    }
}
