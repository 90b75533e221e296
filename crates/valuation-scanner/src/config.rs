use analysis_orchestrator::OrchestratorConfig;
use anyhow::{Context, Result};
use ml_client::MLConfig;
use notification_service::NotificationConfig;
use sentiment_analysis::{SentimentBackend, DEFAULT_NEWS_LIMIT};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use valuation_scoring::{ScoringConfig, ThresholdPolicy};

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub polygon_api_key: String,
    /// Polygon requests per minute.
    pub polygon_rate_limit: usize,
    pub ml: MLConfig,
    pub sentiment_backend: SentimentBackend,
    /// Headlines scored per ticker.
    pub news_limit: u32,
    pub stock_map_path: PathBuf,
    pub fetch_timeout: Duration,
    pub snapshot_cache_ttl: Duration,
    pub peer_concurrency: usize,
    pub scan_concurrency: usize,
    pub scoring: ScoringConfig,
    pub notification: NotificationConfig,
}

/// Parse `key` from the lookup, or use `default` when it is unset or blank.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl ScannerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.ml = MLConfig::from_env().with_timeout(config.fetch_timeout);
        config.notification = NotificationConfig::from_env();
        Ok(config)
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let polygon_api_key = lookup("POLYGON_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("POLYGON_API_KEY must be set")?;

        let fetch_timeout = Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 10u64)?);

        let policy_name = lookup("THRESHOLD_POLICY")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default();
        let policy = match policy_name.as_str() {
            "" | "dead_zone" | "dead-zone" => ThresholdPolicy::DeadZone {
                lower: parse_or(&lookup, "THRESHOLD_LOWER", 0.3)?,
                upper: parse_or(&lookup, "THRESHOLD_UPPER", 0.6)?,
            },
            "binary" => ThresholdPolicy::Binary {
                cutoff: parse_or(&lookup, "THRESHOLD_CUTOFF", 0.5)?,
            },
            other => anyhow::bail!(
                "invalid THRESHOLD_POLICY '{}': expected 'dead_zone' or 'binary'",
                other
            ),
        };
        policy
            .validate()
            .context("invalid threshold settings")?;

        let scoring = ScoringConfig {
            policy,
            include_sentiment_feature: parse_or(&lookup, "INCLUDE_SENTIMENT_FEATURE", true)?,
            ..ScoringConfig::default()
        };

        let sentiment_backend = match lookup("SENTIMENT_BACKEND") {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse()
                .context("invalid SENTIMENT_BACKEND")?,
            _ => SentimentBackend::default(),
        };

        Ok(Self {
            polygon_api_key,
            polygon_rate_limit: parse_or(&lookup, "POLYGON_RATE_LIMIT", 5usize)?,
            ml: MLConfig::default().with_timeout(fetch_timeout),
            sentiment_backend,
            news_limit: parse_or(&lookup, "NEWS_LIMIT", DEFAULT_NEWS_LIMIT)?,
            stock_map_path: PathBuf::from(
                lookup("STOCK_MAP_PATH")
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| "stock_map.json".to_string()),
            ),
            fetch_timeout,
            snapshot_cache_ttl: Duration::from_secs(parse_or(&lookup, "SNAPSHOT_CACHE_TTL_SECS", 900u64)?),
            peer_concurrency: parse_or(&lookup, "PEER_CONCURRENCY", 8usize)?,
            scan_concurrency: parse_or(&lookup, "SCAN_CONCURRENCY", 4usize)?,
            scoring,
            notification: NotificationConfig::default(),
        })
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            snapshot_cache_ttl: self.snapshot_cache_ttl,
            peer_concurrency: self.peer_concurrency,
            scan_concurrency: self.scan_concurrency,
        }
    }
}
