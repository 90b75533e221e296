pub mod error;
pub mod price_predictor;
pub mod sentiment;

pub use error::{MLError, MLResult};
pub use price_predictor::PricePredictorClient;
pub use sentiment::SentimentClient;

use std::time::Duration;

/// Configuration for ML services.
///
/// A missing URL means the service is not deployed; callers treat that as
/// "no model" rather than falling back to a localhost default.
#[derive(Debug, Clone)]
pub struct MLConfig {
    pub sentiment_url: Option<String>,
    pub price_predictor_url: Option<String>,
    pub timeout: Duration,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            sentiment_url: None,
            price_predictor_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl MLConfig {
    pub fn from_env() -> Self {
        let url = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            sentiment_url: url("ML_SENTIMENT_URL"),
            price_predictor_url: url("ML_PRICE_PREDICTOR_URL"),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn price_predictor(&self) -> Option<PricePredictorClient> {
        self.price_predictor_url
            .as_ref()
            .map(|url| PricePredictorClient::new(url.clone(), self.timeout))
    }

    pub fn sentiment(&self) -> Option<SentimentClient> {
        self.sentiment_url
            .as_ref()
            .map(|url| SentimentClient::new(url.clone(), self.timeout))
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
