use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{MLError, MLResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSentimentResponse {
    pub overall_sentiment: String,
    /// Aggregate polarity in [-1, 1].
    pub score: f64,
    pub confidence: f64,
    #[serde(default)]
    pub article_count: usize,
    #[serde(default)]
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
struct NewsSentimentRequest {
    headlines: Vec<String>,
    descriptions: Option<Vec<String>>,
    symbol: Option<String>,
}

/// Client for the FinBERT news sentiment service.
#[derive(Clone)]
pub struct SentimentClient {
    client: reqwest::Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: crate::http_client(timeout),
            base_url,
        }
    }

    /// Analyze sentiment from news articles
    pub async fn analyze_news(
        &self,
        headlines: Vec<String>,
        descriptions: Option<Vec<String>>,
        symbol: Option<String>,
    ) -> MLResult<NewsSentimentResponse> {
        let request = NewsSentimentRequest {
            headlines,
            descriptions,
            symbol,
        };

        let response = self
            .client
            .post(format!("{}/analyze-news", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response.json::<NewsSentimentResponse>().await?;
        if !result.score.is_finite() {
            return Err(MLError::InvalidResponse("non-finite sentiment score".to_string()));
        }
        Ok(result)
    }

    /// Check service health
    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}
