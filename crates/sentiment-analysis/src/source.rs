use analysis_core::{AnalysisError, SentimentSource};
use async_trait::async_trait;
use ml_client::SentimentClient;
use polygon_client::{NewsArticle, PolygonClient};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::HeadlineScorer;

/// Default number of recent articles considered per company.
pub const DEFAULT_NEWS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    /// Local word-list scorer.
    #[default]
    Lexicon,
    /// Remote FinBERT service.
    Service,
}

impl FromStr for SentimentBackend {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexicon" => Ok(SentimentBackend::Lexicon),
            "service" | "finbert" => Ok(SentimentBackend::Service),
            other => Err(AnalysisError::Config(format!(
                "unknown sentiment backend '{}' (expected lexicon or service)",
                other
            ))),
        }
    }
}

enum Scorer {
    Lexicon(HeadlineScorer),
    Service(SentimentClient),
}

/// News sentiment for a ticker: recent Polygon headlines scored locally or
/// by the FinBERT service.
pub struct NewsSentimentSource {
    polygon: PolygonClient,
    scorer: Scorer,
    news_limit: u32,
}

impl NewsSentimentSource {
    pub fn lexicon(polygon: PolygonClient) -> Self {
        Self {
            polygon,
            scorer: Scorer::Lexicon(HeadlineScorer::new()),
            news_limit: DEFAULT_NEWS_LIMIT,
        }
    }

    pub fn service(polygon: PolygonClient, client: SentimentClient) -> Self {
        Self {
            polygon,
            scorer: Scorer::Service(client),
            news_limit: DEFAULT_NEWS_LIMIT,
        }
    }

    pub fn with_news_limit(mut self, limit: u32) -> Self {
        self.news_limit = limit.max(1);
        self
    }

    /// Score already-fetched articles with the configured backend.
    pub async fn score_news(&self, symbol: &str, news: &[NewsArticle]) -> Result<f64, AnalysisError> {
        if news.is_empty() {
            tracing::debug!("{}: no recent news, sentiment 0.0", symbol);
            return Ok(0.0);
        }

        let score = match &self.scorer {
            Scorer::Lexicon(scorer) => {
                let (mean, scored) = scorer.score_articles(
                    news.iter().map(|a| (a.title.as_str(), a.description.as_deref())),
                );
                tracing::debug!("{}: lexicon scored {}/{} articles, mean {:.3}", symbol, scored, news.len(), mean);
                mean
            }
            Scorer::Service(client) => {
                let headlines = news.iter().map(|a| a.title.clone()).collect();
                let descriptions = news
                    .iter()
                    .map(|a| a.description.clone().unwrap_or_default())
                    .collect();
                let response = client
                    .analyze_news(headlines, Some(descriptions), Some(symbol.to_string()))
                    .await?;
                tracing::debug!(
                    "{}: FinBERT {} ({:.3}) over {} articles",
                    symbol,
                    response.overall_sentiment,
                    response.score,
                    response.article_count
                );
                response.score
            }
        };

        Ok(score.clamp(-1.0, 1.0))
    }
}

#[async_trait]
impl SentimentSource for NewsSentimentSource {
    async fn sentiment(&self, identifier: &str) -> Result<f64, AnalysisError> {
        let news = self.polygon.get_news(identifier, self.news_limit).await?;
        self.score_news(identifier, &news).await
    }

    fn name(&self) -> &str {
        match self.scorer {
            Scorer::Lexicon(_) => "lexicon",
            Scorer::Service(_) => "finbert",
        }
    }
}
