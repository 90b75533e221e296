use analysis_core::AnalysisError;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod metrics;

pub use metrics::{derive_snapshot, PolygonMetricsFetcher};

const BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let oldest = match ts.front() {
                Some(&front) => front,
                None => continue,
            };
            let wait_until = oldest + self.window;
            let sleep_dur = wait_until.duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// `rate_limit` is requests per minute (5 on the free tier).
    pub fn new(api_key: String, rate_limit: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            // The client timeout starts at execute, after a slot is granted
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await.map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(e.to_string())
                } else {
                    AnalysisError::ApiError(e.to_string())
                }
            })?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    /// Map a non-success response to an error, treating 404 as an unknown ticker.
    async fn error_for(symbol: &str, what: &str, response: reqwest::Response) -> AnalysisError {
        if response.status() == StatusCode::NOT_FOUND {
            return AnalysisError::UnknownTicker(symbol.to_string());
        }
        AnalysisError::ApiError(format!(
            "{} HTTP {}: {}",
            what,
            response.status(),
            response.text().await.unwrap_or_default()
        ))
    }

    /// Get quarterly company financials, newest first
    pub async fn get_financials(&self, symbol: &str) -> Result<Vec<QuarterlyFinancials>, AnalysisError> {
        let url = format!("{}/vX/reference/financials", BASE_URL);

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("ticker", symbol),
                ("timeframe", "quarterly"),
                ("order", "desc"),
                ("sort", "period_of_report_date"),
                ("apiKey", &self.api_key),
                ("limit", "8"),
            ])
        ).await?;

        if !response.status().is_success() {
            // Plans without fundamentals access: report partial data, not a failure
            if response.status() == StatusCode::FORBIDDEN || response.status() == StatusCode::UNAUTHORIZED {
                return Ok(Vec::new());
            }
            return Err(Self::error_for(symbol, "Financials", response).await);
        }

        let fin_response: FinancialsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(fin_response
            .results
            .into_iter()
            .map(|r| QuarterlyFinancials::from_result(symbol, r))
            .collect())
    }

    /// Get news articles
    pub async fn get_news(&self, symbol: &str, limit: u32) -> Result<Vec<NewsArticle>, AnalysisError> {
        let url = format!("{}/v2/reference/news", BASE_URL);

        let query = vec![
            ("apiKey", self.api_key.clone()),
            ("limit", limit.to_string()),
            ("ticker", symbol.to_string()),
        ];

        let response = self.send_request(
            self.client.get(&url).query(&query)
        ).await?;

        if !response.status().is_success() {
            return Err(Self::error_for(symbol, "News", response).await);
        }

        let news_response: NewsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(news_response
            .results
            .into_iter()
            .map(|r| NewsArticle {
                id: r.id,
                title: r.title,
                published_utc: DateTime::parse_from_rfc3339(&r.published_utc)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                article_url: r.article_url,
                description: r.description,
                keywords: r.keywords.unwrap_or_default(),
                tickers: r.tickers,
            })
            .collect())
    }

    /// Get ticker details
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, AnalysisError> {
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);

        let response = self.send_request(
            self.client.get(&url).query(&[("apiKey", &self.api_key)])
        ).await?;

        if !response.status().is_success() {
            return Err(Self::error_for(symbol, "Ticker details", response).await);
        }

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(details_response.results)
    }

    /// Get snapshot for a ticker (near-real-time last trade, today's OHLCV, prev day)
    pub async fn get_snapshot(&self, symbol: &str) -> Result<SnapshotTicker, AnalysisError> {
        let url = format!(
            "{}/v2/snapshot/locale/us/markets/stocks/tickers/{}",
            BASE_URL, symbol
        );

        let response = self.send_request(
            self.client.get(&url).query(&[("apiKey", &self.api_key)])
        ).await?;

        if !response.status().is_success() {
            return Err(Self::error_for(symbol, "Snapshot", response).await);
        }

        let snap_response: SnapshotResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(snap_response.ticker)
    }
}

/// One fiscal quarter of reported figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyFinancials {
    pub symbol: String,
    pub fiscal_period: String,
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    pub shareholders_equity: Option<f64>,
    pub cash_flow_operating: Option<f64>,
    pub cash_flow_investing: Option<f64>,
}

impl QuarterlyFinancials {
    fn from_result(symbol: &str, r: FinancialResult) -> Self {
        let income = r.financials.income_statement;
        let balance = r.financials.balance_sheet;
        let cash_flow = r.financials.cash_flow_statement;
        let value = |section: &HashMap<String, serde_json::Value>, key: &str| {
            section.get(key).and_then(|v| v.get("value")).and_then(|v| v.as_f64())
        };

        Self {
            symbol: symbol.to_string(),
            fiscal_period: r.fiscal_period,
            fiscal_year: r.fiscal_year.parse().unwrap_or(0),
            revenue: value(&income, "revenues"),
            gross_profit: value(&income, "gross_profit"),
            net_income: value(&income, "net_income_loss"),
            eps: value(&income, "basic_earnings_per_share"),
            shareholders_equity: value(&balance, "equity"),
            cash_flow_operating: value(&cash_flow, "net_cash_flow_from_operating_activities"),
            cash_flow_investing: value(&cash_flow, "net_cash_flow_from_investing_activities"),
        }
    }
}

/// News article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub published_utc: DateTime<Utc>,
    pub article_url: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub tickers: Vec<String>,
}

// Response structures
#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialResult>,
}

#[derive(Debug, Deserialize)]
struct FinancialResult {
    fiscal_period: String,
    fiscal_year: String,
    financials: FinancialStatements,
}

#[derive(Debug, Deserialize)]
struct FinancialStatements {
    #[serde(default)]
    income_statement: HashMap<String, serde_json::Value>,
    #[serde(default)]
    balance_sheet: HashMap<String, serde_json::Value>,
    #[serde(default)]
    cash_flow_statement: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    id: String,
    title: String,
    published_utc: String,
    article_url: String,
    description: Option<String>,
    keywords: Option<Vec<String>>,
    #[serde(default)]
    tickers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub share_class_shares_outstanding: Option<f64>,
    pub weighted_shares_outstanding: Option<f64>,
}

impl TickerDetails {
    pub fn shares_outstanding(&self) -> Option<f64> {
        self.weighted_shares_outstanding
            .or(self.share_class_shares_outstanding)
    }
}

// Snapshot types
#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    ticker: SnapshotTicker,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotTicker {
    pub day: Option<SnapshotDay>,
    #[serde(rename = "lastTrade")]
    pub last_trade: Option<SnapshotLastTrade>,
    #[serde(rename = "prevDay")]
    pub prev_day: Option<SnapshotDay>,
}

impl SnapshotTicker {
    /// Last trade price, falling back to today's close, then yesterday's.
    /// Zero prices (pre-market snapshots) are skipped.
    pub fn current_price(&self) -> Option<f64> {
        let positive = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 0.0);
        positive(self.last_trade.as_ref().and_then(|t| t.p))
            .or_else(|| positive(self.day.as_ref().and_then(|d| d.c)))
            .or_else(|| positive(self.prev_day.as_ref().and_then(|d| d.c)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDay {
    pub o: Option<f64>,
    pub h: Option<f64>,
    pub l: Option<f64>,
    pub c: Option<f64>,
    pub v: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotLastTrade {
    pub p: Option<f64>,
    pub s: Option<i64>,
    pub t: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_waits_for_a_slot_instead_of_failing() {
        // 5 per 600ms is the free tier's 5/min scaled down
        let limiter = RateLimiter::new(5, Duration::from_millis(600));
        for _ in 0..5 {
            limiter.acquire().await;
        }

        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(limiter.timestamps.lock().await.len(), 1);
    }

    #[test]
    fn test_parse_financials_result() {
        let body = serde_json::json!({
            "results": [{
                "fiscal_period": "Q2",
                "fiscal_year": "2024",
                "financials": {
                    "income_statement": {
                        "revenues": {"value": 1000.0},
                        "gross_profit": {"value": 450.0},
                        "net_income_loss": {"value": 120.0},
                        "basic_earnings_per_share": {"value": 1.2}
                    },
                    "balance_sheet": {"equity": {"value": 4000.0}},
                    "cash_flow_statement": {
                        "net_cash_flow_from_operating_activities": {"value": 200.0}
                    }
                }
            }]
        });
        let parsed: FinancialsResponse = serde_json::from_value(body).unwrap();
        let quarters: Vec<QuarterlyFinancials> = parsed
            .results
            .into_iter()
            .map(|r| QuarterlyFinancials::from_result("AMD", r))
            .collect();

        assert_eq!(quarters.len(), 1);
        let q = &quarters[0];
        assert_eq!(q.fiscal_year, 2024);
        assert_eq!(q.revenue, Some(1000.0));
        assert_eq!(q.shareholders_equity, Some(4000.0));
        assert_eq!(q.cash_flow_investing, None);
    }

    #[test]
    fn test_snapshot_price_fallbacks() {
        let body = serde_json::json!({
            "ticker": {
                "day": {"c": 0.0},
                "lastTrade": null,
                "prevDay": {"c": 101.5}
            }
        });
        let parsed: SnapshotResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.ticker.current_price(), Some(101.5));

        let snap = SnapshotTicker {
            last_trade: Some(SnapshotLastTrade { p: Some(99.0), s: None, t: None }),
            ..Default::default()
        };
        assert_eq!(snap.current_price(), Some(99.0));
        assert_eq!(SnapshotTicker::default().current_price(), None);
    }

    #[tokio::test]
    #[ignore] // Only run with a valid POLYGON_API_KEY
    async fn test_get_snapshot_live() {
        let key = std::env::var("POLYGON_API_KEY").unwrap();
        let client = PolygonClient::new(key, 5, Duration::from_secs(10));
        let snap = client.get_snapshot("AAPL").await.unwrap();
        println!("AAPL price: {:?}", snap.current_price());
        assert!(snap.current_price().is_some());
    }
}
