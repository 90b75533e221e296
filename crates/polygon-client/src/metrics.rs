use analysis_core::{AnalysisError, MetricSnapshot, MetricsFetcher};
use async_trait::async_trait;

use crate::{PolygonClient, QuarterlyFinancials, TickerDetails};

/// Quarters summed into one trailing-twelve-month figure.
const TTM_QUARTERS: usize = 4;

/// Sum a field over `quarters[offset..offset + 4]`. Any gap yields `None`.
fn ttm<F>(quarters: &[QuarterlyFinancials], offset: usize, field: F) -> Option<f64>
where
    F: Fn(&QuarterlyFinancials) -> Option<f64>,
{
    let window = quarters.get(offset..offset + TTM_QUARTERS)?;
    window.iter().map(&field).sum::<Option<f64>>()
}

/// Build a metric snapshot from Polygon data.
///
/// `quarters` must be ordered newest first. Ratios that would divide by a
/// non-positive denominator are left as `None`.
pub fn derive_snapshot(
    ticker: &str,
    price: Option<f64>,
    quarters: &[QuarterlyFinancials],
    details: Option<&TickerDetails>,
) -> MetricSnapshot {
    let price = price.filter(|p| *p > 0.0);
    let shares = details.and_then(|d| d.shares_outstanding()).filter(|s| *s > 0.0);
    let equity = quarters.first().and_then(|q| q.shareholders_equity);

    let eps = ttm(quarters, 0, |q| q.eps);
    let net_income = ttm(quarters, 0, |q| q.net_income);
    let revenue = ttm(quarters, 0, |q| q.revenue);
    let prior_revenue = ttm(quarters, TTM_QUARTERS, |q| q.revenue);
    let gross_profit = ttm(quarters, 0, |q| q.gross_profit);
    let operating = ttm(quarters, 0, |q| q.cash_flow_operating);
    let investing = ttm(quarters, 0, |q| q.cash_flow_investing);

    let pe = match (price, eps) {
        (Some(p), Some(e)) if e > 0.0 => Some(p / e),
        _ => None,
    };

    let book_per_share = match (equity, shares) {
        (Some(eq), Some(sh)) if eq > 0.0 => Some(eq / sh),
        _ => None,
    };
    let pb = match (price, book_per_share) {
        (Some(p), Some(bvps)) => Some(p / bvps),
        _ => None,
    };

    let roe = match (net_income, equity) {
        (Some(ni), Some(eq)) if eq > 0.0 => Some(ni / eq),
        _ => None,
    };

    let revenue_growth = match (revenue, prior_revenue) {
        (Some(cur), Some(prev)) if prev > 0.0 => Some((cur - prev) / prev),
        _ => None,
    };

    let gross_margin = match (gross_profit, revenue) {
        (Some(gp), Some(rev)) if rev > 0.0 => Some(gp / rev),
        _ => None,
    };

    let free_cashflow = match (operating, investing) {
        (Some(op), Some(inv)) => Some(op + inv),
        _ => None,
    };

    let market_cap = details
        .and_then(|d| d.market_cap)
        .or_else(|| Some(price? * shares?));

    MetricSnapshot {
        ticker: ticker.to_string(),
        company_name: details.map(|d| d.name.clone()),
        pe,
        pb,
        roe,
        eps,
        revenue_growth,
        gross_margin,
        free_cashflow,
        market_cap,
        current_price: price,
    }
    .normalized()
}

/// [`MetricsFetcher`] backed by the Polygon REST API.
#[derive(Clone)]
pub struct PolygonMetricsFetcher {
    client: PolygonClient,
}

impl PolygonMetricsFetcher {
    pub fn new(client: PolygonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsFetcher for PolygonMetricsFetcher {
    async fn fetch(&self, ticker: &str) -> Result<MetricSnapshot, AnalysisError> {
        let (snapshot, financials, details) = tokio::join!(
            self.client.get_snapshot(ticker),
            self.client.get_financials(ticker),
            self.client.get_ticker_details(ticker),
        );

        let price = match snapshot {
            Ok(snap) => snap.current_price(),
            Err(e @ AnalysisError::UnknownTicker(_)) => return Err(e),
            Err(e) => {
                // Nothing usable at all: report the snapshot failure
                if financials.is_err() && details.is_err() {
                    return Err(e);
                }
                tracing::warn!("{}: snapshot unavailable: {}", ticker, e);
                None
            }
        };

        let quarters = financials.unwrap_or_else(|e| {
            tracing::warn!("{}: financials unavailable: {}", ticker, e);
            Vec::new()
        });

        let details = details
            .map_err(|e| tracing::warn!("{}: ticker details unavailable: {}", ticker, e))
            .ok();

        let snapshot = derive_snapshot(ticker, price, &quarters, details.as_ref());
        tracing::debug!(
            "{}: price={:?} pe={:?} pb={:?} roe={:?}",
            ticker,
            snapshot.current_price,
            snapshot.pe,
            snapshot.pb,
            snapshot.roe
        );
        Ok(snapshot)
    }
}
