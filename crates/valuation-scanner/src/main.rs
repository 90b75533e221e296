//! valuation-scanner: judge tickers undervalued / fair / overvalued against
//! their industry peers, a fair-price model and recent news sentiment.
//!
//! Usage:
//!   cargo run -p valuation-scanner -- --tickers AMD NVDA
//!   cargo run -p valuation-scanner -- --industry Semiconductors
//!   cargo run -p valuation-scanner -- --all --only-undervalued --email

mod args;
mod config;

use analysis_core::{ReportRenderer, SentimentSource, ValuationModel};
use analysis_orchestrator::{Screener, StockMap, ValuationOrchestrator};
use anyhow::{Context, Result};
use notification_service::{EmailReportRenderer, TableRenderer};
use polygon_client::{PolygonClient, PolygonMetricsFetcher};
use sentiment_analysis::{NewsSentimentSource, SentimentBackend};
use std::sync::Arc;
use valuation_scoring::ScoringEngine;

use args::{CliArgs, USAGE};
use config::ScannerConfig;

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(
                "valuation_scanner=info,analysis_orchestrator=info,polygon_client=warn",
            )
        })
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

/// News sentiment backend. The FinBERT service is only used when it answers
/// its health check; otherwise the lexicon scorer takes over.
async fn sentiment_source(config: &ScannerConfig, polygon: PolygonClient) -> Arc<dyn SentimentSource> {
    let source = match (config.sentiment_backend, config.ml.sentiment()) {
        (SentimentBackend::Service, Some(client)) => {
            let healthy = client.health().await.unwrap_or_else(|e| {
                tracing::warn!("Sentiment service health check failed: {}", e);
                false
            });
            if healthy {
                NewsSentimentSource::service(polygon, client)
            } else {
                tracing::warn!("Sentiment service unavailable; using lexicon");
                NewsSentimentSource::lexicon(polygon)
            }
        }
        (SentimentBackend::Service, None) => {
            tracing::warn!("SENTIMENT_BACKEND=service but ML_SENTIMENT_URL is unset; using lexicon");
            NewsSentimentSource::lexicon(polygon)
        }
        (SentimentBackend::Lexicon, _) => NewsSentimentSource::lexicon(polygon),
    };
    Arc::new(source.with_news_limit(config.news_limit))
}

/// Fair-price model, if configured. An unhealthy service is still wired in:
/// each failed prediction degrades that ticker's technical judgment.
async fn valuation_model(config: &ScannerConfig) -> Option<Arc<dyn ValuationModel>> {
    let client = config.ml.price_predictor()?;
    match client.health().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Price predictor reports unhealthy; predictions may fail"),
        Err(e) => tracing::warn!("Price predictor health check failed: {}", e),
    }
    Some(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    if raw_args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }
    let cli = match CliArgs::parse(&raw_args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = ScannerConfig::from_env().context("loading configuration")?;

    let stock_map_path = cli.stock_map.clone().unwrap_or_else(|| config.stock_map_path.clone());
    let stock_map = Arc::new(
        StockMap::load(&stock_map_path)
            .with_context(|| format!("loading stock map {}", stock_map_path.display()))?,
    );

    // Build renderers up front so a bad SMTP setup fails before the scan
    let mut renderers: Vec<Box<dyn ReportRenderer>> = vec![Box::new(TableRenderer::new())];
    if cli.email {
        if !config.notification.is_email_configured() {
            anyhow::bail!("--email needs SMTP_HOST, SMTP_FROM_ADDRESS and NOTIFICATION_EMAIL_TO");
        }
        let email = EmailReportRenderer::new(&config.notification).context("configuring e-mail report")?;
        renderers.push(Box::new(email));
    }

    let polygon = PolygonClient::new(
        config.polygon_api_key.clone(),
        config.polygon_rate_limit,
        config.fetch_timeout,
    );
    let fetcher = Arc::new(PolygonMetricsFetcher::new(polygon.clone()));
    let sentiment = sentiment_source(&config, polygon).await;
    let model = valuation_model(&config).await;
    let engine = ScoringEngine::new(config.scoring).context("invalid scoring configuration")?;

    tracing::info!(
        "Sentiment via {}, model {}, thresholds {:?}",
        sentiment.name(),
        if model.is_some() { "configured" } else { "not configured" },
        engine.config().policy
    );

    let orchestrator = Arc::new(ValuationOrchestrator::new(
        fetcher,
        sentiment,
        model,
        engine,
        stock_map,
        config.orchestrator(),
    ));

    let result = Screener::new(orchestrator).scan(&cli.watch_list).await;
    let report = result.to_report(cli.report_title(), cli.only_undervalued);

    let mut failed = 0;
    for renderer in &renderers {
        if let Err(e) = renderer.render(&report).await {
            tracing::error!("{} renderer failed: {}", renderer.name(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{} of {} report outputs failed", failed, renderers.len());
    }

    Ok(())
}
