use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod cache;
mod config;
mod dashboard;
mod data;
mod scrape;

use cache::SnapshotCache;
use config::Config;
use dashboard::AppState;
use scrape::{ChromeFetcher, PageFetcher, SourceAggregator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let fetcher: Arc<dyn PageFetcher> = Arc::new(ChromeFetcher::new(config.browser_settings()));
    let aggregator = SourceAggregator::new(
        fetcher,
        config.standings_page(),
        config.results_page(),
        config.navigation_timeout(),
        config.results_scan_limit,
    );

    // Nothing is fetched until the first poll arrives.
    let cache = SnapshotCache::new(Arc::new(aggregator), config.cache_policy());
    let policy = cache.policy();
    info!(
        "Cache policy: fresh {:?}, degraded {:?} after {} errors, refresh timeout {:?}",
        policy.fresh_for, policy.degraded_for, policy.error_threshold, policy.refresh_timeout
    );
    info!(
        "Sources: standings={} results={}",
        config.standings_url, config.results_url
    );

    let app = dashboard::router(AppState { cache });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
