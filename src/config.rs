use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CachePolicy;
use crate::scrape::{BrowserSettings, SourcePage};

/// League dashboard data service
#[derive(Parser, Debug, Clone)]
#[command(name = "cricket-dashboard", version, about)]
pub struct Config {
    /// API listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Points-table page to scrape
    #[arg(
        long,
        env = "STANDINGS_URL",
        default_value = "https://www.iplt20.com/points-table/"
    )]
    pub standings_url: String,

    /// CSS selector whose presence means the points table has rendered
    #[arg(long, env = "STANDINGS_READY_SELECTOR", default_value = ".ih-td-tab, table")]
    pub standings_ready_selector: String,

    /// Match-results page to scrape
    #[arg(
        long,
        env = "RESULTS_URL",
        default_value = "https://www.iplt20.com/matches/results"
    )]
    pub results_url: String,

    /// CSS selector whose presence means the results list has rendered
    #[arg(
        long,
        env = "RESULTS_READY_SELECTOR",
        default_value = "#team_archive li, ul#team_archive"
    )]
    pub results_ready_selector: String,

    /// Maximum result entries scanned per page
    #[arg(long, env = "RESULTS_SCAN_LIMIT", default_value_t = crate::scrape::extract::DEFAULT_RESULTS_SCAN_LIMIT)]
    pub results_scan_limit: usize,

    /// Chrome/Chromium executable (auto-detected when unset)
    #[arg(long, env = "CHROME_EXECUTABLE")]
    pub chrome_executable: Option<PathBuf>,

    /// User agent presented to the source site
    #[arg(long, env = "SCRAPER_USER_AGENT", default_value_t = crate::scrape::fetcher::DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,

    /// Page navigation timeout in seconds
    #[arg(long, env = "NAVIGATION_TIMEOUT_SECS", default_value = "30")]
    pub navigation_timeout_secs: u64,

    /// Ready-selector wait in seconds
    #[arg(long, env = "SELECTOR_TIMEOUT_SECS", default_value = "15")]
    pub selector_timeout_secs: u64,

    /// Seconds a snapshot is served without refreshing
    #[arg(long, env = "CACHE_FRESH_SECS", default_value = "60")]
    pub cache_fresh_secs: u64,

    /// Seconds after the last live success that degraded serving is allowed
    #[arg(long, env = "CACHE_DEGRADED_SECS", default_value = "300")]
    pub cache_degraded_secs: u64,

    /// Consecutive refresh failures before degraded serving starts
    #[arg(long, env = "CACHE_ERROR_THRESHOLD", default_value = "3")]
    pub cache_error_threshold: u32,

    /// Hard limit on one snapshot rebuild in seconds
    #[arg(long, env = "REFRESH_TIMEOUT_SECS", default_value = "30")]
    pub refresh_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("standings_url", &self.standings_url),
            ("results_url", &self.results_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", name, value, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} must be an http(s) URL, got {}", name, value);
            }
        }
        if self.standings_ready_selector.trim().is_empty()
            || self.results_ready_selector.trim().is_empty()
        {
            anyhow::bail!("ready selectors must not be empty");
        }
        if self.results_scan_limit == 0 {
            anyhow::bail!("results_scan_limit must be at least 1");
        }
        if self.navigation_timeout_secs == 0 || self.selector_timeout_secs == 0 {
            anyhow::bail!("page timeouts must be positive");
        }
        if self.cache_fresh_secs == 0 {
            anyhow::bail!("cache_fresh_secs must be positive");
        }
        if self.cache_degraded_secs < self.cache_fresh_secs {
            anyhow::bail!("cache_degraded_secs must be at least cache_fresh_secs");
        }
        if self.cache_error_threshold == 0 {
            anyhow::bail!("cache_error_threshold must be at least 1");
        }
        if self.refresh_timeout_secs == 0 {
            anyhow::bail!("refresh_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            fresh_for: Duration::from_secs(self.cache_fresh_secs),
            degraded_for: Duration::from_secs(self.cache_degraded_secs),
            error_threshold: self.cache_error_threshold,
            refresh_timeout: Duration::from_secs(self.refresh_timeout_secs),
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            chrome_executable: self.chrome_executable.clone(),
            user_agent: self.user_agent.clone(),
            selector_timeout: Duration::from_secs(self.selector_timeout_secs),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn standings_page(&self) -> SourcePage {
        SourcePage {
            url: self.standings_url.clone(),
            ready_selector: self.standings_ready_selector.clone(),
        }
    }

    pub fn results_page(&self) -> SourcePage {
        SourcePage {
            url: self.results_url.clone(),
            ready_selector: self.results_ready_selector.clone(),
        }
    }
}
