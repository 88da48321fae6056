use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extract::{extract_results, extract_standings};
use super::fetcher::PageFetcher;
use crate::data::baseline;
use crate::data::models::{DataSnapshot, MatchRecord, StandingsRow};

/// Where one category of a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Live,
    Baseline,
}

/// A snapshot together with which scraped categories were live.
#[derive(Debug, Clone)]
pub struct AssembledSnapshot {
    pub snapshot: DataSnapshot,
    pub standings: Provenance,
    pub results: Provenance,
}

impl AssembledSnapshot {
    /// True when at least one scraped category came from the source.
    pub fn has_live_data(&self) -> bool {
        self.standings == Provenance::Live || self.results == Provenance::Live
    }
}

/// Trait for anything that can assemble a fresh snapshot on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Build a snapshot. An error means the whole build went wrong; ordinary
    /// per-page failures are absorbed into baseline data.
    async fn build_snapshot(&self) -> Result<AssembledSnapshot>;
}

/// A tracked page: where it lives and what marks it as rendered.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub url: String,
    pub ready_selector: String,
}

pub struct SourceAggregator {
    fetcher: Arc<dyn PageFetcher>,
    standings_page: SourcePage,
    results_page: SourcePage,
    page_timeout: Duration,
    results_scan_limit: usize,
}

impl SourceAggregator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        standings_page: SourcePage,
        results_page: SourcePage,
        page_timeout: Duration,
        results_scan_limit: usize,
    ) -> Self {
        SourceAggregator {
            fetcher,
            standings_page,
            results_page,
            page_timeout,
            results_scan_limit,
        }
    }

    /// Fetch a page and hand its HTML to `extract` on the blocking pool.
    /// Fetch failures yield an empty set; a panicking extraction is an error.
    async fn scrape<T, F>(&self, page: &SourcePage, extract: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Html) -> Vec<T> + Send + 'static,
    {
        let rendered = match self
            .fetcher
            .fetch_rendered(&page.url, &page.ready_selector, self.page_timeout)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Fetch of {} via {} failed: {}", page.url, self.fetcher.name(), e);
                return Ok(Vec::new());
            }
        };
        debug!("Rendered {} ({} bytes)", rendered.url, rendered.html.len());
        let records = tokio::task::spawn_blocking(move || {
            let document = Html::parse_document(&rendered.html);
            extract(&document)
        })
        .await
        .with_context(|| format!("Extraction task for {} failed", page.url))?;
        Ok(records)
    }

    async fn standings(&self) -> Result<(Vec<StandingsRow>, Provenance)> {
        let rows = self.scrape(&self.standings_page, extract_standings).await?;
        Ok(with_baseline(rows, baseline::points_table, "standings"))
    }

    async fn results(&self) -> Result<(Vec<MatchRecord>, Provenance)> {
        let limit = self.results_scan_limit;
        let rows = self
            .scrape(&self.results_page, move |doc| extract_results(doc, limit))
            .await?;
        Ok(with_baseline(rows, baseline::results, "results"))
    }
}

fn with_baseline<T>(
    live: Vec<T>,
    baseline: fn() -> Vec<T>,
    category: &str,
) -> (Vec<T>, Provenance) {
    if live.is_empty() {
        info!("No live {} extracted; using baseline", category);
        (baseline(), Provenance::Baseline)
    } else {
        info!("Extracted {} live {}", live.len(), category);
        (live, Provenance::Live)
    }
}

#[async_trait]
impl SnapshotSource for SourceAggregator {
    async fn build_snapshot(&self) -> Result<AssembledSnapshot> {
        // Sequential on purpose: at most one browser alive at a time.
        let (points_table, standings) = self.standings().await?;
        let (results, results_provenance) = self.results().await?;

        Ok(AssembledSnapshot {
            snapshot: DataSnapshot {
                matches: baseline::matches(),
                points_table,
                schedule: baseline::schedule(),
                results,
            },
            standings,
            results: results_provenance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::fetcher::{FetchError, RenderedPage};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned HTML per URL; unknown URLs fail like a selector timeout.
    struct CannedFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CannedFetcher {
        fn new(pages: &[(&str, String)]) -> Self {
            CannedFetcher {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch_rendered(
            &self,
            url: &str,
            ready_selector: &str,
            _timeout: Duration,
        ) -> Result<RenderedPage, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(url.to_string());
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.pages.get(url) {
                Some(html) => Ok(RenderedPage {
                    url: url.to_string(),
                    html: html.clone(),
                }),
                None => Err(FetchError::NotReady {
                    selector: ready_selector.to_string(),
                    after: Duration::from_secs(15),
                }),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    const STANDINGS_URL: &str = "https://league.test/points-table/";
    const RESULTS_URL: &str = "https://league.test/matches/results";

    fn aggregator(fetcher: Arc<CannedFetcher>) -> SourceAggregator {
        SourceAggregator::new(
            fetcher,
            SourcePage {
                url: STANDINGS_URL.into(),
                ready_selector: ".ih-td-tab, table".into(),
            },
            SourcePage {
                url: RESULTS_URL.into(),
                ready_selector: "#team_archive li, ul#team_archive".into(),
            },
            Duration::from_secs(30),
            20,
        )
    }

    fn results_html(pairs: &[(&str, &str)]) -> String {
        let items: String = pairs
            .iter()
            .map(|(h, a)| {
                format!(
                    r#"<li><div class="vn-shedTeam"><div class="vn-teamCode"><h3>{h}</h3></div><p>150/3</p></div>
                       <div class="vn-shedTeam vn-team-2"><div class="vn-teamCode"><h3>{a}</h3></div><p>149/9</p></div></li>"#
                )
            })
            .collect();
        format!(r#"<ul id="team_archive">{}</ul>"#, items)
    }

    fn standings_html(teams: &[&str]) -> String {
        let rows: String = teams
            .iter()
            .map(|t| {
                format!(
                    "<tr><td>1</td><td></td><td><h2>{t}</h2></td><td>14</td><td>7</td><td>7</td>\
                     <td>0</td><td>0.012</td><td></td><td></td><td>14</td></tr>"
                )
            })
            .collect();
        format!(r#"<table class="ih-td-tab"><tbody>{}</tbody></table>"#, rows)
    }

    #[tokio::test]
    async fn test_partial_fallback_mixes_live_results_with_baseline_standings() {
        let fetcher = Arc::new(CannedFetcher::new(&[
            (STANDINGS_URL, "<html><body>maintenance</body></html>".to_string()),
            (RESULTS_URL, results_html(&[("GT", "LSG"), ("MI", "DC")])),
        ]));
        let assembled = aggregator(fetcher).build_snapshot().await.unwrap();

        assert_eq!(assembled.standings, Provenance::Baseline);
        assert_eq!(assembled.results, Provenance::Live);
        assert!(assembled.has_live_data());
        assert_eq!(assembled.snapshot.points_table, baseline::points_table());
        assert_eq!(assembled.snapshot.results.len(), 2);
        assert_eq!(assembled.snapshot.results[0].teams[0], "GT");
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_per_category() {
        let fetcher = Arc::new(CannedFetcher::new(&[(
            STANDINGS_URL,
            standings_html(&["RCB", "PBKS"]),
        )]));
        let assembled = aggregator(fetcher).build_snapshot().await.unwrap();

        assert_eq!(assembled.standings, Provenance::Live);
        assert_eq!(assembled.results, Provenance::Baseline);
        assert_eq!(assembled.snapshot.points_table.len(), 2);
        assert_eq!(assembled.snapshot.results, baseline::results());
    }

    #[tokio::test]
    async fn test_all_failures_still_assemble_baseline() {
        let fetcher = Arc::new(CannedFetcher::new(&[]));
        let assembled = aggregator(fetcher).build_snapshot().await.unwrap();
        assert!(!assembled.has_live_data());
        assert_eq!(assembled.snapshot, baseline::default_snapshot());
    }

    #[tokio::test]
    async fn test_pages_fetched_sequentially_standings_first() {
        let fetcher = Arc::new(CannedFetcher::new(&[]));
        aggregator(fetcher.clone()).build_snapshot().await.unwrap();

        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![STANDINGS_URL.to_string(), RESULTS_URL.to_string()]);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_matches_and_schedule_always_baseline() {
        let fetcher = Arc::new(CannedFetcher::new(&[
            (STANDINGS_URL, standings_html(&["CSK"])),
            (RESULTS_URL, results_html(&[("KKR", "SRH")])),
        ]));
        let assembled = aggregator(fetcher).build_snapshot().await.unwrap();
        assert_eq!(assembled.snapshot.matches, baseline::matches());
        assert_eq!(assembled.snapshot.schedule, baseline::schedule());
    }
}
