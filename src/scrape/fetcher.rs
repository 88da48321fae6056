//! Headless-browser page fetching.
//!
//! Each fetch launches its own Chromium with a throwaway profile, renders
//! the page until a readiness selector appears, and hands back the document
//! HTML. The browser is owned by a [`BrowserSession`] guard so it is shut
//! down on every exit path, including cancellation by an outer timeout.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Client identity presented to the source site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} timed out after {after:?}")]
    NavigationTimeout { url: String, after: Duration },

    #[error("ready selector `{selector}` not found within {after:?}")]
    NotReady { selector: String, after: Duration },

    #[error("browser protocol error: {0}")]
    Cdp(#[from] CdpError),
}

/// A document that reached its readiness selector.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

/// Anything that can turn a URL into a fully rendered document.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url`, wait for `ready_selector`, and return the rendered HTML.
    /// `timeout` bounds navigation; the selector wait has its own, shorter
    /// budget.
    async fn fetch_rendered(
        &self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary; auto-detected when `None`
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: String,
    pub selector_timeout: Duration,
}

/// Chromium-backed fetcher. Holds no browser between calls.
pub struct ChromeFetcher {
    settings: BrowserSettings,
}

impl ChromeFetcher {
    pub fn new(settings: BrowserSettings) -> Self {
        ChromeFetcher { settings }
    }

    async fn render(
        &self,
        page: &Page,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, FetchError> {
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await?;

        info!("Navigating to {}", url);
        tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::NavigationTimeout {
                url: url.to_string(),
                after: timeout,
            })??;

        let selector_timeout = self.settings.selector_timeout;
        tokio::time::timeout(selector_timeout, wait_for_selector(page, ready_selector))
            .await
            .map_err(|_| FetchError::NotReady {
                selector: ready_selector.to_string(),
                after: selector_timeout,
            })?;

        let html = page.content().await?;
        if html.contains("Access Denied") {
            warn!("Page may be blocked: {} (contains 'Access Denied')", url);
        }
        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch_rendered(
        &self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, FetchError> {
        let browser = LaunchedBrowser::launch(&self.settings, timeout).await?;
        BrowserSession::new(browser)
            .run(|page| async move { self.render(&page, url, ready_selector, timeout).await })
            .await
    }

    fn name(&self) -> &str {
        "chromium"
    }
}

async fn wait_for_selector(page: &Page, selector: &str) {
    loop {
        if page.find_element(selector).await.is_ok() {
            debug!("Ready selector found: {}", selector);
            return;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

/// Something a session opens pages in and must always shut down.
#[async_trait]
trait SessionResource: Send + Sync + 'static {
    type Page: Send;

    async fn open_page(&self) -> Result<Self::Page, FetchError>;

    async fn shutdown(self);
}

/// Owns a [`SessionResource`] for the length of one fetch.
///
/// [`BrowserSession::run`] shuts the resource down on success and on error.
/// If the session is dropped while still open (the owning future was
/// cancelled), teardown is spawned onto the runtime instead.
struct BrowserSession<R: SessionResource> {
    resource: Option<R>,
}

impl<R: SessionResource> BrowserSession<R> {
    fn new(resource: R) -> Self {
        BrowserSession {
            resource: Some(resource),
        }
    }

    /// Open a page, hand it to `work`, then tear the resource down.
    async fn run<T, F, Fut>(mut self, work: F) -> Result<T, FetchError>
    where
        F: FnOnce(R::Page) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let opened = match &self.resource {
            Some(resource) => resource.open_page().await,
            None => Err(FetchError::Launch("browser session already closed".into())),
        };
        let result = match opened {
            Ok(page) => work(page).await,
            Err(e) => Err(e),
        };
        if let Some(resource) = self.resource.take() {
            // Spawned so a cancelled caller cannot interrupt teardown.
            if let Err(e) = tokio::spawn(resource.shutdown()).await {
                warn!("Browser teardown task failed: {}", e);
            }
        }
        result
    }
}

impl<R: SessionResource> Drop for BrowserSession<R> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                debug!("Browser session cancelled; closing in background");
                rt.spawn(resource.shutdown());
            }
            // Outside a runtime the browser's own drop kills the process.
            Err(_) => warn!("Browser session dropped outside a runtime"),
        }
    }
}

/// One launched browser process plus its CDP event loop and profile dir.
struct LaunchedBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl LaunchedBrowser {
    async fn launch(settings: &BrowserSettings, request_timeout: Duration) -> Result<Self, FetchError> {
        let profile_dir = std::env::temp_dir().join(format!(
            "cricket-dashboard-{}-{}",
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .request_timeout(request_timeout)
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-accelerated-2d-canvas")
            .arg("--no-first-run")
            .arg("--no-zygote")
            .arg("--disable-gpu");
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(FetchError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Browser launched (profile {})", profile_dir.display());

        Ok(LaunchedBrowser {
            browser,
            handler,
            profile_dir,
        })
    }
}

#[async_trait]
impl SessionResource for LaunchedBrowser {
    type Page = Page;

    async fn open_page(&self) -> Result<Page, FetchError> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser wait failed: {}", e);
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!("Could not remove {}: {}", self.profile_dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Teardown {
        count: AtomicUsize,
        done: Notify,
    }

    impl Teardown {
        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    struct FakeBrowser {
        teardown: Arc<Teardown>,
        fail_open: bool,
    }

    #[async_trait]
    impl SessionResource for FakeBrowser {
        type Page = &'static str;

        async fn open_page(&self) -> Result<&'static str, FetchError> {
            if self.fail_open {
                return Err(FetchError::Launch("no page target".into()));
            }
            Ok("about:blank")
        }

        async fn shutdown(self) {
            self.teardown.count.fetch_add(1, Ordering::SeqCst);
            self.teardown.done.notify_one();
        }
    }

    fn session(fail_open: bool) -> (BrowserSession<FakeBrowser>, Arc<Teardown>) {
        let teardown = Arc::new(Teardown::default());
        let browser = FakeBrowser {
            teardown: teardown.clone(),
            fail_open,
        };
        (BrowserSession::new(browser), teardown)
    }

    #[tokio::test]
    async fn test_session_closed_after_successful_render() {
        let (session, teardown) = session(false);

        let result = session.run(|page| async move { Ok(page.len()) }).await;

        assert_eq!(result.unwrap(), 11);
        assert_eq!(teardown.count(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_when_render_fails() {
        let (session, teardown) = session(false);

        let result: Result<(), FetchError> = session
            .run(|_| async {
                Err(FetchError::NotReady {
                    selector: "#team_archive li".into(),
                    after: Duration::from_secs(15),
                })
            })
            .await;

        assert!(matches!(result, Err(FetchError::NotReady { .. })));
        assert_eq!(teardown.count(), 1);
    }

    #[tokio::test]
    async fn test_session_closed_when_page_cannot_open() {
        let (session, teardown) = session(true);
        let mut rendered = false;

        let result = session
            .run(|_| {
                rendered = true;
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Launch(_))));
        assert!(!rendered);
        assert_eq!(teardown.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_session_closes_in_background() {
        let (session, teardown) = session(false);
        let render = session.run(|_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });

        assert!(tokio::time::timeout(Duration::from_secs(30), render)
            .await
            .is_err());

        tokio::time::timeout(Duration::from_secs(1), teardown.done.notified())
            .await
            .expect("teardown was not spawned");
        assert_eq!(teardown.count(), 1);
    }
}
