//! Snapshot cache with a degradation policy.
//!
//! Every dashboard poll goes through [`SnapshotCache::get_snapshot`], which
//! decides between three states:
//!
//! ```text
//!  Fresh            age < fresh_for                      → serve cache
//!  StaleAcceptable  errors ≥ threshold and
//!                   since last success < degraded_for    → serve cache
//!  RefreshNeeded    otherwise                            → rebuild under timeout
//! ```
//!
//! A failed rebuild never reaches the caller: the cache stores a fallback
//! (the last live snapshot while it is within `degraded_for`, otherwise the
//! static default) and counts the failure. While the source keeps failing,
//! the error streak parks the cache in `StaleAcceptable` so polls stop
//! launching browsers until the degraded window runs out.
//!
//! The whole read-check-update sequence runs under one async mutex, so
//! concurrent polls that find the cache expired trigger a single rebuild.
//! It runs on a spawned task: a poll that gives up mid-rebuild still has its
//! outcome recorded. Diagnostics are published through a `watch` channel and
//! never wait on the mutex.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::data::baseline;
use crate::data::models::DataSnapshot;
use crate::scrape::SnapshotSource;

/// Tunable timing contract of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Cached data younger than this is served as-is
    pub fresh_for: Duration,
    /// How long after the last live success degraded serving is allowed
    pub degraded_for: Duration,
    /// Consecutive failures before degraded serving kicks in
    pub error_threshold: u32,
    /// Hard limit on one rebuild
    pub refresh_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            fresh_for: Duration::from_secs(60),
            degraded_for: Duration::from_secs(300),
            error_threshold: 3,
            refresh_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    StaleAcceptable,
    RefreshNeeded,
}

/// What the currently cached snapshot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Built from a rebuild with live data
    Live,
    /// Re-served live snapshot after a failed rebuild
    LastGood,
    /// Static default data
    Default,
}

/// Bookkeeping for the cached snapshot, also published for diagnostics.
#[derive(Debug, Clone, Copy)]
struct StateMeta {
    origin: SnapshotOrigin,
    captured_at: Instant,
    captured_wall: DateTime<Utc>,
    /// Last live success, or the first failure if there never was one
    last_successful_at: Instant,
    consecutive_errors: u32,
    last_live_wall: Option<DateTime<Utc>>,
}

impl StateMeta {
    fn freshness(&self, policy: &CachePolicy, now: Instant) -> Freshness {
        if now.duration_since(self.captured_at) < policy.fresh_for {
            Freshness::Fresh
        } else if self.consecutive_errors >= policy.error_threshold
            && now.duration_since(self.last_successful_at) < policy.degraded_for
        {
            Freshness::StaleAcceptable
        } else {
            Freshness::RefreshNeeded
        }
    }
}

struct CacheState {
    snapshot: Arc<DataSnapshot>,
    last_live: Option<Arc<DataSnapshot>>,
    meta: StateMeta,
}

impl CacheState {
    fn live(snapshot: DataSnapshot, now: Instant, wall: DateTime<Utc>) -> Self {
        let snapshot = Arc::new(snapshot);
        CacheState {
            snapshot: snapshot.clone(),
            last_live: Some(snapshot),
            meta: StateMeta {
                origin: SnapshotOrigin::Live,
                captured_at: now,
                captured_wall: wall,
                last_successful_at: now,
                consecutive_errors: 0,
                last_live_wall: Some(wall),
            },
        }
    }

    fn failed(
        prev: Option<CacheState>,
        policy: &CachePolicy,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Self {
        let (last_successful_at, consecutive_errors, last_live, last_live_wall) = match prev {
            Some(p) => (
                p.meta.last_successful_at,
                p.meta.consecutive_errors.saturating_add(1),
                p.last_live,
                p.meta.last_live_wall,
            ),
            None => (now, 1, None, None),
        };

        let within_window = now.duration_since(last_successful_at) < policy.degraded_for;
        let (snapshot, origin) = match &last_live {
            Some(good) if within_window => (good.clone(), SnapshotOrigin::LastGood),
            _ => (Arc::new(baseline::default_snapshot()), SnapshotOrigin::Default),
        };

        CacheState {
            snapshot,
            last_live,
            meta: StateMeta {
                origin,
                captured_at: now,
                captured_wall: wall,
                last_successful_at,
                consecutive_errors,
                last_live_wall,
            },
        }
    }
}

/// Cache diagnostics, reported without triggering a rebuild.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub state: Freshness,
    pub origin: Option<SnapshotOrigin>,
    pub captured_at: Option<DateTime<Utc>>,
    pub last_live_at: Option<DateTime<Utc>>,
    pub consecutive_error_count: u32,
}

/// Process-wide snapshot cache. Cloning shares the same state.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: Arc<dyn SnapshotSource>,
    policy: CachePolicy,
    /// `None` until the first request
    state: Mutex<Option<CacheState>>,
    /// Latest bookkeeping, readable while a rebuild holds `state`
    diagnostics: watch::Sender<Option<StateMeta>>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn SnapshotSource>, policy: CachePolicy) -> Self {
        let (diagnostics, _) = watch::channel(None);
        SnapshotCache {
            inner: Arc::new(CacheInner {
                source,
                policy,
                state: Mutex::new(None),
                diagnostics,
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Current snapshot, rebuilding it first if the policy says so.
    /// Never fails: rebuild errors and timeouts turn into fallback data.
    ///
    /// The check-and-rebuild runs on its own task, so a caller that stops
    /// waiting does not cancel a rebuild or lose its outcome.
    pub async fn get_snapshot(&self) -> Arc<DataSnapshot> {
        let inner = self.inner.clone();
        match tokio::spawn(async move { inner.serve().await }).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Snapshot refresh task failed: {}", e);
                Arc::new(baseline::default_snapshot())
            }
        }
    }

    pub fn status(&self) -> CacheStatus {
        let meta = *self.inner.diagnostics.borrow();
        match meta {
            Some(meta) => CacheStatus {
                state: meta.freshness(&self.inner.policy, Instant::now()),
                origin: Some(meta.origin),
                captured_at: Some(meta.captured_wall),
                last_live_at: meta.last_live_wall,
                consecutive_error_count: meta.consecutive_errors,
            },
            None => CacheStatus {
                state: Freshness::RefreshNeeded,
                origin: None,
                captured_at: None,
                last_live_at: None,
                consecutive_error_count: 0,
            },
        }
    }
}

impl CacheInner {
    async fn serve(&self) -> Arc<DataSnapshot> {
        let mut guard = self.state.lock().await;

        if let Some(state) = guard.as_ref() {
            match state.meta.freshness(&self.policy, Instant::now()) {
                Freshness::Fresh => return state.snapshot.clone(),
                Freshness::StaleAcceptable => {
                    debug!(
                        "Serving degraded snapshot ({} consecutive errors)",
                        state.meta.consecutive_errors
                    );
                    return state.snapshot.clone();
                }
                Freshness::RefreshNeeded => {}
            }
        }

        let outcome =
            tokio::time::timeout(self.policy.refresh_timeout, self.source.build_snapshot()).await;
        let now = Instant::now();
        let wall = Utc::now();

        let next = match outcome {
            Ok(Ok(assembled)) if assembled.has_live_data() => {
                info!(
                    "Snapshot refreshed ({} standings rows, {} results)",
                    assembled.snapshot.points_table.len(),
                    assembled.snapshot.results.len()
                );
                CacheState::live(assembled.snapshot, now, wall)
            }
            Ok(Ok(_)) => {
                warn!("Snapshot rebuild produced no live data");
                CacheState::failed(guard.take(), &self.policy, now, wall)
            }
            Ok(Err(e)) => {
                warn!("Snapshot rebuild failed: {:#}", e);
                CacheState::failed(guard.take(), &self.policy, now, wall)
            }
            Err(_) => {
                warn!(
                    "Snapshot rebuild timed out after {:?}",
                    self.policy.refresh_timeout
                );
                CacheState::failed(guard.take(), &self.policy, now, wall)
            }
        };

        if next.meta.origin != SnapshotOrigin::Live {
            warn!(
                "Serving {:?} snapshot ({} consecutive errors)",
                next.meta.origin, next.meta.consecutive_errors
            );
        }
        self.diagnostics.send_replace(Some(next.meta));
        let snapshot = next.snapshot.clone();
        *guard = Some(next);
        snapshot
    }
}
