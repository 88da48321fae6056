use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::SnapshotCache;

/// The cache is the only cache authority; nothing downstream may store
/// responses.
const NO_STORE_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

#[derive(Clone)]
pub struct AppState {
    pub cache: SnapshotCache,
}

/// Build the Axum router for the dashboard API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/scrape", get(snapshot_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /api/scrape
async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.cache.get_snapshot().await;
    (NO_STORE_HEADERS, Json(snapshot))
}

/// GET /api/status
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    (NO_STORE_HEADERS, Json(state.cache.status()))
}

async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::data::baseline;
    use crate::scrape::source::{AssembledSnapshot, Provenance, SnapshotSource};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        async fn build_snapshot(&self) -> anyhow::Result<AssembledSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("upstream down");
            }
            let mut snapshot = baseline::default_snapshot();
            snapshot.points_table.truncate(2);
            Ok(AssembledSnapshot {
                snapshot,
                standings: Provenance::Live,
                results: Provenance::Baseline,
            })
        }
    }

    fn app(fail: bool) -> (Router, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail,
        });
        let cache = SnapshotCache::new(source.clone(), CachePolicy::default());
        (router(AppState { cache }), source)
    }

    async fn get_json(app: &Router, uri: &str) -> (axum::http::response::Parts, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (parts, body) = resp.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        (parts, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_snapshot_endpoint_disables_caching() {
        let (app, _) = app(false);
        let (parts, _) = get_json(&app, "/api/scrape").await;

        assert_eq!(parts.status, StatusCode::OK);
        assert_eq!(
            parts.headers[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(parts.headers[header::PRAGMA], "no-cache");
        assert_eq!(parts.headers[header::EXPIRES], "0");
    }

    #[tokio::test]
    async fn test_snapshot_body_shape() {
        let (app, source) = app(false);
        let (_, body) = get_json(&app, "/api/scrape").await;

        assert_eq!(body["pointsTable"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["matches"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["schedule"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["results"][0]["matchOrder"], "Final");

        let (_, again) = get_json(&app, "/api/scrape").await;
        assert_eq!(body, again);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health_does_not_touch_cache() {
        let (app, source) = app(false);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_source_still_serves_snapshot() {
        let (app, _) = app(true);
        let (parts, body) = get_json(&app, "/api/scrape").await;

        assert_eq!(parts.status, StatusCode::OK);
        assert_eq!(body["pointsTable"].as_array().map(Vec::len), Some(8));

        let (_, status) = get_json(&app, "/api/status").await;
        assert_eq!(status["origin"], "default");
        assert_eq!(status["consecutiveErrorCount"], 1);
        assert_eq!(status["state"], "fresh");
    }
}
