//! aspath-api — REST API for ASPATH.
//!
//! Read-only views over collected routing snapshots plus the current
//! schedule registry. Responses are compressed when the client accepts it,
//! and request handling is bounded by a timeout layer.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Greeting |
//! | GET | `/scheduler/` | Schedule entries |
//! | GET | `/exchange-points/` | Exchange points with snapshot summary |
//! | GET | `/route-collectors/` | List route collectors |
//! | GET | `/route-collectors/:name/snapshots/` | Parsed snapshots, newest first |
//! | GET | `/route-collectors/:name/snapshots/latest/routes` | Routes of the newest snapshot |
//! | GET | `/route-collectors/:name/snapshots/:id/routes` | Routes of one snapshot |
//! | GET | `/statistics` | Table counts |

pub mod handlers;
pub mod query;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use aspath_scheduler::ScheduleRegistry;
use aspath_state::StateStore;

pub use query::{
    ExchangePointSummary, QueryError, QueryFacade, QueryResult, SnapshotMetadata, SnapshotRef,
    SnapshotRoutes, Statistics,
};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub query: QueryFacade,
    pub registry: Arc<dyn ScheduleRegistry>,
}

/// Build the complete API router.
pub fn build_router(
    store: StateStore,
    registry: Arc<dyn ScheduleRegistry>,
    request_timeout: Duration,
) -> Router {
    let state = ApiState {
        query: QueryFacade::new(store),
        registry,
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/scheduler/", get(handlers::list_schedules))
        .route("/exchange-points/", get(handlers::list_exchange_points))
        .route("/route-collectors/", get(handlers::list_route_collectors))
        .route("/route-collectors/{name}/snapshots/", get(handlers::list_snapshots))
        .route(
            "/route-collectors/{name}/snapshots/latest/routes",
            get(handlers::latest_routes),
        )
        .route(
            "/route-collectors/{name}/snapshots/{id}/routes",
            get(handlers::snapshot_routes),
        )
        .route("/statistics", get(handlers::statistics))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspath_scheduler::{InMemoryScheduleRegistry, RegistryResult};
    use aspath_state::ScheduleEntry;
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::{DateTime, Utc};
    use tower::ServiceExt;

    /// Registry whose listing blocks for a fixed time.
    struct SlowRegistry {
        inner: InMemoryScheduleRegistry,
        delay: Duration,
    }

    impl ScheduleRegistry for SlowRegistry {
        fn list(&self) -> RegistryResult<Vec<ScheduleEntry>> {
            std::thread::sleep(self.delay);
            self.inner.list()
        }
        fn add(&self, entry: ScheduleEntry) -> RegistryResult<()> {
            self.inner.add(entry)
        }
        fn remove(&self, name: &str) -> RegistryResult<()> {
            self.inner.remove(name)
        }
        fn record_run(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()> {
            self.inner.record_run(name, at)
        }
        fn last_run(&self, name: &str) -> RegistryResult<Option<DateTime<Utc>>> {
            self.inner.last_run(name)
        }
        fn prune_runs(&self, keep: &[String]) -> RegistryResult<usize> {
            self.inner.prune_runs(keep)
        }
    }

    fn router() -> Router {
        let store = StateStore::open_in_memory().unwrap();
        let ixp = store.exchange_points().create("AMS-IX").unwrap();
        store.route_collectors().create("rc1.ams", ixp.id).unwrap();
        build_router(
            store,
            Arc::new(InMemoryScheduleRegistry::new()),
            Duration::from_secs(5),
        )
    }

    async fn status_of(uri: &str) -> StatusCode {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn latest_is_not_parsed_as_snapshot_id() {
        // No snapshots yet: a 404 from the query, not a 400 from the path.
        assert_eq!(
            status_of("/route-collectors/rc1.ams/snapshots/latest/routes").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn non_numeric_snapshot_id_is_rejected() {
        assert_eq!(
            status_of("/route-collectors/rc1.ams/snapshots/abc/routes").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        assert_eq!(status_of("/route-collectors/rc1.ams").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_get_is_routed() {
        let req = Request::builder()
            .method("POST")
            .uri("/statistics")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn slow_request_times_out_with_504() {
        let registry = Arc::new(SlowRegistry {
            inner: InMemoryScheduleRegistry::new(),
            delay: Duration::from_millis(500),
        });
        let router = build_router(
            StateStore::open_in_memory().unwrap(),
            registry,
            Duration::from_millis(20),
        );
        let req = Request::builder().uri("/scheduler/").body(Body::empty()).unwrap();

        let started = std::time::Instant::now();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn responses_are_brotli_compressed_on_request() {
        let req = Request::builder()
            .uri("/statistics")
            .header(header::ACCEPT_ENCODING, "br")
            .body(Body::empty())
            .unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_ENCODING], "br");
    }

    #[tokio::test]
    async fn responses_are_plain_without_accept_encoding() {
        let req = Request::builder().uri("/statistics").body(Body::empty()).unwrap();
        let resp = router().oneshot(req).await.unwrap();
        assert!(resp.headers().get(header::CONTENT_ENCODING).is_none());
    }
}
