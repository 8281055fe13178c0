//! Query facade — read-only views over the snapshot store.
//!
//! Every operation resolves the named collector first and fails with a
//! not-found error before touching snapshots or routes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use aspath_state::{
    AnnotatedRoute, ExchangePoint, RouteCollector, RoutingSnapshot, SnapshotId, SnapshotStatus,
    StateError, StateStore,
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Route Collector not found: {0}")]
    CollectorNotFound(String),

    #[error("Routing snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Routing snapshot {snapshot_id} does not belong to route collector {collector}")]
    SnapshotMismatch {
        snapshot_id: SnapshotId,
        collector: String,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        !matches!(self, QueryError::State(_))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// An exchange point with a summary of its snapshot lineage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExchangePointSummary {
    #[serde(flatten)]
    pub exchange_point: ExchangePoint,
    pub route_collectors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_snapshot_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_snapshot_id: Option<SnapshotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_snapshot_collector_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotRef {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub snapshot_id: SnapshotId,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotRoutes {
    pub metadata: SnapshotMetadata,
    pub routes: Vec<AnnotatedRoute>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub route_collector_count: u64,
    pub ixp_count: u64,
    pub snapshots_count: u64,
    #[serde(rename = "autonomous_systems")]
    pub autonomous_systems_count: u64,
}

#[derive(Clone)]
pub struct QueryFacade {
    store: StateStore,
}

impl QueryFacade {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn list_collectors(&self) -> QueryResult<Vec<RouteCollector>> {
        Ok(self.store.route_collectors().list()?)
    }

    pub fn list_exchange_points(&self) -> QueryResult<Vec<ExchangePointSummary>> {
        let collectors = self.store.route_collectors().list()?;
        let mut summaries = Vec::new();
        for exchange_point in self.store.exchange_points().list()? {
            let own: Vec<&RouteCollector> = collectors
                .iter()
                .filter(|c| c.exchange_point_id == exchange_point.id)
                .collect();
            let ids: Vec<_> = own.iter().map(|c| c.id).collect();
            let last = self.store.snapshots().most_recent_among(&ids)?;

            let mut summary = ExchangePointSummary {
                exchange_point,
                route_collectors: own.len(),
                last_snapshot_date: None,
                last_snapshot_id: None,
                last_snapshot_collector_name: None,
            };
            if let Some(snapshot) = last {
                summary.last_snapshot_date = Some(snapshot.created_at.date_naive());
                summary.last_snapshot_id = Some(snapshot.id);
                summary.last_snapshot_collector_name = own
                    .iter()
                    .find(|c| c.id == snapshot.route_collector_id)
                    .map(|c| c.name.clone());
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Parsed snapshots of a collector, most recent first.
    pub fn list_snapshots(&self, collector_name: &str) -> QueryResult<Vec<SnapshotRef>> {
        let collector = self.collector(collector_name)?;
        let snapshots = self
            .store
            .snapshots()
            .list_for_collector(collector.id, SnapshotStatus::Parsed)?;
        Ok(snapshots
            .into_iter()
            .map(|s| SnapshotRef {
                id: s.id,
                created_at: s.created_at,
            })
            .collect())
    }

    /// Routes of the collector's highest-id snapshot. No status filter: the
    /// snapshot may still be ingesting.
    pub fn latest_routes(&self, collector_name: &str) -> QueryResult<SnapshotRoutes> {
        let collector = self.collector(collector_name)?;
        let snapshot = self
            .store
            .snapshots()
            .latest_for_collector(collector.id)?
            .ok_or_else(|| QueryError::SnapshotNotFound(format!("latest for {collector_name}")))?;
        self.routes_of(snapshot)
    }

    /// Routes of a specific snapshot, which must belong to the collector.
    pub fn snapshot_routes(
        &self,
        collector_name: &str,
        snapshot_id: SnapshotId,
    ) -> QueryResult<SnapshotRoutes> {
        let collector = self.collector(collector_name)?;
        let snapshot = self
            .store
            .snapshots()
            .get(snapshot_id)?
            .ok_or_else(|| QueryError::SnapshotNotFound(snapshot_id.to_string()))?;
        if snapshot.route_collector_id != collector.id {
            return Err(QueryError::SnapshotMismatch {
                snapshot_id,
                collector: collector.name,
            });
        }
        self.routes_of(snapshot)
    }

    /// Four independent counts; not a consistent cut across tables.
    pub fn statistics(&self) -> QueryResult<Statistics> {
        Ok(Statistics {
            route_collector_count: self.store.route_collectors().count()?,
            ixp_count: self.store.exchange_points().count()?,
            snapshots_count: self.store.snapshots().count()?,
            autonomous_systems_count: self.store.autonomous_systems().count()?,
        })
    }

    fn collector(&self, name: &str) -> QueryResult<RouteCollector> {
        self.store
            .route_collectors()
            .by_name(name)?
            .ok_or_else(|| QueryError::CollectorNotFound(name.to_string()))
    }

    fn routes_of(&self, snapshot: RoutingSnapshot) -> QueryResult<SnapshotRoutes> {
        let routes = self.store.routes().for_snapshot(&snapshot)?;
        debug!(snapshot_id = snapshot.id, routes = routes.len(), "snapshot routes fetched");
        Ok(SnapshotRoutes {
            metadata: SnapshotMetadata {
                created_at: snapshot.created_at,
                snapshot_id: snapshot.id,
            },
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspath_state::{AutonomousSystem, NewRoute};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap()
    }

    /// AMS-IX with two collectors, DE-CIX with one and no snapshots.
    fn seeded() -> (StateStore, QueryFacade) {
        let store = StateStore::open_in_memory().unwrap();
        let ams = store.exchange_points().create("AMS-IX").unwrap();
        let decix = store.exchange_points().create("DE-CIX").unwrap();
        let rc1 = store.route_collectors().create("rc1.ams", ams.id).unwrap();
        let rc2 = store.route_collectors().create("rc2.ams", ams.id).unwrap();
        store.route_collectors().create("rc1.fra", decix.id).unwrap();
        store
            .autonomous_systems()
            .put(&AutonomousSystem {
                number: 13335,
                name: "CLOUDFLARENET".to_string(),
            })
            .unwrap();

        let s1 = store.snapshots().begin(rc1.id, t0()).unwrap();
        store
            .routes()
            .append(&s1, &[NewRoute::new("1.1.1.0/24", vec![64500, 13335])])
            .unwrap();
        store.snapshots().set_status(s1.id, SnapshotStatus::Parsed).unwrap();

        let s2 = store.snapshots().begin(rc2.id, t0() + Duration::days(1)).unwrap();
        store.snapshots().set_status(s2.id, SnapshotStatus::Parsed).unwrap();

        // In-progress snapshot on rc1, newest by id.
        let s3 = store.snapshots().begin(rc1.id, t0() + Duration::hours(2)).unwrap();
        store
            .routes()
            .append(&s3, &[NewRoute::new("192.0.2.0/24", vec![64496])])
            .unwrap();

        let facade = QueryFacade::new(store.clone());
        (store, facade)
    }

    #[test]
    fn list_collectors_returns_all() {
        let (_, facade) = seeded();
        assert_eq!(facade.list_collectors().unwrap().len(), 3);
    }

    #[test]
    fn exchange_point_summary_tracks_most_recent_snapshot() {
        let (_, facade) = seeded();
        let summaries = facade.list_exchange_points().unwrap();
        assert_eq!(summaries.len(), 2);

        let ams = &summaries[0];
        assert_eq!(ams.exchange_point.name, "AMS-IX");
        assert_eq!(ams.route_collectors, 2);
        assert_eq!(ams.last_snapshot_collector_name.as_deref(), Some("rc2.ams"));
        assert_eq!(ams.last_snapshot_date, NaiveDate::from_ymd_opt(2024, 5, 2));
        assert_eq!(ams.last_snapshot_id, Some(2));

        let decix = &summaries[1];
        assert_eq!(decix.route_collectors, 1);
        assert!(decix.last_snapshot_id.is_none());
        let json = serde_json::to_value(decix).unwrap();
        assert!(json.get("last_snapshot_date").is_none());
        assert_eq!(json["name"], "DE-CIX");
    }

    #[test]
    fn list_snapshots_only_parsed_newest_first() {
        let (_, facade) = seeded();
        let snapshots = facade.list_snapshots("rc1.ams").unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, 1);
        assert!(facade.list_snapshots("rc1.fra").unwrap().is_empty());
    }

    #[test]
    fn latest_routes_ignores_status() {
        let (_, facade) = seeded();
        let latest = facade.latest_routes("rc1.ams").unwrap();
        assert_eq!(latest.metadata.snapshot_id, 3);
        assert_eq!(latest.metadata.created_at, t0() + Duration::hours(2));
        assert_eq!(latest.routes.len(), 1);
        assert_eq!(latest.routes[0].block, "192.0.2.0/24");
        assert_eq!(latest.routes[0].as_name, None);
    }

    #[test]
    fn latest_routes_without_snapshots_is_not_found() {
        let (_, facade) = seeded();
        let err = facade.latest_routes("rc1.fra").unwrap_err();
        assert!(matches!(err, QueryError::SnapshotNotFound(_)));
    }

    #[test]
    fn snapshot_routes_joins_as_names() {
        let (_, facade) = seeded();
        let routes = facade.snapshot_routes("rc1.ams", 1).unwrap();
        assert_eq!(routes.metadata.snapshot_id, 1);
        assert_eq!(routes.routes.len(), 1);
        assert_eq!(routes.routes[0].origin, Some(13335));
        assert_eq!(routes.routes[0].as_name.as_deref(), Some("CLOUDFLARENET"));
    }

    #[test]
    fn snapshot_of_another_collector_is_rejected() {
        let (_, facade) = seeded();
        let err = facade.snapshot_routes("rc1.ams", 2).unwrap_err();
        assert!(matches!(err, QueryError::SnapshotMismatch { snapshot_id: 2, .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_snapshot_is_not_found() {
        let (_, facade) = seeded();
        let err = facade.snapshot_routes("rc1.ams", 99).unwrap_err();
        assert!(matches!(err, QueryError::SnapshotNotFound(_)));
    }

    #[test]
    fn unknown_collector_is_not_found_everywhere() {
        let (_, facade) = seeded();
        assert!(matches!(
            facade.list_snapshots("nope"),
            Err(QueryError::CollectorNotFound(_))
        ));
        assert!(matches!(
            facade.latest_routes("nope"),
            Err(QueryError::CollectorNotFound(_))
        ));
        // Collector is checked before the snapshot id.
        assert!(matches!(
            facade.snapshot_routes("nope", 1),
            Err(QueryError::CollectorNotFound(_))
        ));
    }

    #[test]
    fn statistics_count_each_table() {
        let (store, facade) = seeded();
        let before = facade.statistics().unwrap();
        assert_eq!(
            before,
            Statistics {
                route_collector_count: 3,
                ixp_count: 2,
                snapshots_count: 3,
                autonomous_systems_count: 1,
            }
        );

        store.route_collectors().create("rc3.ams", 1).unwrap();
        let after = facade.statistics().unwrap();
        assert_eq!(after.route_collector_count, before.route_collector_count + 1);
        assert_eq!(after.ixp_count, before.ixp_count);
        assert_eq!(after.snapshots_count, before.snapshots_count);
        assert_eq!(after.autonomous_systems_count, before.autonomous_systems_count);
    }

    #[test]
    fn statistics_wire_keys() {
        let (_, facade) = seeded();
        let json = serde_json::to_value(facade.statistics().unwrap()).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["autonomous_systems", "ixp_count", "route_collector_count", "snapshots_count"]
        );
    }
}
