//! Route row repository.
//!
//! Rows are keyed by `(created_at, snapshot_id, seq)`. Selecting a
//! snapshot's routes is a single range scan pinned to both the snapshot's
//! `created_at` and its id, so rows from another snapshot never leak in even
//! when two snapshots share a creation time.

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{decode, encode, to_micros};
use crate::tables::{AUTONOMOUS_SYSTEMS, IP_ROUTES, ROUTING_SNAPSHOTS};
use crate::types::{AnnotatedRoute, AutonomousSystem, NewRoute, RouteRow, RoutingSnapshot};

pub struct RouteRows<'a> {
    pub(crate) db: &'a Database,
}

impl RouteRows<'_> {
    /// Append route rows to an existing snapshot. Returns the number written.
    pub fn append(&self, snapshot: &RoutingSnapshot, routes: &[NewRoute]) -> StateResult<usize> {
        let micros = to_micros(&snapshot.created_at);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let snapshots = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
            let stored: RoutingSnapshot = match snapshots.get(snapshot.id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => {
                    return Err(StateError::NotFound(format!(
                        "routing snapshot {}",
                        snapshot.id
                    )));
                }
            };
            if stored.created_at != snapshot.created_at {
                return Err(StateError::Invalid(format!(
                    "routing snapshot {} was created at {}, not {}",
                    snapshot.id, stored.created_at, snapshot.created_at
                )));
            }
        }
        {
            let mut table = txn.open_table(IP_ROUTES).map_err(map_err!(Table))?;
            let mut seq = match table
                .range((micros, snapshot.id, 0)..=(micros, snapshot.id, u64::MAX))
                .map_err(map_err!(Read))?
                .next_back()
            {
                Some(entry) => {
                    let (key, _) = entry.map_err(map_err!(Read))?;
                    key.value().2 + 1
                }
                None => 0,
            };
            for route in routes {
                let row = RouteRow {
                    block: route.block.clone(),
                    path: route.path.clone(),
                    snapshot_id: snapshot.id,
                    created_at: snapshot.created_at,
                };
                let value = encode(&row)?;
                table
                    .insert((micros, snapshot.id, seq), value.as_slice())
                    .map_err(map_err!(Write))?;
                seq += 1;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(snapshot_id = snapshot.id, rows = routes.len(), "route rows appended");
        Ok(routes.len())
    }

    /// All routes of one snapshot, left-joined with the origin AS name.
    ///
    /// Rows are selected where `created_at` equals the snapshot's creation
    /// time and `snapshot_id` equals its id. An origin AS with no record
    /// (or an empty path) yields `as_name: None`.
    pub fn for_snapshot(&self, snapshot: &RoutingSnapshot) -> StateResult<Vec<AnnotatedRoute>> {
        let micros = to_micros(&snapshot.created_at);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let routes = txn.open_table(IP_ROUTES).map_err(map_err!(Table))?;
        let systems = txn.open_table(AUTONOMOUS_SYSTEMS).map_err(map_err!(Table))?;

        let mut results = Vec::new();
        for entry in routes
            .range((micros, snapshot.id, 0)..=(micros, snapshot.id, u64::MAX))
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let row: RouteRow = decode(value.value())?;
            let origin = row.origin();
            let as_name = match origin {
                Some(number) => match systems.get(number).map_err(map_err!(Read))? {
                    Some(guard) => Some(decode::<AutonomousSystem>(guard.value())?.name),
                    None => None,
                },
                None => None,
            };
            results.push(AnnotatedRoute {
                block: row.block,
                path: row.path,
                origin,
                as_name,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{AutonomousSystem, NewRoute, SnapshotStatus, StateError, StateStore};

    fn setup() -> (StateStore, u64) {
        let store = StateStore::open_in_memory().unwrap();
        let ixp = store.exchange_points().create("AMS-IX").unwrap();
        let rc = store.route_collectors().create("rc1", ixp.id).unwrap();
        (store, rc.id)
    }

    #[test]
    fn append_and_fetch_with_as_names() {
        let (store, rc) = setup();
        store
            .autonomous_systems()
            .put(&AutonomousSystem {
                number: 13335,
                name: "CLOUDFLARENET".to_string(),
            })
            .unwrap();
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        let snap = store.snapshots().begin(rc, created).unwrap();

        let written = store
            .routes()
            .append(
                &snap,
                &[
                    NewRoute::new("1.1.1.0/24", vec![64500, 13335]),
                    NewRoute::new("192.0.2.0/24", vec![64500, 64496]),
                ],
            )
            .unwrap();
        assert_eq!(written, 2);

        let routes = store.routes().for_snapshot(&snap).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].origin, Some(13335));
        assert_eq!(routes[0].as_name.as_deref(), Some("CLOUDFLARENET"));
        // Unknown origin AS: row kept, name absent.
        assert_eq!(routes[1].origin, Some(64496));
        assert_eq!(routes[1].as_name, None);
    }

    #[test]
    fn empty_path_yields_no_origin() {
        let (store, rc) = setup();
        let snap = store.snapshots().begin(rc, Utc::now()).unwrap();
        store
            .routes()
            .append(&snap, &[NewRoute::new("10.0.0.0/8", vec![])])
            .unwrap();

        let routes = store.routes().for_snapshot(&snap).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].origin, None);
        assert_eq!(routes[0].as_name, None);
    }

    #[test]
    fn snapshots_sharing_created_at_do_not_mix() {
        let (store, rc) = setup();
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        let first = store.snapshots().begin(rc, created).unwrap();
        let second = store.snapshots().begin(rc, created).unwrap();
        assert_eq!(first.created_at, second.created_at);

        store
            .routes()
            .append(&first, &[NewRoute::new("192.0.2.0/24", vec![1, 2])])
            .unwrap();
        store
            .routes()
            .append(
                &second,
                &[
                    NewRoute::new("198.51.100.0/24", vec![3]),
                    NewRoute::new("203.0.113.0/24", vec![4]),
                ],
            )
            .unwrap();

        let first_routes = store.routes().for_snapshot(&first).unwrap();
        assert_eq!(first_routes.len(), 1);
        assert_eq!(first_routes[0].block, "192.0.2.0/24");

        let second_routes = store.routes().for_snapshot(&second).unwrap();
        let blocks: Vec<_> = second_routes.iter().map(|r| r.block.as_str()).collect();
        assert_eq!(blocks, ["198.51.100.0/24", "203.0.113.0/24"]);
    }

    #[test]
    fn append_continues_sequence_across_batches() {
        let (store, rc) = setup();
        let snap = store.snapshots().begin(rc, Utc::now()).unwrap();
        store
            .routes()
            .append(&snap, &[NewRoute::new("192.0.2.0/24", vec![1])])
            .unwrap();
        store
            .routes()
            .append(&snap, &[NewRoute::new("198.51.100.0/24", vec![2])])
            .unwrap();
        store.snapshots().set_status(snap.id, SnapshotStatus::Parsed).unwrap();

        assert_eq!(store.routes().for_snapshot(&snap).unwrap().len(), 2);
    }

    #[test]
    fn append_to_unknown_snapshot_fails() {
        let (store, rc) = setup();
        let mut snap = store.snapshots().begin(rc, Utc::now()).unwrap();
        snap.id = 999;
        let err = store
            .routes()
            .append(&snap, &[NewRoute::new("192.0.2.0/24", vec![1])])
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn append_with_mismatched_created_at_fails() {
        let (store, rc) = setup();
        let mut snap = store.snapshots().begin(rc, Utc::now()).unwrap();
        snap.created_at += chrono::Duration::seconds(1);
        let err = store
            .routes()
            .append(&snap, &[NewRoute::new("192.0.2.0/24", vec![1])])
            .unwrap_err();
        assert!(matches!(err, StateError::Invalid(_)));
    }
}
