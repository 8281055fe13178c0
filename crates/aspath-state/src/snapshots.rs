//! Routing snapshot repository.
//!
//! Snapshots are append-only. Two indexes keep per-collector lookups to a
//! single range scan:
//!
//! - `SNAPSHOTS_BY_COLLECTOR` orders a collector's snapshots by id, which
//!   answers "latest" (max id, any status).
//! - `SNAPSHOT_TIMELINE` orders them by `created_at` then id, which answers
//!   "most recent by creation time" and the descending snapshot listing.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{count, decode, encode, next_id, to_micros, truncate_micros};
use crate::tables::{ROUTE_COLLECTORS, ROUTING_SNAPSHOTS, SNAPSHOTS_BY_COLLECTOR, SNAPSHOT_TIMELINE};
use crate::types::{CollectorId, RoutingSnapshot, SnapshotId, SnapshotStatus};

pub struct RoutingSnapshots<'a> {
    pub(crate) db: &'a Database,
}

impl RoutingSnapshots<'_> {
    /// Open a new `pending` snapshot for a collector.
    ///
    /// `created_at` is truncated to microseconds; the stored value is the
    /// exact partition key for the snapshot's route rows.
    pub fn begin(
        &self,
        route_collector_id: CollectorId,
        created_at: DateTime<Utc>,
    ) -> StateResult<RoutingSnapshot> {
        let created_at = truncate_micros(created_at)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let collectors = txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
            if collectors
                .get(route_collector_id)
                .map_err(map_err!(Read))?
                .is_none()
            {
                return Err(StateError::NotFound(format!(
                    "route collector {route_collector_id}"
                )));
            }
        }

        let id = next_id(&txn, "routing_snapshots")?;
        let snapshot = RoutingSnapshot {
            id,
            route_collector_id,
            created_at,
            status: SnapshotStatus::Pending,
        };
        let value = encode(&snapshot)?;
        let micros = to_micros(&created_at);
        {
            let mut table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            let mut by_collector = txn
                .open_table(SNAPSHOTS_BY_COLLECTOR)
                .map_err(map_err!(Table))?;
            by_collector
                .insert((route_collector_id, id), micros)
                .map_err(map_err!(Write))?;
            let mut timeline = txn.open_table(SNAPSHOT_TIMELINE).map_err(map_err!(Table))?;
            timeline
                .insert((route_collector_id, micros, id), ())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, route_collector_id, %created_at, "routing snapshot opened");
        Ok(snapshot)
    }

    /// Move a snapshot to a new status. Returns the updated record.
    pub fn set_status(&self, id: SnapshotId, status: SnapshotStatus) -> StateResult<RoutingSnapshot> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let snapshot = {
            let mut table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
            let mut snapshot: RoutingSnapshot = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(format!("routing snapshot {id}"))),
            };
            snapshot.status = status;
            let value = encode(&snapshot)?;
            table
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            snapshot
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(id, ?status, "routing snapshot status updated");
        Ok(snapshot)
    }

    pub fn get(&self, id: SnapshotId) -> StateResult<Option<RoutingSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// The collector's snapshot with the highest id, whatever its status.
    pub fn latest_for_collector(
        &self,
        route_collector_id: CollectorId,
    ) -> StateResult<Option<RoutingSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let by_collector = txn
            .open_table(SNAPSHOTS_BY_COLLECTOR)
            .map_err(map_err!(Table))?;
        let last = by_collector
            .range((route_collector_id, 0)..=(route_collector_id, u64::MAX))
            .map_err(map_err!(Read))?
            .next_back();
        let id = match last {
            Some(entry) => {
                let (key, _) = entry.map_err(map_err!(Read))?;
                key.value().1
            }
            None => return Ok(None),
        };
        let table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Err(StateError::NotFound(format!("routing snapshot {id}"))),
        }
    }

    /// The most recently created snapshot across a set of collectors, any
    /// status. Equal `created_at` values are broken by the higher id.
    pub fn most_recent_among(
        &self,
        route_collector_ids: &[CollectorId],
    ) -> StateResult<Option<RoutingSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let timeline = txn.open_table(SNAPSHOT_TIMELINE).map_err(map_err!(Table))?;
        let mut best: Option<(i64, SnapshotId)> = None;
        for &collector_id in route_collector_ids {
            let last = timeline
                .range((collector_id, i64::MIN, 0)..=(collector_id, i64::MAX, u64::MAX))
                .map_err(map_err!(Read))?
                .next_back();
            if let Some(entry) = last {
                let (key, _) = entry.map_err(map_err!(Read))?;
                let (_, micros, id) = key.value();
                if best.is_none_or(|current| (micros, id) > current) {
                    best = Some((micros, id));
                }
            }
        }
        let Some((_, id)) = best else {
            return Ok(None);
        };
        let table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Err(StateError::NotFound(format!("routing snapshot {id}"))),
        }
    }

    /// A collector's snapshots with the given status, most recent
    /// `created_at` first.
    pub fn list_for_collector(
        &self,
        route_collector_id: CollectorId,
        status: SnapshotStatus,
    ) -> StateResult<Vec<RoutingSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let timeline = txn.open_table(SNAPSHOT_TIMELINE).map_err(map_err!(Table))?;
        let table = txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        let range = timeline
            .range((route_collector_id, i64::MIN, 0)..=(route_collector_id, i64::MAX, u64::MAX))
            .map_err(map_err!(Read))?;
        for entry in range.rev() {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let (_, _, id) = key.value();
            let Some(guard) = table.get(id).map_err(map_err!(Read))? else {
                return Err(StateError::NotFound(format!("routing snapshot {id}")));
            };
            let snapshot: RoutingSnapshot = decode(guard.value())?;
            if snapshot.status == status {
                results.push(snapshot);
            }
        }
        Ok(results)
    }

    pub fn count(&self) -> StateResult<u64> {
        count(self.db, ROUTING_SNAPSHOTS)
    }
}
