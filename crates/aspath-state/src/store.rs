//! StateStore — redb-backed persistence for ASPATH.
//!
//! The store hands out one typed repository per entity. Every repository
//! method runs in its own redb transaction, so a read sees a single
//! committed point in time while ingestion appends concurrently. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{
    Database, Key, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, Value,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::autonomous_systems::AutonomousSystems;
use crate::collectors::RouteCollectors;
use crate::error::{StateError, StateResult};
use crate::exchange_points::ExchangePoints;
use crate::routes::RouteRows;
use crate::schedules::Schedules;
use crate::snapshots::RoutingSnapshots;
use crate::tables::*;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(EXCHANGE_POINTS).map_err(map_err!(Table))?;
        txn.open_table(ROUTE_COLLECTORS).map_err(map_err!(Table))?;
        txn.open_table(COLLECTOR_NAMES).map_err(map_err!(Table))?;
        txn.open_table(ROUTING_SNAPSHOTS).map_err(map_err!(Table))?;
        txn.open_table(SNAPSHOTS_BY_COLLECTOR).map_err(map_err!(Table))?;
        txn.open_table(SNAPSHOT_TIMELINE).map_err(map_err!(Table))?;
        txn.open_table(IP_ROUTES).map_err(map_err!(Table))?;
        txn.open_table(AUTONOMOUS_SYSTEMS).map_err(map_err!(Table))?;
        txn.open_table(SCHEDULES).map_err(map_err!(Table))?;
        txn.open_table(SCHEDULE_RUNS).map_err(map_err!(Table))?;
        txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn exchange_points(&self) -> ExchangePoints<'_> {
        ExchangePoints { db: &self.db }
    }

    pub fn route_collectors(&self) -> RouteCollectors<'_> {
        RouteCollectors { db: &self.db }
    }

    pub fn snapshots(&self) -> RoutingSnapshots<'_> {
        RoutingSnapshots { db: &self.db }
    }

    pub fn routes(&self) -> RouteRows<'_> {
        RouteRows { db: &self.db }
    }

    pub fn autonomous_systems(&self) -> AutonomousSystems<'_> {
        AutonomousSystems { db: &self.db }
    }

    pub fn schedules(&self) -> Schedules<'_> {
        Schedules { db: &self.db }
    }
}

// ── Shared helpers ─────────────────────────────────────────────────

pub(crate) fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Allocate the next id from a named sequence. Ids start at 1.
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &str) -> StateResult<u64> {
    let mut table = txn.open_table(SEQUENCES).map_err(map_err!(Table))?;
    let current = table
        .get(sequence)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next).map_err(map_err!(Write))?;
    Ok(next)
}

/// Number of rows in a table.
pub(crate) fn count<K: Key + 'static, V: Value + 'static>(
    db: &Database,
    definition: TableDefinition<K, V>,
) -> StateResult<u64> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(definition).map_err(map_err!(Table))?;
    table.len().map_err(map_err!(Read))
}

pub(crate) fn to_micros(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> StateResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StateError::Invalid(format!("timestamp out of range: {micros}us")))
}

/// Drop sub-microsecond precision so a timestamp survives the trip through
/// a key unchanged.
pub(crate) fn truncate_micros(ts: DateTime<Utc>) -> StateResult<DateTime<Utc>> {
    from_micros(to_micros(&ts))
}
