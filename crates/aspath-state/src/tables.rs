//! redb table definitions for the ASPATH state store.
//!
//! Entity tables use numeric ids and `&[u8]` values (JSON-serialized domain
//! types). Secondary indexes use tuple keys so related records come back
//! from a single range scan. Timestamps inside keys are UTC microseconds.

use redb::TableDefinition;

/// Exchange points keyed by id.
pub const EXCHANGE_POINTS: TableDefinition<u64, &[u8]> = TableDefinition::new("exchange_points");

/// Route collectors keyed by id.
pub const ROUTE_COLLECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("route_collectors");

/// Unique index: collector name → collector id.
pub const COLLECTOR_NAMES: TableDefinition<&str, u64> = TableDefinition::new("collector_names");

/// Routing snapshots keyed by id.
pub const ROUTING_SNAPSHOTS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("routing_snapshots");

/// `(collector_id, snapshot_id)` → snapshot `created_at`. Ordered by id.
pub const SNAPSHOTS_BY_COLLECTOR: TableDefinition<(u64, u64), i64> =
    TableDefinition::new("snapshots_by_collector");

/// `(collector_id, created_at, snapshot_id)`. Ordered by creation time.
pub const SNAPSHOT_TIMELINE: TableDefinition<(u64, i64, u64), ()> =
    TableDefinition::new("snapshot_timeline");

/// Route rows keyed by `(created_at, snapshot_id, seq)`; `created_at` is the
/// partition prefix.
pub const IP_ROUTES: TableDefinition<(i64, u64, u64), &[u8]> = TableDefinition::new("ip_routes");

/// Autonomous systems keyed by AS number.
pub const AUTONOMOUS_SYSTEMS: TableDefinition<u32, &[u8]> =
    TableDefinition::new("autonomous_systems");

/// Schedule entries keyed by entry name.
pub const SCHEDULES: TableDefinition<&str, &[u8]> = TableDefinition::new("schedules");

/// Last fire time per schedule entry name.
pub const SCHEDULE_RUNS: TableDefinition<&str, i64> = TableDefinition::new("schedule_runs");

/// Id sequences keyed by table name.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
