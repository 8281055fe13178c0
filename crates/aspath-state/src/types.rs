//! Domain types for the ASPATH state store.
//!
//! These types represent exchange points, their route collectors, the
//! routing snapshots grabbed from each collector, the route rows inside a
//! snapshot, and the schedule entries that drive periodic grabs. All types
//! are serializable to/from JSON for storage in redb tables.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ExchangePointId = u64;
pub type CollectorId = u64;
pub type SnapshotId = u64;
pub type AsNumber = u32;

// ── Exchange points & collectors ───────────────────────────────────

/// An Internet exchange point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangePoint {
    pub id: ExchangePointId,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// A route collector peering at an exchange point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteCollector {
    pub id: CollectorId,
    /// Unique; used in URLs and schedule entry names.
    pub name: String,
    pub exchange_point_id: ExchangePointId,
    #[serde(default)]
    pub address: Option<String>,
}

// ── Snapshots & routes ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Pending,
    Parsed,
    Failed,
}

/// One timestamped capture of a collector's routing table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingSnapshot {
    pub id: SnapshotId,
    pub route_collector_id: CollectorId,
    /// Microsecond precision; also the partition key of the snapshot's rows.
    pub created_at: DateTime<Utc>,
    pub status: SnapshotStatus,
}

/// A route row as stored. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRow {
    /// CIDR block, e.g. `192.0.2.0/24`.
    pub block: String,
    /// AS path; the last element is the origin AS.
    pub path: Vec<AsNumber>,
    pub snapshot_id: SnapshotId,
    pub created_at: DateTime<Utc>,
}

impl RouteRow {
    pub fn origin(&self) -> Option<AsNumber> {
        self.path.last().copied()
    }
}

/// A route as handed over by an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRoute {
    pub block: String,
    pub path: Vec<AsNumber>,
}

impl NewRoute {
    pub fn new(block: impl Into<String>, path: Vec<AsNumber>) -> Self {
        Self {
            block: block.into(),
            path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutonomousSystem {
    pub number: AsNumber,
    pub name: String,
}

/// A route row left-joined with the name of its origin AS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedRoute {
    pub block: String,
    pub path: Vec<AsNumber>,
    pub origin: Option<AsNumber>,
    pub as_name: Option<String>,
}

// ── Schedules ──────────────────────────────────────────────────────

/// Daily cron trigger: fires at `hour:minute` UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronSchedule {
    pub hour: u8,
    pub minute: u8,
}

impl CronSchedule {
    pub fn daily(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} * * *", self.minute, self.hour)
    }
}

/// A named periodic task in the schedule registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub name: String,
    pub trigger: CronSchedule,
    /// Reference to the task the beat loop invokes.
    pub task: String,
    /// Positional arguments passed to the task.
    pub args: Vec<String>,
}
