//! aspath-scheduler — periodic grab scheduling for route collectors.
//!
//! - `registry`: durable name → trigger → task mapping
//! - `reconciler`: boot-time wipe-and-rebuild of the registry from config
//! - `beat`: the loop that fires due entries
//! - `ingest`: the boundary to the external grab-and-ingest worker
//!
//! # Architecture
//!
//! ```text
//! aspath.toml ──▶ Reconciler ──▶ ScheduleRegistry ◀── Beat ──▶ IngestionTask
//!                                  (redb table)        │
//!                                                      └── CollectorGuards
//! ```

pub mod beat;
pub mod error;
pub mod ingest;
pub mod reconciler;
pub mod registry;
pub mod trigger;

pub use beat::Beat;
pub use error::{ReconcileError, ReconcileResult, RegistryError, RegistryResult};
pub use ingest::{CollectorGuards, CommandIngestion, IngestionTask};
pub use reconciler::{GRAB_TASK, Reconciler, ReconcilerState, schedule_name};
pub use registry::{InMemoryScheduleRegistry, RedbScheduleRegistry, ScheduleRegistry};
pub use trigger::Trigger;
