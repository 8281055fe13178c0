//! aspath-state — embedded snapshot store for ASPATH.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for exchange points, route collectors, routing snapshots, route
//! rows, autonomous systems and schedule entries.
//!
//! # Architecture
//!
//! All domain records are JSON-serialized into redb's `&[u8]` value columns.
//! Each entity has a typed repository (`store.snapshots()`,
//! `store.routes()`, ...). Route rows are keyed by
//! `(created_at, snapshot_id, seq)` so a snapshot's routes are one range
//! scan inside the snapshot's `created_at` partition.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

#[macro_use]
pub mod error;
pub mod autonomous_systems;
pub mod collectors;
pub mod exchange_points;
pub mod routes;
pub mod schedules;
pub mod snapshots;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
