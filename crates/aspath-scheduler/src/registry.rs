//! Schedule registry — named cron-triggered tasks.
//!
//! The durable implementation stores entries in the state store so every
//! handle (and every process restart) sees the same set. An in-memory
//! implementation backs tests and dry runs.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use aspath_state::{ScheduleEntry, StateStore};

use crate::error::{RegistryError, RegistryResult};

/// Durable mapping from entry name to trigger and task reference.
pub trait ScheduleRegistry: Send + Sync {
    /// All entries. No ordering guarantee.
    fn list(&self) -> RegistryResult<Vec<ScheduleEntry>>;

    /// Add an entry; fails with `DuplicateName` if the name is taken.
    fn add(&self, entry: ScheduleEntry) -> RegistryResult<()>;

    /// Remove an entry by name. No-op if absent.
    fn remove(&self, name: &str) -> RegistryResult<()>;

    /// Record when an entry last fired.
    fn record_run(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()>;

    fn last_run(&self, name: &str) -> RegistryResult<Option<DateTime<Utc>>>;

    /// Forget the fire times of every name not in `keep`. Returns the number
    /// of names forgotten.
    fn prune_runs(&self, keep: &[String]) -> RegistryResult<usize>;
}

/// Registry persisted in the redb state store.
#[derive(Clone)]
pub struct RedbScheduleRegistry {
    store: StateStore,
}

impl RedbScheduleRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl ScheduleRegistry for RedbScheduleRegistry {
    fn list(&self) -> RegistryResult<Vec<ScheduleEntry>> {
        Ok(self.store.schedules().list()?)
    }

    fn add(&self, entry: ScheduleEntry) -> RegistryResult<()> {
        Ok(self.store.schedules().add(&entry)?)
    }

    fn remove(&self, name: &str) -> RegistryResult<()> {
        self.store.schedules().remove(name)?;
        Ok(())
    }

    fn record_run(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()> {
        Ok(self.store.schedules().record_run(name, at)?)
    }

    fn last_run(&self, name: &str) -> RegistryResult<Option<DateTime<Utc>>> {
        Ok(self.store.schedules().last_run(name)?)
    }

    fn prune_runs(&self, keep: &[String]) -> RegistryResult<usize> {
        Ok(self.store.schedules().prune_runs(keep)?)
    }
}

/// Process-local registry.
#[derive(Default)]
pub struct InMemoryScheduleRegistry {
    entries: Mutex<BTreeMap<String, ScheduleEntry>>,
    runs: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleRegistry for InMemoryScheduleRegistry {
    fn list(&self) -> RegistryResult<Vec<ScheduleEntry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    fn add(&self, entry: ScheduleEntry) -> RegistryResult<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&entry.name) {
            return Err(RegistryError::DuplicateName(entry.name));
        }
        debug!(name = %entry.name, trigger = %entry.trigger, "schedule entry added");
        entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    fn remove(&self, name: &str) -> RegistryResult<()> {
        self.entries.lock().remove(name);
        Ok(())
    }

    fn record_run(&self, name: &str, at: DateTime<Utc>) -> RegistryResult<()> {
        self.runs.lock().insert(name.to_string(), at);
        Ok(())
    }

    fn last_run(&self, name: &str) -> RegistryResult<Option<DateTime<Utc>>> {
        Ok(self.runs.lock().get(name).copied())
    }

    fn prune_runs(&self, keep: &[String]) -> RegistryResult<usize> {
        let mut runs = self.runs.lock();
        let before = runs.len();
        runs.retain(|name, _| keep.contains(name));
        Ok(before - runs.len())
    }
}
