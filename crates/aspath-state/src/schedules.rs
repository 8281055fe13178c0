//! Schedule entry storage.
//!
//! Entries and their run bookkeeping live in separate tables: clearing the
//! entries at boot leaves the last fire times intact, so a restart does not
//! re-fire a job that already ran in the current period.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{decode, encode, from_micros, to_micros};
use crate::tables::{SCHEDULES, SCHEDULE_RUNS};
use crate::types::ScheduleEntry;

pub struct Schedules<'a> {
    pub(crate) db: &'a Database,
}

impl Schedules<'_> {
    /// All schedule entries, ordered by name.
    pub fn list(&self) -> StateResult<Vec<ScheduleEntry>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCHEDULES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Add an entry. Fails with `DuplicateName` if the name is taken; the
    /// existing entry is left untouched.
    pub fn add(&self, entry: &ScheduleEntry) -> StateResult<()> {
        let value = encode(entry)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCHEDULES).map_err(map_err!(Table))?;
            if table.get(entry.name.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::DuplicateName(entry.name.clone()));
            }
            table
                .insert(entry.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(name = %entry.name, trigger = %entry.trigger, "schedule entry added");
        Ok(())
    }

    /// Remove an entry by name. Returns true if it existed.
    pub fn remove(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SCHEDULES).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%name, existed, "schedule entry removed");
        Ok(existed)
    }

    /// Record the time an entry last fired.
    pub fn record_run(&self, name: &str, at: DateTime<Utc>) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCHEDULE_RUNS).map_err(map_err!(Table))?;
            table
                .insert(name, to_micros(&at))
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn last_run(&self, name: &str) -> StateResult<Option<DateTime<Utc>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCHEDULE_RUNS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(from_micros(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Drop the run bookkeeping of every name not in `keep`. Returns the
    /// number of rows removed.
    pub fn prune_runs(&self, keep: &[String]) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(SCHEDULE_RUNS).map_err(map_err!(Table))?;
            let before = table.len().map_err(map_err!(Read))?;
            table
                .retain(|name, _| keep.iter().any(|k| k == name))
                .map_err(map_err!(Write))?;
            removed = before - table.len().map_err(map_err!(Read))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(removed, "stale schedule runs pruned");
        Ok(removed as usize)
    }
}
