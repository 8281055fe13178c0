//! Reconciler — rebuilds the schedule registry from configuration.
//!
//! Runs once per process start: every registered entry is removed, then one
//! `grab-<collector>` entry is added per configured collector, and fire
//! times of collectors no longer configured are forgotten. A failure
//! midway leaves the registry partially rebuilt; the next run repairs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info};

use aspath_core::GrabberConfig;
use aspath_state::{CronSchedule, ScheduleEntry};

use crate::error::{ReconcileError, ReconcileResult};
use crate::registry::ScheduleRegistry;

/// Task reference carried by every grab entry.
pub const GRAB_TASK: &str = "aspath.grab_and_ingest";

/// Schedule entry name for a collector.
pub fn schedule_name(collector: &str) -> String {
    format!("grab-{collector}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerState {
    /// The registry may still hold entries from a previous run.
    Uninitialized,
    /// The registry matches the last configuration applied.
    Reconciled,
}

pub struct Reconciler {
    registry: Arc<dyn ScheduleRegistry>,
    state: ReconcilerState,
}

impl Reconciler {
    pub fn new(registry: Arc<dyn ScheduleRegistry>) -> Self {
        Self {
            registry,
            state: ReconcilerState::Uninitialized,
        }
    }

    pub fn state(&self) -> ReconcilerState {
        self.state
    }

    /// Wipe the registry and register one grab entry per collector.
    ///
    /// Returns the registry contents after the rebuild.
    pub fn reconcile(
        &mut self,
        grabbers: &BTreeMap<String, GrabberConfig>,
    ) -> ReconcileResult<Vec<ScheduleEntry>> {
        info!("wiping scheduled tasks");
        let stale = self.registry.list().map_err(ReconcileError::List)?;
        for entry in &stale {
            self.registry
                .remove(&entry.name)
                .map_err(|source| ReconcileError::Clear {
                    name: entry.name.clone(),
                    source,
                })?;
        }
        info!(removed = stale.len(), "schedule registry cleared");

        for (collector, grabber) in grabbers {
            let entry = ScheduleEntry {
                name: schedule_name(collector),
                trigger: CronSchedule::daily(grabber.hour, grabber.minute),
                task: GRAB_TASK.to_string(),
                args: vec![collector.clone()],
            };
            let name = entry.name.clone();
            if let Err(source) = self.registry.add(entry) {
                error!(%name, %collector, error = %source, "failed to register grab schedule");
                return Err(ReconcileError::Register {
                    name,
                    collector: collector.clone(),
                    source,
                });
            }
        }

        let entries = self.registry.list().map_err(ReconcileError::List)?;
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let pruned = self
            .registry
            .prune_runs(&names)
            .map_err(ReconcileError::PruneRuns)?;
        info!(entries = entries.len(), pruned, "new scheduler config");
        for entry in &entries {
            info!(
                name = %entry.name,
                trigger = %entry.trigger,
                task = %entry.task,
                args = ?entry.args,
                "scheduled"
            );
        }
        self.state = ReconcilerState::Reconciled;
        Ok(entries)
    }
}
