//! Ingestion boundary — the opaque grab-and-ingest unit of work.
//!
//! The scheduler only knows how to invoke a task by name with a collector
//! argument. What the task does (download the table dump, parse it, write a
//! snapshot and its rows) happens elsewhere.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::process::Command;
use tracing::{debug, info};

use aspath_core::WorkerConfig;

use crate::reconciler::GRAB_TASK;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work the beat loop can invoke for a collector.
pub trait IngestionTask: Send + Sync {
    /// Task reference matched against `ScheduleEntry::task`.
    fn name(&self) -> &str;

    /// Grab and ingest the current table of `collector`.
    fn run(&self, collector: String) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Runs the configured external worker with the collector name appended as
/// the last argument. A non-zero exit is a failed run.
pub struct CommandIngestion {
    program: String,
    args: Vec<String>,
}

impl CommandIngestion {
    pub fn new(worker: &WorkerConfig) -> Self {
        Self {
            program: worker.command.clone(),
            args: worker.args.clone(),
        }
    }
}

impl IngestionTask for CommandIngestion {
    fn name(&self) -> &str {
        GRAB_TASK
    }

    fn run(&self, collector: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            debug!(program = %self.program, %collector, "spawning ingestion worker");
            let status = Command::new(&self.program)
                .args(&self.args)
                .arg(&collector)
                .kill_on_drop(true)
                .status()
                .await
                .map_err(|e| anyhow::anyhow!("spawn {}: {e}", self.program))?;
            if !status.success() {
                anyhow::bail!("ingestion worker for {collector} exited with {status}");
            }
            info!(%collector, "ingestion worker finished");
            Ok(())
        })
    }
}

/// Per-collector run guards. At most one ingestion run per collector is in
/// flight; runs for different collectors proceed independently.
#[derive(Clone, Default)]
pub struct CollectorGuards {
    running: Arc<Mutex<HashSet<String>>>,
}

impl CollectorGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `collector`, or `None` if a run for it is already in flight.
    pub fn try_acquire(&self, collector: &str) -> Option<RunGuard> {
        let mut running = self.running.lock();
        if !running.insert(collector.to_string()) {
            return None;
        }
        Some(RunGuard {
            running: Arc::clone(&self.running),
            collector: collector.to_string(),
        })
    }

    pub fn is_running(&self, collector: &str) -> bool {
        self.running.lock().contains(collector)
    }
}

/// Releases its collector on drop.
pub struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    collector: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.lock().remove(&self.collector);
    }
}
