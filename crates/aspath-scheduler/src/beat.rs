//! Beat loop — fires due schedule entries.
//!
//! On every tick the loop reads the registry, compares each entry's trigger
//! against its last recorded fire time (or the loop's start time if it never
//! fired) and spawns the ingestion task for every entry that is due. The
//! fire time is recorded before the run starts, so a crash mid-run does not
//! cause a re-fire in the same period.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use aspath_state::ScheduleEntry;

use crate::error::RegistryResult;
use crate::ingest::{CollectorGuards, IngestionTask};
use crate::registry::ScheduleRegistry;
use crate::trigger::Trigger;

pub struct Beat {
    registry: Arc<dyn ScheduleRegistry>,
    task: Arc<dyn IngestionTask>,
    guards: CollectorGuards,
    interval: Duration,
    started_at: DateTime<Utc>,
}

impl Beat {
    pub fn new(
        registry: Arc<dyn ScheduleRegistry>,
        task: Arc<dyn IngestionTask>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            task,
            guards: CollectorGuards::new(),
            interval,
            started_at: Utc::now(),
        }
    }

    /// Override the reference point used for entries that never fired.
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn guards(&self) -> &CollectorGuards {
        &self.guards
    }

    /// Entries whose trigger has passed since they last fired.
    pub fn due(&self, now: DateTime<Utc>) -> RegistryResult<Vec<ScheduleEntry>> {
        let mut due = Vec::new();
        for entry in self.registry.list()? {
            let since = self
                .registry
                .last_run(&entry.name)?
                .unwrap_or(self.started_at);
            if entry.trigger.is_due(since, now) {
                due.push(entry);
            }
        }
        Ok(due)
    }

    /// Fire every due entry. Returns handles of the runs spawned.
    pub fn tick(&self, now: DateTime<Utc>) -> RegistryResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        for entry in self.due(now)? {
            self.registry.record_run(&entry.name, now)?;

            if entry.task != self.task.name() {
                warn!(name = %entry.name, task = %entry.task, "no handler for scheduled task");
                continue;
            }
            let Some(collector) = entry.args.first().cloned() else {
                warn!(name = %entry.name, "schedule entry has no collector argument");
                continue;
            };
            let Some(guard) = self.guards.try_acquire(&collector) else {
                warn!(name = %entry.name, %collector, "ingestion already running, skipping");
                continue;
            };

            info!(name = %entry.name, %collector, "firing scheduled grab");
            let task = Arc::clone(&self.task);
            let name = entry.name;
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                match task.run(collector.clone()).await {
                    Ok(()) => debug!(%name, %collector, "scheduled grab completed"),
                    Err(e) => error!(%name, %collector, error = %e, "scheduled grab failed"),
                }
            }));
        }
        Ok(handles)
    }

    /// Run the beat loop until shutdown signal.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "beat loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.tick(Utc::now()) {
                        error!(error = %e, "beat tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("beat loop shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::BoxFuture;
    use crate::reconciler::{GRAB_TASK, Reconciler};
    use crate::registry::{InMemoryScheduleRegistry, RedbScheduleRegistry};
    use aspath_core::GrabberConfig;
    use aspath_state::{CronSchedule, StateStore};
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use tokio::sync::Notify;

    /// Records every collector it is invoked for; optionally blocks until
    /// released.
    #[derive(Default)]
    struct RecordingTask {
        calls: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl IngestionTask for RecordingTask {
        fn name(&self) -> &str {
            GRAB_TASK
        }

        fn run(&self, collector: String) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.calls.lock().push(collector);
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                Ok(())
            })
        }
    }

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, h, m, 0).unwrap()
    }

    fn reconciled(registry: Arc<dyn ScheduleRegistry>) {
        let grabbers = BTreeMap::from([
            ("AMS-IX".to_string(), GrabberConfig { hour: 2, minute: 0 }),
            ("DE-CIX".to_string(), GrabberConfig { hour: 3, minute: 15 }),
        ]);
        Reconciler::new(registry).reconcile(&grabbers).unwrap();
    }

    #[tokio::test]
    async fn fires_each_entry_once_per_day() {
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(InMemoryScheduleRegistry::new());
        reconciled(registry.clone());
        let task = Arc::new(RecordingTask::default());
        let beat = Beat::new(registry, task.clone(), Duration::from_secs(30))
            .with_started_at(at(1, 0, 0));

        assert!(beat.tick(at(1, 1, 0)).unwrap().is_empty());

        for handle in beat.tick(at(1, 2, 0)).unwrap() {
            handle.await.unwrap();
        }
        assert_eq!(*task.calls.lock(), vec!["AMS-IX".to_string()]);

        // Already fired today.
        assert!(beat.tick(at(1, 2, 30)).unwrap().is_empty());

        for handle in beat.tick(at(1, 4, 0)).unwrap() {
            handle.await.unwrap();
        }
        assert_eq!(
            *task.calls.lock(),
            vec!["AMS-IX".to_string(), "DE-CIX".to_string()]
        );

        // Next day both are due again.
        let handles = beat.tick(at(2, 5, 0)).unwrap();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(task.calls.lock().len(), 4);
    }

    #[tokio::test]
    async fn overlapping_runs_for_one_collector_are_skipped() {
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(InMemoryScheduleRegistry::new());
        registry
            .add(ScheduleEntry {
                name: "grab-AMS-IX".to_string(),
                trigger: CronSchedule::daily(2, 0),
                task: GRAB_TASK.to_string(),
                args: vec!["AMS-IX".to_string()],
            })
            .unwrap();
        let gate = Arc::new(Notify::new());
        let task = Arc::new(RecordingTask {
            calls: Mutex::new(Vec::new()),
            gate: Some(gate.clone()),
        });
        let beat = Beat::new(registry, task.clone(), Duration::from_secs(30))
            .with_started_at(at(1, 0, 0));

        let first = beat.tick(at(1, 2, 0)).unwrap();
        assert_eq!(first.len(), 1);
        assert!(beat.guards().is_running("AMS-IX"));

        // A day later the first run is still in flight.
        let second = beat.tick(at(2, 2, 0)).unwrap();
        assert!(second.is_empty());

        gate.notify_one();
        for handle in first {
            handle.await.unwrap();
        }
        assert!(!beat.guards().is_running("AMS-IX"));
        assert_eq!(task.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn last_run_survives_restart() {
        let store = StateStore::open_in_memory().unwrap();
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(RedbScheduleRegistry::new(store.clone()));
        reconciled(registry.clone());
        let task = Arc::new(RecordingTask::default());

        let beat = Beat::new(registry.clone(), task.clone(), Duration::from_secs(30))
            .with_started_at(at(1, 0, 0));
        for handle in beat.tick(at(1, 2, 5)).unwrap() {
            handle.await.unwrap();
        }

        // Restart: reconcile again and start a new loop with an earlier
        // reference point. The recorded fire time still wins.
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(RedbScheduleRegistry::new(store));
        reconciled(registry.clone());
        let beat = Beat::new(registry, task.clone(), Duration::from_secs(30))
            .with_started_at(at(1, 0, 0));
        let due: Vec<_> = beat.due(at(1, 2, 10)).unwrap().into_iter().map(|e| e.name).collect();
        assert!(due.is_empty());
        assert_eq!(task.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn unknown_task_is_not_run() {
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(InMemoryScheduleRegistry::new());
        registry
            .add(ScheduleEntry {
                name: "cleanup".to_string(),
                trigger: CronSchedule::daily(2, 0),
                task: "aspath.cleanup".to_string(),
                args: vec![],
            })
            .unwrap();
        let task = Arc::new(RecordingTask::default());
        let beat = Beat::new(registry.clone(), task.clone(), Duration::from_secs(30))
            .with_started_at(at(1, 0, 0));

        assert!(beat.tick(at(1, 3, 0)).unwrap().is_empty());
        assert!(task.calls.lock().is_empty());
        // Recorded anyway, so it is not reconsidered every tick.
        assert_eq!(registry.last_run("cleanup").unwrap(), Some(at(1, 3, 0)));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let registry: Arc<dyn ScheduleRegistry> = Arc::new(InMemoryScheduleRegistry::new());
        let beat = Beat::new(
            registry,
            Arc::new(RecordingTask::default()),
            Duration::from_millis(10),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { beat.run(rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
