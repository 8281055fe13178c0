//! aspath.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AspathConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub worker: Option<WorkerConfig>,
    /// Route collectors to grab, keyed by collector name.
    #[serde(default)]
    pub grabbers: BTreeMap<String, GrabberConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            data_dir: PathBuf::from("/var/lib/aspath"),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often the beat loop looks for due schedule entries.
    pub tick_secs: u64,
    /// Upper bound on the boot-time wipe-and-rebuild of the schedule registry.
    pub startup_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 30,
            startup_timeout_secs: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// External grab-and-ingest worker. The collector name is appended as the
/// last argument on every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Daily cron fields for one collector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrabberConfig {
    pub hour: u8,
    #[serde(alias = "minutes")]
    pub minute: u8,
}

impl AspathConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AspathConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, grabber) in &self.grabbers {
            if name.is_empty() {
                anyhow::bail!("grabber with an empty collector name");
            }
            if grabber.hour > 23 {
                anyhow::bail!("grabber {name}: hour {} out of range 0-23", grabber.hour);
            }
            if grabber.minute > 59 {
                anyhow::bail!("grabber {name}: minute {} out of range 0-59", grabber.minute);
            }
        }
        if let Some(worker) = &self.worker {
            if worker.command.trim().is_empty() {
                anyhow::bail!("worker.command must not be empty");
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
