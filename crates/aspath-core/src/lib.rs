pub mod config;

pub use config::{AspathConfig, GrabberConfig, SchedulerConfig, ServerConfig, WorkerConfig};
