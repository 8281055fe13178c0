//! Scheduler error types.

use thiserror::Error;

/// Errors raised by a schedule registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("schedule entry already registered: {0}")]
    DuplicateName(String),

    #[error("schedule registry unavailable: {0}")]
    Store(#[source] aspath_state::StateError),
}

impl From<aspath_state::StateError> for RegistryError {
    fn from(e: aspath_state::StateError) -> Self {
        match e {
            aspath_state::StateError::DuplicateName(name) => Self::DuplicateName(name),
            other => Self::Store(other),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that abort a reconciliation pass. The registry is left as it was
/// at the point of failure.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to list schedule entries: {0}")]
    List(#[source] RegistryError),

    #[error("failed to remove schedule entry {name}: {source}")]
    Clear {
        name: String,
        #[source]
        source: RegistryError,
    },

    #[error("failed to register {name} for collector {collector}: {source}")]
    Register {
        name: String,
        collector: String,
        #[source]
        source: RegistryError,
    },

    #[error("failed to prune stale schedule runs: {0}")]
    PruneRuns(#[source] RegistryError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
