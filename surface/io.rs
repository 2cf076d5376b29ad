use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ActionTarget, Snapshot};

/// Errors surfaced by the hosting page boundary.
#[derive(Debug, Error, Clone)]
pub enum SurfaceError {
    /// The identifier does not resolve to an interactive target right now.
    /// Recoverable: aborts only the current dispatch.
    #[error("no interactive target resolves for {0}")]
    TargetUnresolved(String),
    /// A required numeric reading could not be parsed. The whole snapshot is
    /// rejected and the tick skipped.
    #[error("malformed reading at {location}: {raw:?}")]
    MalformedReading {
        /// Which reading failed.
        location: String,
        /// The raw text observed.
        raw: String,
    },
    /// The page is not reachable at all.
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

/// Read surface: pulls a fresh snapshot of the game counters on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Reads the current numeric state. Costs that fail to parse arrive as
    /// `None`; a funds/vault/level parse failure fails the whole read.
    async fn read_snapshot(&self) -> Result<Snapshot, SurfaceError>;
}

/// Write surface: enqueues one simulated user interaction.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Triggers the interaction behind `target`.
    async fn trigger(&self, target: ActionTarget) -> Result<(), SurfaceError>;
}

/// Cold-restart hook for the hosting session. Invoked only by the
/// inactivity path; there is no in-place recovery.
#[async_trait]
pub trait RestartTrigger: Send + Sync {
    /// Forces a full reload of the hosting session.
    async fn restart(&self);
}
