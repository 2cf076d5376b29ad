#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Game-surface primitives for the wrldbot agent: the component taxonomy,
//! per-tick snapshots, the traits hiding the hosting page, and a
//! deterministic simulator standing in for it.

/// Component taxonomy, snapshots, and reading extraction.
#[path = "../model.rs"]
pub mod model;

/// External interface traits and surface errors.
#[path = "../io.rs"]
pub mod io;

/// Deterministic in-memory game used by the CLI sim mode and tests.
#[path = "../simworld.rs"]
pub mod simworld;

pub use io::{ActionSink, RestartTrigger, SnapshotSource, SurfaceError};
pub use model::{decorated_value, ActionTarget, Component, Snapshot};
pub use simworld::SimWorld;
