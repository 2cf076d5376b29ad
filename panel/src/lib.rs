#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Thin view/edit layer over the agent: renders the live configuration,
//! levels, and the most recent steal victim, and persists every edit
//! immediately so the next tick picks it up.

/// Broadcast-feed monitor extracting steal victims.
#[path = "../monitor.rs"]
pub mod monitor;

/// Configuration view and edit operations.
#[path = "../control.rs"]
pub mod control;

pub use control::{ControlPanel, PanelView};
pub use monitor::{BroadcastMonitor, StealVictim};
