#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Decision engine for the wrldbot command-center agent.
//!
//! Every tick reconciles four concerns: which component is most behind its
//! target, whether the vault can fund it net of the stealing-mode buffer,
//! whether to fire one interaction or a batch, and whether the page has gone
//! stale and must be cold-restarted.

/// Pure decision rules: discrepancies, affordability, batch sizing.
#[path = "../policy.rs"]
pub mod policy;

/// Inactivity tracking across ticks.
#[path = "../marker.rs"]
pub mod marker;

/// Telemetry handle combining the JSON log and an activity feed.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// The tick algorithm itself.
#[path = "../decision.rs"]
pub mod decision;

/// Fixed-period driver invoking the engine.
#[path = "../runner.rs"]
pub mod runner;

pub use decision::{DecisionEngine, EngineTiming, TickReport, UpgradeDecision};
pub use marker::ActivityMarker;
pub use policy::{Discrepancy, VAULT_LAG_FACTOR};
pub use runner::{RunSummary, TickRunner};
pub use telemetry::{AgentTelemetry, AgentTelemetryBuilder};
