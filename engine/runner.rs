use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::interval;

use crate::decision::DecisionEngine;

/// Tally of a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks skipped on unreadable snapshots.
    pub skipped: u64,
    /// Upgrade dispatches (batches count once).
    pub upgrades: u64,
    /// Transfer dispatches.
    pub transfers: u64,
    /// Whether the run ended on a forced session restart.
    pub restarted: bool,
}

/// Fixed-period driver invoking [`DecisionEngine::tick`] until the session
/// restarts or an optional tick budget runs out.
#[derive(Debug)]
pub struct TickRunner {
    engine: Arc<DecisionEngine>,
    budget: Option<u64>,
}

impl TickRunner {
    /// Creates an unbounded runner.
    #[must_use]
    pub const fn new(engine: Arc<DecisionEngine>) -> Self {
        Self {
            engine,
            budget: None,
        }
    }

    /// Caps the run at `ticks` ticks.
    #[must_use]
    pub const fn with_budget(mut self, ticks: u64) -> Self {
        self.budget = Some(ticks);
        self
    }

    /// Drives the loop. A forced restart is fatal by design and ends the
    /// run; everything else retries implicitly on the next tick.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut period = interval(self.engine.timing().tick_period);
        loop {
            period.tick().await;
            let report = self.engine.tick().await;
            summary.ticks += 1;
            if report.skipped {
                summary.skipped += 1;
            }
            if report.upgrade.is_some() {
                summary.upgrades += 1;
            }
            if report.transferred {
                summary.transfers += 1;
            }
            if report.restart_required {
                summary.restarted = true;
                break;
            }
            if self.budget.is_some_and(|budget| summary.ticks >= budget) {
                break;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wrldbot_config::ConfigStore;
    use wrldbot_surface::{ActionSink, RestartTrigger, SimWorld, SnapshotSource};

    #[tokio::test(start_paused = true)]
    async fn runner_honors_its_budget() {
        let world = Arc::new(SimWorld::new("TestAgent"));
        let dir = tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("agent.json")).unwrap());
        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&world) as Arc<dyn SnapshotSource>,
            Arc::clone(&world) as Arc<dyn ActionSink>,
            Arc::clone(&world) as Arc<dyn RestartTrigger>,
            store,
        ));
        let summary = TickRunner::new(engine).with_budget(5).run().await;
        assert_eq!(summary.ticks, 5);
        assert!(!summary.restarted);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_stops_on_a_forced_restart() {
        let world = Arc::new(SimWorld::new("TestAgent"));
        world.set_frozen(true);
        let dir = tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("agent.json")).unwrap());
        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&world) as Arc<dyn SnapshotSource>,
            Arc::clone(&world) as Arc<dyn ActionSink>,
            Arc::clone(&world) as Arc<dyn RestartTrigger>,
            store,
        ));
        let summary = TickRunner::new(engine).with_budget(1_000).run().await;
        assert!(summary.restarted);
        assert!(summary.ticks < 1_000);
        assert_eq!(world.restart_count(), 1);
    }
}
