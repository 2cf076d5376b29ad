use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::instrument;
use uuid::Uuid;
use wrldbot_config::{ConfigStore, TargetConfig};
use wrldbot_dispatch::{BusyFlags, Dispatcher, BATCH_STEP};
use wrldbot_logging::LogLevel;
use wrldbot_surface::{
    ActionSink, ActionTarget, Component, RestartTrigger, Snapshot, SnapshotSource,
};

use crate::{marker::ActivityMarker, policy, telemetry::AgentTelemetry};

/// Delay knobs of the decision loop. Defaults mirror the live deployment;
/// tests shrink them or drive them with a paused clock.
#[derive(Debug, Clone, Copy)]
pub struct EngineTiming {
    /// Period of the fixed-rate tick driver.
    pub tick_period: Duration,
    /// Spacing between firings of a batched upgrade.
    pub batch_step: Duration,
    /// Quiescent hold on the transfer flag, shorter than the tick period so
    /// only the immediately following tick is suppressed.
    pub transfer_quiescent: Duration,
    /// Unchanged-readings span that forces a cold restart.
    pub inactivity_threshold: Duration,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(500),
            batch_step: BATCH_STEP,
            transfer_quiescent: Duration::from_millis(250),
            inactivity_threshold: Duration::from_secs(60),
        }
    }
}

/// One dispatched upgrade: the chosen component and how many firings the
/// batch carries (1 outside stealing mode).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpgradeDecision {
    /// Component being upgraded.
    pub component: Component,
    /// Number of firings dispatched.
    pub count: u32,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick identifier.
    pub tick_id: Uuid,
    /// Upgrade dispatched this tick, if any.
    pub upgrade: Option<UpgradeDecision>,
    /// Whether a transfer was dispatched.
    pub transferred: bool,
    /// Whether the inactivity condition fired the restart trigger.
    pub restart_required: bool,
    /// Whether the tick was skipped because the snapshot was unreadable.
    pub skipped: bool,
    /// Timestamp of completion.
    pub completed_at: DateTime<Utc>,
}

/// The decision loop context: every piece of cross-tick state lives here as
/// a field and is threaded explicitly, never as ambient globals.
pub struct DecisionEngine {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn ActionSink>,
    restart: Arc<dyn RestartTrigger>,
    store: Arc<ConfigStore>,
    dispatcher: Dispatcher,
    flags: Arc<BusyFlags>,
    marker: Mutex<ActivityMarker>,
    levels: watch::Sender<IndexMap<Component, u32>>,
    telemetry: Option<AgentTelemetry>,
    timing: EngineTiming,
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("timing", &self.timing)
            .finish()
    }
}

impl DecisionEngine {
    /// Wires the engine to its collaborators.
    #[must_use]
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn ActionSink>,
        restart: Arc<dyn RestartTrigger>,
        store: Arc<ConfigStore>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&sink));
        let flags = dispatcher.flags();
        let (levels, _) = watch::channel(IndexMap::new());
        Self {
            source,
            sink,
            restart,
            store,
            dispatcher,
            flags,
            marker: Mutex::new(ActivityMarker::new()),
            levels,
            telemetry: None,
            timing: EngineTiming::default(),
        }
    }

    /// Overrides the delay knobs.
    #[must_use]
    pub fn with_timing(mut self, timing: EngineTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Attaches telemetry sinks.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AgentTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Current timing configuration.
    #[must_use]
    pub const fn timing(&self) -> &EngineTiming {
        &self.timing
    }

    /// Busy flags guarding the mutating paths (shared with the dispatcher).
    #[must_use]
    pub fn flags(&self) -> Arc<BusyFlags> {
        Arc::clone(&self.flags)
    }

    /// Live per-component levels, refreshed every tick for the panel.
    #[must_use]
    pub fn levels(&self) -> watch::Receiver<IndexMap<Component, u32>> {
        self.levels.subscribe()
    }

    /// Runs one decision pass: read, decide, dispatch at most one upgrade
    /// and one transfer, refresh the level display, check for staleness.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> TickReport {
        let tick_id = Uuid::new_v4();
        let snapshot = match self.source.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "snapshot unreadable, tick skipped");
                self.note(
                    LogLevel::Warn,
                    "engine.tick.skipped",
                    json!({ "error": err.to_string() }),
                );
                return TickReport {
                    tick_id,
                    upgrade: None,
                    transferred: false,
                    restart_required: false,
                    skipped: true,
                    completed_at: Utc::now(),
                };
            }
        };
        let config = self.store.current();
        let buffer = policy::reserve_buffer(&snapshot, config.stealing_mode_active);

        let upgrade = if config.control_mode_active {
            self.target_driven_upgrade(&snapshot, &config, buffer)
        } else {
            self.standard_upgrade(&snapshot, &config, buffer)
        };

        let transferred = self.attempt_transfer(&snapshot, &config, buffer).await;
        let _ = self.levels.send(snapshot.levels.clone());
        let restart_required = self.check_inactivity(&snapshot).await;

        self.note(
            LogLevel::Debug,
            "engine.tick.completed",
            json!({
                "tick_id": tick_id,
                "upgrade": upgrade.map(|decision| decision.component.label()),
                "transferred": transferred,
                "restart_required": restart_required
            }),
        );
        TickReport {
            tick_id,
            upgrade,
            transferred,
            restart_required,
            skipped: false,
            completed_at: Utc::now(),
        }
    }

    /// Control mode: close the single largest positive deficit.
    fn target_driven_upgrade(
        &self,
        snapshot: &Snapshot,
        config: &TargetConfig,
        buffer: Option<f64>,
    ) -> Option<UpgradeDecision> {
        let found = policy::discrepancies(snapshot, config);
        let chosen = policy::select(&found)?;
        if self.flags.upgrade_in_flight() {
            self.note(
                LogLevel::Debug,
                "engine.upgrade.busy",
                json!({ "component": chosen.component.label() }),
            );
            return None;
        }
        self.attempt_upgrade(chosen.component, chosen.cost, snapshot, config, buffer)
    }

    /// Standard mode: miner first, vault when badly behind, scanner and
    /// stealer only while cheap relative to the transfer threshold.
    fn standard_upgrade(
        &self,
        snapshot: &Snapshot,
        config: &TargetConfig,
        buffer: Option<f64>,
    ) -> Option<UpgradeDecision> {
        if self.flags.upgrade_in_flight() {
            return None;
        }
        let miner_cost = snapshot.cost(Component::Miner)?;
        if let Some(decision) =
            self.attempt_upgrade(Component::Miner, miner_cost, snapshot, config, buffer)
        {
            return Some(decision);
        }
        if policy::vault_badly_behind(miner_cost, snapshot.vault_balance) {
            if let Some(vault_cost) = snapshot.cost(Component::Vault) {
                if let Some(decision) =
                    self.attempt_upgrade(Component::Vault, vault_cost, snapshot, config, buffer)
                {
                    return Some(decision);
                }
            }
        }
        let threshold =
            policy::transfer_threshold(miner_cost, config.transfer_threshold_ratio);
        for component in [Component::Scanner, Component::Stealer] {
            let Some(cost) = snapshot.cost(component) else {
                continue;
            };
            if cost > threshold {
                continue;
            }
            if let Some(decision) =
                self.attempt_upgrade(component, cost, snapshot, config, buffer)
            {
                return Some(decision);
            }
        }
        None
    }

    /// Applies the buffer-aware affordability rule and dispatches a single
    /// or batched upgrade. The vault is exempt from the buffer reservation
    /// and only requires its own cost to be covered.
    fn attempt_upgrade(
        &self,
        component: Component,
        cost: f64,
        snapshot: &Snapshot,
        config: &TargetConfig,
        buffer: Option<f64>,
    ) -> Option<UpgradeDecision> {
        if component == Component::Vault {
            if snapshot.vault_balance >= cost {
                self.note(
                    LogLevel::Info,
                    "engine.upgrade.dispatched",
                    json!({ "component": component.label(), "cost": cost, "count": 1 }),
                );
                self.dispatcher.dispatch_single(ActionTarget::Upgrade(component));
                return Some(UpgradeDecision { component, count: 1 });
            }
            return None;
        }
        let Some(buffer) = buffer else {
            self.note(
                LogLevel::Debug,
                "engine.upgrade.buffer_unknown",
                json!({ "component": component.label() }),
            );
            return None;
        };
        if !policy::is_affordable(cost, snapshot.vault_balance, buffer) {
            self.note(
                LogLevel::Debug,
                "engine.upgrade.unaffordable",
                json!({
                    "component": component.label(),
                    "cost": cost,
                    "vault": snapshot.vault_balance,
                    "buffer": buffer
                }),
            );
            return None;
        }
        let count = if config.stealing_mode_active {
            let batch = policy::batch_size(snapshot.vault_balance, buffer, cost);
            if batch == 0 {
                return None;
            }
            self.dispatcher.dispatch_repeated(
                ActionTarget::Upgrade(component),
                batch,
                self.timing.batch_step,
            );
            batch
        } else {
            self.dispatcher.dispatch_single(ActionTarget::Upgrade(component));
            1
        };
        self.note(
            LogLevel::Info,
            "engine.upgrade.dispatched",
            json!({ "component": component.label(), "cost": cost, "count": count }),
        );
        Some(UpgradeDecision { component, count })
    }

    /// Always-attempted sweep of liquid funds into the vault.
    async fn attempt_transfer(
        &self,
        snapshot: &Snapshot,
        config: &TargetConfig,
        buffer: Option<f64>,
    ) -> bool {
        if self.flags.transfer_in_flight() {
            self.note(LogLevel::Debug, "engine.transfer.busy", json!({}));
            return false;
        }
        let Some(miner_cost) = snapshot.cost(Component::Miner) else {
            self.note(LogLevel::Debug, "engine.transfer.cost_unknown", json!({}));
            return false;
        };
        let Some(buffer) = buffer else {
            self.note(LogLevel::Debug, "engine.transfer.buffer_unknown", json!({}));
            return false;
        };
        let threshold =
            policy::transfer_threshold(miner_cost, config.transfer_threshold_ratio);
        if snapshot.funds < threshold || snapshot.vault_balance + snapshot.funds < buffer {
            return false;
        }
        self.flags.hold_transfer(self.timing.transfer_quiescent);
        match self.sink.trigger(ActionTarget::StoreVault).await {
            Ok(()) => {
                self.note(
                    LogLevel::Info,
                    "engine.transfer.dispatched",
                    json!({ "funds": snapshot.funds, "threshold": threshold }),
                );
                if let Some(telemetry) = &self.telemetry {
                    let _ = telemetry
                        .event(format!("transfer of {:.2} coins dispatched", snapshot.funds))
                        .await;
                }
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "transfer trigger unresolved");
                self.note(
                    LogLevel::Error,
                    "engine.transfer.failed",
                    json!({ "error": err.to_string() }),
                );
                self.flags.clear_transfer();
                false
            }
        }
    }

    /// Fires the cold restart when both readings have been frozen past the
    /// threshold. The only fatal path; the runner stops afterwards.
    async fn check_inactivity(&self, snapshot: &Snapshot) -> bool {
        let stale = self.marker.lock().observe(
            snapshot.funds,
            snapshot.vault_balance,
            self.timing.inactivity_threshold,
        );
        if !stale {
            return false;
        }
        tracing::warn!("readings frozen past threshold, forcing session restart");
        self.note(
            LogLevel::Warn,
            "engine.session.restart",
            json!({
                "funds": snapshot.funds,
                "vault": snapshot.vault_balance,
                "threshold_secs": self.timing.inactivity_threshold.as_secs()
            }),
        );
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.event("stale session detected, restarting").await;
        }
        self.restart.restart().await;
        true
    }

    fn note(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;
    use tokio::time::sleep;
    use wrldbot_surface::SurfaceError;

    struct MockSurface {
        snapshot: Mutex<Snapshot>,
        triggers: Mutex<Vec<ActionTarget>>,
        restarts: AtomicU32,
    }

    impl MockSurface {
        fn new(snapshot: Snapshot) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Mutex::new(snapshot),
                triggers: Mutex::new(Vec::new()),
                restarts: AtomicU32::new(0),
            })
        }

        fn set_snapshot(&self, snapshot: Snapshot) {
            *self.snapshot.lock() = snapshot;
        }

        fn triggers(&self) -> Vec<ActionTarget> {
            self.triggers.lock().clone()
        }

        fn upgrades(&self, component: Component) -> usize {
            self.triggers()
                .iter()
                .filter(|target| **target == ActionTarget::Upgrade(component))
                .count()
        }

        fn transfers(&self) -> usize {
            self.triggers()
                .iter()
                .filter(|target| **target == ActionTarget::StoreVault)
                .count()
        }
    }

    #[async_trait]
    impl SnapshotSource for MockSurface {
        async fn read_snapshot(&self) -> Result<Snapshot, SurfaceError> {
            Ok(self.snapshot.lock().clone())
        }
    }

    #[async_trait]
    impl ActionSink for MockSurface {
        async fn trigger(&self, target: ActionTarget) -> Result<(), SurfaceError> {
            self.triggers.lock().push(target);
            Ok(())
        }
    }

    #[async_trait]
    impl RestartTrigger for MockSurface {
        async fn restart(&self) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn snapshot(
        funds: f64,
        vault_balance: f64,
        levels: &[(Component, u32)],
        costs: &[(Component, f64)],
    ) -> Snapshot {
        let mut level_map = IndexMap::new();
        let mut cost_map: IndexMap<Component, Option<f64>> = IndexMap::new();
        for component in Component::ALL {
            level_map.insert(component, 0);
            cost_map.insert(component, None);
        }
        for &(component, level) in levels {
            level_map.insert(component, level);
        }
        for &(component, cost) in costs {
            cost_map.insert(component, Some(cost));
        }
        Snapshot {
            funds,
            vault_balance,
            levels: level_map,
            costs: cost_map,
        }
    }

    fn engine_for(
        surface: &Arc<MockSurface>,
        edit: impl FnOnce(&mut TargetConfig),
    ) -> (DecisionEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(ConfigStore::open(dir.path().join("agent.json")).unwrap());
        store.update(edit).unwrap();
        let engine = DecisionEngine::new(
            Arc::clone(surface) as Arc<dyn SnapshotSource>,
            Arc::clone(surface) as Arc<dyn ActionSink>,
            Arc::clone(surface) as Arc<dyn RestartTrigger>,
            store,
        );
        (engine, dir)
    }

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn control_mode_upgrades_the_largest_deficit() {
        let surface = MockSurface::new(snapshot(
            0.0,
            100.0,
            &[],
            &[(Component::Firewall, 5.0), (Component::Scanner, 5.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.targets.insert(Component::Firewall, 2);
            config.targets.insert(Component::Scanner, 6);
        });
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade,
            Some(UpgradeDecision {
                component: Component::Scanner,
                count: 1
            })
        );
        assert_eq!(surface.upgrades(Component::Scanner), 1);
        assert_eq!(surface.upgrades(Component::Firewall), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_tick_is_guarded_while_in_flight() {
        let surface = MockSurface::new(snapshot(
            0.0,
            100.0,
            &[],
            &[(Component::Firewall, 5.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.targets.insert(Component::Firewall, 3);
        });
        let first = engine.tick().await;
        let second = engine.tick().await;
        settle().await;
        assert!(first.upgrade.is_some());
        assert!(second.upgrade.is_none());
        assert_eq!(surface.upgrades(Component::Firewall), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_is_respected_exactly_at_the_boundary() {
        // buffer = 3 + 4 = 7, cost = 5: vault 12 affords exactly one step.
        let costs = [
            (Component::Scanner, 3.0),
            (Component::Stealer, 4.0),
            (Component::Firewall, 5.0),
        ];
        let surface = MockSurface::new(snapshot(0.0, 12.0, &[], &costs));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.stealing_mode_active = true;
            config.targets.insert(Component::Firewall, 4);
        });
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade,
            Some(UpgradeDecision {
                component: Component::Firewall,
                count: 1
            })
        );

        let starved = MockSurface::new(snapshot(0.0, 11.9, &[], &costs));
        let (engine, _dir) = engine_for(&starved, |config| {
            config.control_mode_active = true;
            config.stealing_mode_active = true;
            config.targets.insert(Component::Firewall, 4);
        });
        let report = engine.tick().await;
        settle().await;
        assert!(report.upgrade.is_none());
        assert_eq!(starved.upgrades(Component::Firewall), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn vault_upgrade_is_exempt_from_the_buffer() {
        // vault cost 10, buffer 7: balance 10 < cost + buffer yet dispatches.
        let surface = MockSurface::new(snapshot(
            0.0,
            10.0,
            &[],
            &[
                (Component::Scanner, 3.0),
                (Component::Stealer, 4.0),
                (Component::Vault, 10.0),
            ],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.stealing_mode_active = true;
            config.targets.insert(Component::Vault, 2);
        });
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade,
            Some(UpgradeDecision {
                component: Component::Vault,
                count: 1
            })
        );
        assert_eq!(surface.upgrades(Component::Vault), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stealing_mode_batches_greedily() {
        // headroom = 100 - 7 = 93, cost 25 -> floor 3 firings.
        let surface = MockSurface::new(snapshot(
            0.0,
            100.0,
            &[],
            &[
                (Component::Scanner, 3.0),
                (Component::Stealer, 4.0),
                (Component::Firewall, 25.0),
            ],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.stealing_mode_active = true;
            config.targets.insert(Component::Firewall, 9);
        });
        let report = engine.tick().await;
        assert_eq!(
            report.upgrade,
            Some(UpgradeDecision {
                component: Component::Firewall,
                count: 3
            })
        );
        sleep(BATCH_STEP * 4).await;
        assert_eq!(surface.upgrades(Component::Firewall), 3);
        assert!(!engine.flags().upgrade_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_fires_on_threshold() {
        // threshold = 100 * 0.25 = 25; funds 30 qualifies.
        let surface = MockSurface::new(snapshot(
            30.0,
            0.0,
            &[],
            &[(Component::Miner, 100.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let report = engine.tick().await;
        assert!(report.transferred);
        assert_eq!(surface.transfers(), 1);

        // The quiescent hold suppresses the immediately following tick.
        let report = engine.tick().await;
        assert!(!report.transferred);
        assert_eq!(surface.transfers(), 1);

        sleep(Duration::from_millis(260)).await;
        let report = engine.tick().await;
        assert!(report.transferred);
        assert_eq!(surface.transfers(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_needs_buffer_coverage() {
        // buffer 7; vault + funds = 5 + 1 = 6 < 7 even though funds pass
        // the threshold.
        let surface = MockSurface::new(snapshot(
            5.0,
            1.0,
            &[],
            &[
                (Component::Miner, 4.0),
                (Component::Scanner, 3.0),
                (Component::Stealer, 4.0),
            ],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.stealing_mode_active = true;
        });
        let report = engine.tick().await;
        assert!(!report.transferred);
        assert_eq!(surface.transfers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_miner_cost_suppresses_the_transfer() {
        let surface = MockSurface::new(snapshot(500.0, 500.0, &[], &[]));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let report = engine.tick().await;
        assert!(!report.transferred);
        assert!(report.upgrade.is_none());
        assert!(surface.triggers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_buffer_suppresses_non_vault_upgrades() {
        // Stealing mode on but the stealer cost is unreadable: the buffer is
        // unknown, so the firewall upgrade and the transfer are both held.
        let surface = MockSurface::new(snapshot(
            100.0,
            100.0,
            &[],
            &[
                (Component::Firewall, 5.0),
                (Component::Scanner, 3.0),
                (Component::Miner, 4.0),
            ],
        ));
        let (engine, _dir) = engine_for(&surface, |config| {
            config.control_mode_active = true;
            config.stealing_mode_active = true;
            config.targets.insert(Component::Firewall, 2);
        });
        let report = engine.tick().await;
        settle().await;
        assert!(report.upgrade.is_none());
        assert!(!report.transferred);
        assert!(surface.triggers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn standard_mode_prefers_the_miner() {
        let surface = MockSurface::new(snapshot(
            0.0,
            50.0,
            &[],
            &[(Component::Miner, 10.0), (Component::Vault, 5.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade.map(|decision| decision.component),
            Some(Component::Miner)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn standard_mode_grows_a_badly_behind_vault() {
        // Miner unaffordable (cost 500 > vault 40) and 500 > 10 * 40.
        let surface = MockSurface::new(snapshot(
            0.0,
            40.0,
            &[],
            &[(Component::Miner, 500.0), (Component::Vault, 30.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade.map(|decision| decision.component),
            Some(Component::Vault)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn standard_mode_buys_cheap_scanners_only() {
        // threshold = 200 * 0.25 = 50; scanner at 40 qualifies, stealer at
        // 60 does not. Miner itself is unaffordable and the vault is not
        // badly behind (200 <= 10 * 100).
        let surface = MockSurface::new(snapshot(
            0.0,
            100.0,
            &[],
            &[
                (Component::Miner, 200.0),
                (Component::Vault, 30.0),
                (Component::Scanner, 40.0),
                (Component::Stealer, 60.0),
            ],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let report = engine.tick().await;
        settle().await;
        assert_eq!(
            report.upgrade.map(|decision| decision.component),
            Some(Component::Scanner)
        );
        assert_eq!(surface.upgrades(Component::Stealer), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn frozen_readings_force_a_restart() {
        let surface = MockSurface::new(snapshot(
            5.0,
            5.0,
            &[],
            &[(Component::Miner, 1_000.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let first = engine.tick().await;
        assert!(!first.restart_required);
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = engine.tick().await;
        assert!(second.restart_required);
        assert_eq!(surface.restarts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_changed_reading_resets_the_inactivity_timer() {
        let surface = MockSurface::new(snapshot(
            5.0,
            5.0,
            &[],
            &[(Component::Miner, 1_000.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        engine.tick().await;
        tokio::time::advance(Duration::from_secs(59)).await;
        surface.set_snapshot(snapshot(5.0, 6.0, &[], &[(Component::Miner, 1_000.0)]));
        engine.tick().await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let report = engine.tick().await;
        assert!(!report.restart_required);
        assert_eq!(surface.restarts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn levels_are_published_for_the_panel() {
        let surface = MockSurface::new(snapshot(
            0.0,
            0.0,
            &[(Component::Miner, 7)],
            &[(Component::Miner, 1_000.0)],
        ));
        let (engine, _dir) = engine_for(&surface, |_| {});
        let levels = engine.levels();
        engine.tick().await;
        assert_eq!(
            levels.borrow().get(&Component::Miner).copied(),
            Some(7)
        );
    }
}
