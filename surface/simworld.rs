use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use wrldbot_feed::{FeedEntry, FeedPublisher, MemoryFeed};

use crate::io::{ActionSink, RestartTrigger, SnapshotSource, SurfaceError};
use crate::model::{decorated_value, ActionTarget, Component, Snapshot};

const COST_GROWTH: f64 = 1.6;
const MINER_YIELD_PER_POLL: f64 = 0.05;
const STEAL_YIELD_PER_LEVEL: f64 = 0.5;
const STEAL_EVERY_READS: u64 = 25;
const VICTIM_POOL: [&str; 4] = ["zer0day", "packetghost", "nullrunner", "bitburglar"];

const fn base_cost(component: Component) -> f64 {
    match component {
        Component::Firewall => 5.0,
        Component::Scanner => 2.0,
        Component::Miner => 4.0,
        Component::Stealer => 3.0,
        Component::Vault => 8.0,
    }
}

#[derive(Debug)]
struct SimState {
    funds: f64,
    vault: f64,
    levels: IndexMap<Component, u32>,
    cost_overrides: IndexMap<Component, String>,
    unresolvable: HashSet<ActionTarget>,
    frozen: bool,
    reads: u64,
    restarts: u32,
}

impl SimState {
    fn cost(&self, component: Component) -> f64 {
        let level = self.levels.get(&component).copied().unwrap_or(0);
        base_cost(component) * COST_GROWTH.powf(f64::from(level))
    }

    fn cost_label(&self, component: Component) -> String {
        self.cost_overrides.get(&component).cloned().unwrap_or_else(|| {
            format!("upgrade ({:.2})", self.cost(component))
        })
    }
}

impl Default for SimState {
    fn default() -> Self {
        let mut levels = IndexMap::new();
        for component in Component::ALL {
            levels.insert(component, 0);
        }
        levels.insert(Component::Miner, 1);
        levels.insert(Component::Vault, 1);
        Self {
            funds: 0.0,
            vault: 10.0,
            levels,
            cost_overrides: IndexMap::new(),
            unresolvable: HashSet::new(),
            frozen: false,
            reads: 0,
            restarts: 0,
        }
    }
}

/// Deterministic in-memory command center standing in for the hosting page.
///
/// Coins accrue per poll from the miner, upgrade costs grow geometrically,
/// and a stealer occasionally lands a hit that is echoed on the broadcast
/// feed, so the whole agent loop can run without a browser.
#[derive(Debug, Clone)]
pub struct SimWorld {
    handle: String,
    state: Arc<Mutex<SimState>>,
    feed: MemoryFeed,
}

impl SimWorld {
    /// Creates a fresh center owned by `handle` (the name other players see
    /// in steal broadcasts).
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            state: Arc::new(Mutex::new(SimState::default())),
            feed: MemoryFeed::new(64),
        }
    }

    /// The broadcast feed this world posts to.
    #[must_use]
    pub fn feed(&self) -> MemoryFeed {
        self.feed.clone()
    }

    /// Overrides the liquid funds reading.
    pub fn set_funds(&self, funds: f64) {
        self.state.lock().funds = funds;
    }

    /// Overrides the vault balance reading.
    pub fn set_vault(&self, vault: f64) {
        self.state.lock().vault = vault;
    }

    /// Overrides a component level.
    pub fn set_level(&self, component: Component, level: u32) {
        self.state.lock().levels.insert(component, level);
    }

    /// Replaces the rendered cost string of a component, e.g. with malformed
    /// text to exercise the parse-failure path.
    pub fn set_cost_label(&self, component: Component, label: impl Into<String>) {
        self.state.lock().cost_overrides.insert(component, label.into());
    }

    /// Marks an interaction as (un)resolvable on the write surface.
    pub fn set_unresolvable(&self, target: ActionTarget, unresolvable: bool) {
        let mut state = self.state.lock();
        if unresolvable {
            state.unresolvable.insert(target);
        } else {
            state.unresolvable.remove(&target);
        }
    }

    /// Freezes the page: readings stop changing and clicks stop landing.
    pub fn set_frozen(&self, frozen: bool) {
        self.state.lock().frozen = frozen;
    }

    /// Number of cold restarts the hosting session has seen.
    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.state.lock().restarts
    }
}

#[async_trait]
impl SnapshotSource for SimWorld {
    async fn read_snapshot(&self) -> Result<Snapshot, SurfaceError> {
        let (snapshot, broadcast) = {
            let mut state = self.state.lock();
            state.reads += 1;
            let mut broadcast = None;
            if !state.frozen {
                let miner_level = state.levels.get(&Component::Miner).copied().unwrap_or(0);
                state.funds += f64::from(miner_level) * MINER_YIELD_PER_POLL;
                let stealer_level = state.levels.get(&Component::Stealer).copied().unwrap_or(0);
                if stealer_level > 0 && state.reads % STEAL_EVERY_READS == 0 {
                    let amount = f64::from(stealer_level) * STEAL_YIELD_PER_LEVEL;
                    state.funds += amount;
                    let victim_index = usize::try_from(state.reads / STEAL_EVERY_READS)
                        .unwrap_or(0)
                        % VICTIM_POOL.len();
                    let victim = VICTIM_POOL[victim_index];
                    broadcast = Some(format!(
                        "BROADCAST | {victim} lost {amount:.2} coins to {}",
                        self.handle
                    ));
                }
            }
            let mut costs = IndexMap::new();
            for component in Component::ALL {
                costs.insert(component, decorated_value(&state.cost_label(component)));
            }
            let snapshot = Snapshot {
                funds: state.funds,
                vault_balance: state.vault,
                levels: state.levels.clone(),
                costs,
            };
            (snapshot, broadcast)
        };
        if let Some(line) = broadcast {
            let _ = self.feed.publish(FeedEntry::new(line)).await;
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl ActionSink for SimWorld {
    async fn trigger(&self, target: ActionTarget) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        if state.unresolvable.contains(&target) {
            return Err(SurfaceError::TargetUnresolved(target.label()));
        }
        if state.frozen {
            return Ok(());
        }
        match target {
            ActionTarget::Upgrade(component) => {
                let cost = state.cost(component);
                if state.vault >= cost {
                    state.vault -= cost;
                    let level = state.levels.entry(component).or_insert(0);
                    *level += 1;
                }
            }
            ActionTarget::StoreVault => {
                state.vault += state.funds;
                state.funds = 0.0;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RestartTrigger for SimWorld {
    async fn restart(&self) {
        let mut state = self.state.lock();
        state.restarts += 1;
        state.frozen = false;
    }
}
