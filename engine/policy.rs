use wrldbot_config::TargetConfig;
use wrldbot_surface::{Component, Snapshot};

/// Heuristic factor for the "vault is badly behind" trigger in standard
/// mode: the vault is upgraded only when the miner cost exceeds this many
/// times the vault balance. Inherited constant with no deeper derivation.
pub const VAULT_LAG_FACTOR: f64 = 10.0;

/// Positive gap between a component's configured target level and its
/// current level, paired with the cost of closing it by one step.
/// Recomputed fresh every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discrepancy {
    /// Component behind its target.
    pub component: Component,
    /// `target - current_level`, always positive.
    pub deficit: u32,
    /// Current upgrade cost of the component.
    pub cost: f64,
}

/// Collects discrepancies for every component with a set target, a positive
/// deficit, and a readable cost, in tie-break priority order.
#[must_use]
pub fn discrepancies(snapshot: &Snapshot, config: &TargetConfig) -> Vec<Discrepancy> {
    let mut found = Vec::new();
    for component in Component::ALL {
        let target = config.target(component);
        if target == 0 {
            continue;
        }
        let level = snapshot.level(component);
        if level >= target {
            continue;
        }
        let Some(cost) = snapshot.cost(component) else {
            continue;
        };
        found.push(Discrepancy {
            component,
            deficit: target - level,
            cost,
        });
    }
    found
}

/// Picks the discrepancy with the strictly largest deficit. Ties resolve to
/// the earliest component in declaration order, which the input preserves.
#[must_use]
pub fn select(discrepancies: &[Discrepancy]) -> Option<&Discrepancy> {
    let mut best: Option<&Discrepancy> = None;
    for candidate in discrepancies {
        if best.is_none_or(|current| candidate.deficit > current.deficit) {
            best = Some(candidate);
        }
    }
    best
}

/// Currency reserve withheld from spending while stealing mode is active:
/// one scanner upgrade plus one stealer upgrade. `None` when either cost is
/// unreadable this tick, which suppresses every buffer-dependent decision.
#[must_use]
pub fn reserve_buffer(snapshot: &Snapshot, stealing_mode: bool) -> Option<f64> {
    if !stealing_mode {
        return Some(0.0);
    }
    let scanner = snapshot.cost(Component::Scanner)?;
    let stealer = snapshot.cost(Component::Stealer)?;
    Some(scanner + stealer)
}

/// Buffer-aware affordability: a non-vault upgrade of cost `cost` may spend
/// down to the buffer, exactly (`vault - cost >= buffer` holds at equality).
#[must_use]
pub fn is_affordable(cost: f64, vault_balance: f64, buffer: f64) -> bool {
    vault_balance - cost >= buffer
}

/// Number of repeated upgrades one greedy pass can afford while preserving
/// the buffer. Zero when the balance no longer covers a single step.
#[must_use]
pub fn batch_size(vault_balance: f64, buffer: f64, cost: f64) -> u32 {
    if cost <= 0.0 {
        return 0;
    }
    let steps = ((vault_balance - buffer) / cost).floor();
    if steps <= 0.0 {
        0
    } else if steps >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        steps as u32
    }
}

/// Funds level at which a sweep into the vault triggers.
#[must_use]
pub fn transfer_threshold(miner_cost: f64, ratio: f64) -> f64 {
    miner_cost * ratio
}

/// True when the miner cost has outgrown the vault by more than
/// [`VAULT_LAG_FACTOR`], the standard-mode cue to grow the vault instead.
#[must_use]
pub fn vault_badly_behind(miner_cost: f64, vault_balance: f64) -> bool {
    miner_cost > VAULT_LAG_FACTOR * vault_balance
}
