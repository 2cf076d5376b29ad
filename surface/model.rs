use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Upgradeable command-center component.
///
/// The declaration order doubles as the deterministic tie-break priority
/// whenever two components are equally far behind their targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Intrusion defense.
    Firewall,
    /// Target discovery.
    Scanner,
    /// Passive coin income.
    Miner,
    /// Coin theft from other centers.
    Stealer,
    /// Protected coin storage.
    Vault,
}

impl Component {
    /// Every component in tie-break priority order.
    pub const ALL: [Self; 5] = [
        Self::Firewall,
        Self::Scanner,
        Self::Miner,
        Self::Stealer,
        Self::Vault,
    ];

    /// Returns a short human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Firewall => "firewall",
            Self::Scanner => "scanner",
            Self::Miner => "miner",
            Self::Stealer => "stealer",
            Self::Vault => "vault",
        }
    }
}

/// Opaque interaction identifier on the write surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    /// The upgrade interaction of a component.
    Upgrade(Component),
    /// The sweep-funds-into-vault interaction.
    StoreVault,
}

impl ActionTarget {
    /// Returns a short human readable label.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Upgrade(component) => format!("upgrade:{}", component.label()),
            Self::StoreVault => "storevault".into(),
        }
    }
}

/// Numeric readings pulled from the page on one tick.
///
/// Never cached across ticks; a cost of `None` records that the decorated
/// cost string failed to parse and every decision depending on it is
/// suppressed for the tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Liquid coins outside the vault.
    pub funds: f64,
    /// Coins protected inside the vault.
    pub vault_balance: f64,
    /// Current level per component.
    pub levels: IndexMap<Component, u32>,
    /// Upgrade cost per component, when readable.
    pub costs: IndexMap<Component, Option<f64>>,
}

impl Snapshot {
    /// Current level of a component (0 when unreported).
    #[must_use]
    pub fn level(&self, component: Component) -> u32 {
        self.levels.get(&component).copied().unwrap_or(0)
    }

    /// Upgrade cost of a component, when readable this tick.
    #[must_use]
    pub fn cost(&self, component: Component) -> Option<f64> {
        self.costs.get(&component).copied().flatten()
    }
}

static DECORATED_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([\d.]+)\)").expect("static pattern"));

/// Extracts the numeric value embedded in a decorated cost string such as
/// `upgrade (2.1)`. Returns `None` for malformed strings.
#[must_use]
pub fn decorated_value(text: &str) -> Option<f64> {
    let captures = DECORATED_VALUE.captures(text)?;
    captures.get(1)?.as_str().parse::<f64>().ok()
}
