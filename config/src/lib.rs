#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Durable agent configuration: per-component target levels, mode toggles,
//! the transfer threshold ratio, and panel visibility.
//!
//! The store hands out immutable snapshots and applies edits through an
//! update API that persists immediately, so a tick always consumes one
//! consistent configuration value.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use wrldbot_surface::Component;

/// Default transfer threshold ratio applied on first run and whenever a
/// stored ratio fails the `> 0` invariant.
pub const DEFAULT_TRANSFER_RATIO: f64 = 0.25;

/// User-chosen agent settings. A target of 0 means "no target set".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetConfig {
    /// Target level per component (0 = unset).
    pub targets: IndexMap<Component, u32>,
    /// Whether the target-driven control loop is active.
    pub control_mode_active: bool,
    /// Whether stealing mode (buffer reservation + batched upgrades) is on.
    pub stealing_mode_active: bool,
    /// Multiplier applied to the miner cost to derive the transfer threshold.
    pub transfer_threshold_ratio: f64,
    /// Whether the control panel is collapsed.
    pub panel_minimized: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        let mut targets = IndexMap::new();
        for component in Component::ALL {
            targets.insert(component, 0);
        }
        Self {
            targets,
            control_mode_active: false,
            stealing_mode_active: false,
            transfer_threshold_ratio: DEFAULT_TRANSFER_RATIO,
            panel_minimized: false,
        }
    }
}

impl TargetConfig {
    /// Target level of a component (0 when unset).
    #[must_use]
    pub fn target(&self, component: Component) -> u32 {
        self.targets.get(&component).copied().unwrap_or(0)
    }

    /// Restores the documented invariants: every component present in the
    /// target map and a finite, positive threshold ratio.
    pub fn normalize(&mut self) {
        for component in Component::ALL {
            self.targets.entry(component).or_insert(0);
        }
        if !self.transfer_threshold_ratio.is_finite() || self.transfer_threshold_ratio <= 0.0 {
            self.transfer_threshold_ratio = DEFAULT_TRANSFER_RATIO;
        }
    }
}

/// File-backed configuration store handing out immutable snapshots.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<TargetConfig>>,
}

impl ConfigStore {
    /// Opens the store, loading the persisted document when present and
    /// falling back to defaults otherwise. Absent keys inside a persisted
    /// document also fall back to their defaults.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading agent config {}", path.display()))?;
            serde_json::from_str::<TargetConfig>(&raw)
                .with_context(|| format!("parsing agent config {}", path.display()))?
        } else {
            TargetConfig::default()
        };
        config.normalize();
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// The current immutable configuration snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<TargetConfig> {
        self.current.read().clone()
    }

    /// Applies an edit, normalizes, persists, and publishes the new value.
    /// The returned snapshot is what the next engine tick will consume.
    pub fn update(&self, edit: impl FnOnce(&mut TargetConfig)) -> Result<Arc<TargetConfig>> {
        let mut next = (**self.current.read()).clone();
        edit(&mut next);
        next.normalize();
        self.persist(&next)?;
        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);
        Ok(next)
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, config: &TargetConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, body)
            .with_context(|| format!("writing agent config {}", self.path.display()))
    }
}
