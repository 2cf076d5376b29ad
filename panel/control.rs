use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;
use tokio::sync::watch;
use wrldbot_config::{ConfigStore, TargetConfig};
use wrldbot_surface::Component;

use crate::monitor::StealVictim;

/// Everything the panel displays on one refresh.
#[derive(Debug, Clone)]
pub struct PanelView {
    /// Current configuration snapshot.
    pub config: Arc<TargetConfig>,
    /// Live component levels published by the engine.
    pub levels: IndexMap<Component, u32>,
    /// Most recent steal victim, when one has been noticed.
    pub victim: Option<StealVictim>,
}

impl PanelView {
    /// Renders the view as the terminal panel. A minimized panel collapses
    /// to a single marker line, mirroring the collapsed widget.
    #[must_use]
    pub fn render(&self) -> String {
        if self.config.panel_minimized {
            return "[wrldbot] panel minimized\n".into();
        }
        let mut out = String::new();
        let _ = writeln!(
            out,
            "upgrade target control: {}",
            if self.config.control_mode_active {
                "active"
            } else {
                "inactive"
            }
        );
        for component in Component::ALL {
            let _ = writeln!(
                out,
                "  {:<8}  target {:>3}  level {:>3}",
                component.label(),
                self.config.target(component),
                self.levels.get(&component).copied().unwrap_or(0)
            );
        }
        let _ = writeln!(
            out,
            "transfer threshold ratio: {}",
            self.config.transfer_threshold_ratio
        );
        let _ = writeln!(
            out,
            "stealing mode: {}",
            if self.config.stealing_mode_active {
                "on"
            } else {
                "off"
            }
        );
        let _ = writeln!(
            out,
            "most recent victim: {}",
            self.victim
                .as_ref()
                .map_or("none", |victim| victim.actor.as_str())
        );
        out
    }
}

/// View/edit layer over the configuration store. Every edit persists
/// immediately and takes effect on the next engine tick; raw inputs are
/// coerced, never rejected with a crash.
#[derive(Debug)]
pub struct ControlPanel {
    store: Arc<ConfigStore>,
    levels: watch::Receiver<IndexMap<Component, u32>>,
    victim: watch::Receiver<Option<StealVictim>>,
}

impl ControlPanel {
    /// Wires the panel to the store and the engine/monitor channels.
    #[must_use]
    pub const fn new(
        store: Arc<ConfigStore>,
        levels: watch::Receiver<IndexMap<Component, u32>>,
        victim: watch::Receiver<Option<StealVictim>>,
    ) -> Self {
        Self {
            store,
            levels,
            victim,
        }
    }

    /// Snapshot of everything the panel shows right now.
    #[must_use]
    pub fn view(&self) -> PanelView {
        PanelView {
            config: self.store.current(),
            levels: self.levels.borrow().clone(),
            victim: self.victim.borrow().clone(),
        }
    }

    /// Sets a component's target level from raw input. Non-numeric input
    /// degenerates to 0 ("no target set") rather than failing.
    pub fn set_target(&self, component: Component, raw: &str) -> Result<Arc<TargetConfig>> {
        let target = raw.trim().parse::<u32>().unwrap_or(0);
        self.store.update(|config| {
            config.targets.insert(component, target);
        })
    }

    /// Sets the transfer threshold ratio from raw input. Input that is not
    /// a finite positive number leaves the stored ratio unchanged.
    pub fn set_ratio(&self, raw: &str) -> Result<Arc<TargetConfig>> {
        match raw.trim().parse::<f64>() {
            Ok(ratio) if ratio.is_finite() && ratio > 0.0 => self.store.update(|config| {
                config.transfer_threshold_ratio = ratio;
            }),
            _ => Ok(self.store.current()),
        }
    }

    /// Toggles the target-driven control loop.
    pub fn set_control_mode(&self, active: bool) -> Result<Arc<TargetConfig>> {
        self.store.update(|config| {
            config.control_mode_active = active;
        })
    }

    /// Toggles stealing mode.
    pub fn set_stealing_mode(&self, active: bool) -> Result<Arc<TargetConfig>> {
        self.store.update(|config| {
            config.stealing_mode_active = active;
        })
    }

    /// Collapses or restores the panel.
    pub fn set_minimized(&self, minimized: bool) -> Result<Arc<TargetConfig>> {
        self.store.update(|config| {
            config.panel_minimized = minimized;
        })
    }
}
