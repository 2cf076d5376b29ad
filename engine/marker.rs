use std::time::Duration;

use tokio::time::Instant;

/// Tracks the two most recent funds/vault readings and how long they have
/// been frozen. The marker resets whenever either value changes; a stale
/// span longer than the threshold is the cue for a cold restart.
#[derive(Debug, Clone)]
pub struct ActivityMarker {
    last_funds: Option<f64>,
    last_vault: Option<f64>,
    changed_at: Instant,
}

impl Default for ActivityMarker {
    fn default() -> Self {
        Self {
            last_funds: None,
            last_vault: None,
            changed_at: Instant::now(),
        }
    }
}

impl ActivityMarker {
    /// Creates a marker with no prior reading.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds this tick's readings. Returns true when both values match the
    /// previous reading and have done so for longer than `threshold`; a
    /// changed value (or the very first reading) resets the timer instead.
    pub fn observe(&mut self, funds: f64, vault_balance: f64, threshold: Duration) -> bool {
        let unchanged = self
            .last_funds
            .is_some_and(|last| last.to_bits() == funds.to_bits())
            && self
                .last_vault
                .is_some_and(|last| last.to_bits() == vault_balance.to_bits());
        if unchanged {
            self.changed_at.elapsed() > threshold
        } else {
            self.last_funds = Some(funds);
            self.last_vault = Some(vault_balance);
            self.changed_at = Instant::now();
            false
        }
    }
}
