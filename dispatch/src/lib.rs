#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Serialized dispatch of simulated interactions.
//!
//! At most one upgrade sequence is in flight at any time; the busy flags are
//! the reentrancy guard the decision engine consults before dispatching, and
//! this crate is the only writer of the upgrade flag.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::time::sleep;
use wrldbot_surface::{ActionSink, ActionTarget};

/// Settle delay applied after a single upgrade interaction.
pub const UPGRADE_SETTLE: Duration = Duration::from_millis(1500);

/// Spacing between the firings of a batched upgrade sequence.
pub const BATCH_STEP: Duration = Duration::from_millis(1500);

/// The two independent in-flight guards shared by the engine/dispatcher pair.
#[derive(Debug, Default)]
pub struct BusyFlags {
    upgrade: AtomicBool,
    transfer: AtomicBool,
}

impl BusyFlags {
    /// True while an upgrade interaction (or batch) is settling.
    #[must_use]
    pub fn upgrade_in_flight(&self) -> bool {
        self.upgrade.load(Ordering::SeqCst)
    }

    /// True while a transfer is inside its quiescent period.
    #[must_use]
    pub fn transfer_in_flight(&self) -> bool {
        self.transfer.load(Ordering::SeqCst)
    }

    /// Raises the transfer flag and schedules its clear after `quiescent`.
    /// The period is shorter than the tick period so a completed transfer
    /// does not suppress the tick after next.
    pub fn hold_transfer(self: &Arc<Self>, quiescent: Duration) {
        self.transfer.store(true, Ordering::SeqCst);
        let flags = Arc::clone(self);
        tokio::spawn(async move {
            sleep(quiescent).await;
            flags.transfer.store(false, Ordering::SeqCst);
        });
    }

    /// Drops the transfer flag immediately (failed trigger).
    pub fn clear_transfer(&self) {
        self.transfer.store(false, Ordering::SeqCst);
    }

    fn begin_upgrade(&self) {
        self.upgrade.store(true, Ordering::SeqCst);
    }

    fn end_upgrade(&self) {
        self.upgrade.store(false, Ordering::SeqCst);
    }
}

/// Fires simulated interactions against the write surface, one sequence at
/// a time. All delays run on tokio timers, so tests drive them with a
/// paused clock.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn ActionSink>,
    flags: Arc<BusyFlags>,
    settle: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settle", &self.settle)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over the given sink with the default settle
    /// delay.
    #[must_use]
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self {
            sink,
            flags: Arc::new(BusyFlags::default()),
            settle: UPGRADE_SETTLE,
        }
    }

    /// Overrides the settle delay.
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// The busy flags consulted by the engine's reentrancy guard.
    #[must_use]
    pub fn flags(&self) -> Arc<BusyFlags> {
        Arc::clone(&self.flags)
    }

    /// Triggers one interaction. The upgrade flag is raised before the
    /// trigger and cleared after the settle delay regardless of outcome;
    /// an unresolved target clears it immediately.
    pub fn dispatch_single(&self, target: ActionTarget) {
        self.flags.begin_upgrade();
        let sink = Arc::clone(&self.sink);
        let flags = Arc::clone(&self.flags);
        let settle = self.settle;
        tokio::spawn(async move {
            match sink.trigger(target).await {
                Ok(()) => {
                    tracing::debug!(action = %target.label(), "interaction fired");
                    sleep(settle).await;
                }
                Err(err) => {
                    tracing::error!(action = %target.label(), error = %err, "dispatch aborted");
                }
            }
            flags.end_upgrade();
        });
    }

    /// Fires `count` sequential interactions separated by `delay`,
    /// re-resolving the target before every firing. An unresolved target
    /// aborts the remaining sequence and clears the flag immediately.
    pub fn dispatch_repeated(&self, target: ActionTarget, count: u32, delay: Duration) {
        if count == 0 {
            return;
        }
        self.flags.begin_upgrade();
        let sink = Arc::clone(&self.sink);
        let flags = Arc::clone(&self.flags);
        tokio::spawn(async move {
            let mut fired = 0_u32;
            loop {
                if fired == count {
                    tracing::debug!(action = %target.label(), fired, "batch complete");
                    break;
                }
                if let Err(err) = sink.trigger(target).await {
                    tracing::error!(action = %target.label(), error = %err, fired, "batch aborted");
                    break;
                }
                fired += 1;
                sleep(delay).await;
            }
            flags.end_upgrade();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use wrldbot_surface::SurfaceError;

    struct RecordingSink {
        calls: Mutex<Vec<ActionTarget>>,
        fail_from: Option<usize>,
    }

    impl RecordingSink {
        fn new(fail_from: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_from,
            })
        }

        fn count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ActionSink for RecordingSink {
        async fn trigger(&self, target: ActionTarget) -> Result<(), SurfaceError> {
            let mut calls = self.calls.lock();
            if self.fail_from.is_some_and(|from| calls.len() >= from) {
                return Err(SurfaceError::TargetUnresolved(target.label()));
            }
            calls.push(target);
            Ok(())
        }
    }

    use wrldbot_surface::Component;

    #[tokio::test(start_paused = true)]
    async fn single_holds_flag_for_settle_delay() {
        let sink = RecordingSink::new(None);
        let dispatcher = Dispatcher::new(sink.clone());
        let flags = dispatcher.flags();
        dispatcher.dispatch_single(ActionTarget::Upgrade(Component::Miner));
        assert!(flags.upgrade_in_flight());
        sleep(UPGRADE_SETTLE + Duration::from_millis(10)).await;
        assert!(!flags.upgrade_in_flight());
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_single_clears_immediately() {
        let sink = RecordingSink::new(Some(0));
        let dispatcher = Dispatcher::new(sink.clone());
        let flags = dispatcher.flags();
        dispatcher.dispatch_single(ActionTarget::Upgrade(Component::Vault));
        sleep(Duration::from_millis(1)).await;
        assert!(!flags.upgrade_in_flight());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_fires_exactly_count_times() {
        let sink = RecordingSink::new(None);
        let dispatcher = Dispatcher::new(sink.clone());
        let flags = dispatcher.flags();
        dispatcher.dispatch_repeated(ActionTarget::Upgrade(Component::Stealer), 3, BATCH_STEP);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.count(), 1);
        assert!(flags.upgrade_in_flight());
        sleep(BATCH_STEP * 3).await;
        assert_eq!(sink.count(), 3);
        assert!(!flags.upgrade_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_aborts_when_target_disappears() {
        let sink = RecordingSink::new(Some(2));
        let dispatcher = Dispatcher::new(sink.clone());
        let flags = dispatcher.flags();
        dispatcher.dispatch_repeated(ActionTarget::Upgrade(Component::Scanner), 5, BATCH_STEP);
        sleep(BATCH_STEP * 6).await;
        assert_eq!(sink.count(), 2);
        assert!(!flags.upgrade_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_count_dispatches_nothing() {
        let sink = RecordingSink::new(None);
        let dispatcher = Dispatcher::new(sink.clone());
        dispatcher.dispatch_repeated(ActionTarget::Upgrade(Component::Miner), 0, BATCH_STEP);
        sleep(BATCH_STEP).await;
        assert_eq!(sink.count(), 0);
        assert!(!dispatcher.flags().upgrade_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_hold_expires() {
        let flags = Arc::new(BusyFlags::default());
        flags.hold_transfer(Duration::from_millis(250));
        assert!(flags.transfer_in_flight());
        sleep(Duration::from_millis(260)).await;
        assert!(!flags.transfer_in_flight());
    }
}
