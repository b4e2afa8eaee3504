//! Host timer abstraction
//!
//! The synchronizer, the visualization feed and the controls overlay all need
//! timers from the host event loop (`setInterval`, `setTimeout`,
//! `requestAnimationFrame` in the browser; tokio timers natively). They never
//! block: the host fires a timer by handing its [`TimerId`] back to the
//! component that registered it, and ids that are no longer registered are
//! ignored.

use std::time::Duration;

/// Identifier of one host timer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Timer facilities of the host event loop
pub trait Scheduler {
    /// Fire once before the next repaint
    fn request_frame(&mut self) -> TimerId;

    /// Fire every `period` until cancelled
    fn set_interval(&mut self, period: Duration) -> TimerId;

    /// Fire once after `delay`
    fn set_timeout(&mut self, delay: Duration) -> TimerId;

    /// Cancel a registration; unknown or already-fired ids are ignored
    fn cancel(&mut self, id: TimerId);
}

/// Holds at most one live registration
///
/// Arming a slot cancels whatever it held before, so a component can never
/// leak a second timer of the same kind.
#[derive(Debug, Default)]
pub struct TimerSlot(Option<TimerId>);

impl TimerSlot {
    pub fn new() -> Self {
        Self(None)
    }

    /// Store `id`, cancelling the previous registration
    pub fn arm<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, id: TimerId) {
        if let Some(previous) = self.0.replace(id) {
            scheduler.cancel(previous);
        }
    }

    /// Cancel the live registration, if any
    pub fn cancel<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        if let Some(id) = self.0.take() {
            scheduler.cancel(id);
        }
    }

    /// Whether `id` is the live registration
    pub fn holds(&self, id: TimerId) -> bool {
        self.0 == Some(id)
    }

    /// Consume a one-shot registration that just fired
    ///
    /// Returns false (and keeps the slot) when `id` is stale.
    pub fn fired(&mut self, id: TimerId) -> bool {
        if self.holds(id) {
            self.0 = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeScheduler;

    #[test]
    fn arming_cancels_previous_registration() {
        let mut scheduler = FakeScheduler::new();
        let mut slot = TimerSlot::new();

        let first = scheduler.set_timeout(Duration::from_secs(3));
        slot.arm(&mut scheduler, first);
        let second = scheduler.set_timeout(Duration::from_secs(3));
        slot.arm(&mut scheduler, second);

        assert!(scheduler.was_cancelled(first));
        assert!(slot.holds(second));
        assert_eq!(scheduler.active_count(), 1);
    }

    #[test]
    fn stale_fire_is_ignored() {
        let mut scheduler = FakeScheduler::new();
        let mut slot = TimerSlot::new();

        let id = scheduler.request_frame();
        slot.arm(&mut scheduler, id);

        assert!(!slot.fired(TimerId::new(999)));
        assert!(slot.is_armed());
        assert!(slot.fired(id));
        assert!(!slot.is_armed());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut scheduler = FakeScheduler::new();
        let mut slot = TimerSlot::new();

        let id = scheduler.set_interval(Duration::from_secs(1));
        slot.arm(&mut scheduler, id);
        slot.cancel(&mut scheduler);
        slot.cancel(&mut scheduler);

        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(scheduler.cancel_count(), 1);
    }
}
