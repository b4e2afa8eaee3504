//! Auto-hiding transport controls for the fullscreen video view
//!
//! Any pointer activity shows the controls and restarts a hide timeout. When
//! the timeout fires the controls are hidden, but only while playing; paused
//! playback keeps them on screen.

use crate::config::ControlsSettings;
use crate::scheduler::{Scheduler, TimerId, TimerSlot};

pub struct ControlsVisibility<S: Scheduler> {
    scheduler: S,
    settings: ControlsSettings,
    hide_timeout: TimerSlot,
    visible: bool,
}

impl<S: Scheduler> ControlsVisibility<S> {
    /// Controls start visible with no timeout pending
    pub fn new(scheduler: S, settings: ControlsSettings) -> Self {
        Self {
            scheduler,
            settings,
            hide_timeout: TimerSlot::new(),
            visible: true,
        }
    }

    /// Pointer moved or tapped: show and restart the hide countdown
    pub fn activity(&mut self) {
        self.visible = true;
        let id = self.scheduler.set_timeout(self.settings.auto_hide_delay());
        self.hide_timeout.arm(&mut self.scheduler, id);
    }

    /// Hide timeout callback; returns whether visibility changed
    pub fn on_timeout(&mut self, id: TimerId, is_playing: bool) -> bool {
        if !self.hide_timeout.fired(id) {
            return false;
        }
        if is_playing && self.visible {
            self.visible = false;
            return true;
        }
        false
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Cancel the pending timeout and show the controls
    pub fn reset(&mut self) {
        self.hide_timeout.cancel(&mut self.scheduler);
        self.visible = true;
    }
}

impl<S: Scheduler> Drop for ControlsVisibility<S> {
    fn drop(&mut self) {
        self.hide_timeout.cancel(&mut self.scheduler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeScheduler, TimerKind};
    use std::time::Duration;

    fn controls() -> (ControlsVisibility<FakeScheduler>, FakeScheduler) {
        let scheduler = FakeScheduler::new();
        let controls = ControlsVisibility::new(scheduler.clone(), ControlsSettings::default());
        (controls, scheduler)
    }

    #[test]
    fn hides_after_timeout_while_playing() {
        let (mut controls, scheduler) = controls();
        controls.activity();

        let timeout = scheduler.active_timeouts()[0];
        assert_eq!(
            scheduler.kind_of(timeout),
            Some(TimerKind::Timeout(Duration::from_millis(3000)))
        );
        scheduler.fire(timeout);
        assert!(controls.on_timeout(timeout, true));
        assert!(!controls.is_visible());
    }

    #[test]
    fn stays_visible_while_paused() {
        let (mut controls, scheduler) = controls();
        controls.activity();

        let timeout = scheduler.active_timeouts()[0];
        scheduler.fire(timeout);
        assert!(!controls.on_timeout(timeout, false));
        assert!(controls.is_visible());
    }

    #[test]
    fn activity_restarts_countdown() {
        let (mut controls, scheduler) = controls();
        controls.activity();
        let first = scheduler.active_timeouts()[0];
        controls.activity();

        assert!(scheduler.was_cancelled(first));
        assert_eq!(scheduler.active_count(), 1);
        assert!(!controls.on_timeout(first, true));
        assert!(controls.is_visible());
    }

    #[test]
    fn drop_cancels_pending_timeout() {
        let (mut controls, scheduler) = controls();
        controls.activity();
        drop(controls);
        assert_eq!(scheduler.active_count(), 0);
    }
}
