//! Tokio-backed host timers
//!
//! Each registration is a spawned task that sends its [`TimerId`] back over a
//! channel when it fires. The driver loop receives the id and routes it to
//! the component that owns it.

use encore_playback::{Scheduler, TimerId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

/// Stand-in for one display refresh
const FRAME: Duration = Duration::from_millis(16);

#[derive(Default)]
struct Registry {
    next_id: u64,
    tasks: HashMap<u64, JoinHandle<()>>,
}

/// [`Scheduler`] on the current tokio runtime
///
/// Clones share the same registry, so any clone can cancel a timer another
/// clone registered.
#[derive(Clone)]
pub struct TokioScheduler {
    fired: UnboundedSender<TimerId>,
    registry: Rc<RefCell<Registry>>,
}

impl TokioScheduler {
    pub fn new(fired: UnboundedSender<TimerId>) -> Self {
        Self {
            fired,
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    /// Live registrations
    pub fn active_count(&self) -> usize {
        self.registry
            .borrow()
            .tasks
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }

    fn register(&mut self, delay: Duration, period: Option<Duration>) -> TimerId {
        let mut registry = self.registry.borrow_mut();
        registry.tasks.retain(|_, task| !task.is_finished());

        registry.next_id += 1;
        let id = TimerId::new(registry.next_id);
        let fired = self.fired.clone();

        let task = match period {
            None => tokio::spawn(async move {
                sleep(delay).await;
                let _ = fired.send(id);
            }),
            Some(period) => tokio::spawn(async move {
                let mut ticks = interval_at(Instant::now() + period, period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticks.tick().await;
                    if fired.send(id).is_err() {
                        break;
                    }
                }
            }),
        };

        registry.tasks.insert(id.value(), task);
        id
    }
}

impl Scheduler for TokioScheduler {
    fn request_frame(&mut self) -> TimerId {
        self.register(FRAME, None)
    }

    fn set_interval(&mut self, period: Duration) -> TimerId {
        self.register(period, Some(period))
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.register(delay, None)
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.registry.borrow_mut().tasks.remove(&id.value()) {
            task.abort();
        }
    }
}
