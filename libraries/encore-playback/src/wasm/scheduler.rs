//! [`Scheduler`] over `window` timers and animation frames

use crate::scheduler::{Scheduler, TimerId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Receives the id of every timer that fires
pub type Dispatch = Rc<dyn Fn(TimerId)>;

#[derive(Clone, Copy)]
enum Kind {
    Frame,
    Interval,
    Timeout,
}

struct Registration {
    kind: Kind,
    handle: i32,
    callback: Closure<dyn FnMut()>,
}

#[derive(Default)]
struct SchedulerState {
    next_id: u64,
    live: HashMap<u64, Registration>,
    /// Fired or cancelled callbacks, dropped when the next timer fires so
    /// that none is freed while running
    spent: Vec<Closure<dyn FnMut()>>,
}

/// Browser timer facilities, cheap to clone
#[derive(Clone)]
pub struct WebScheduler {
    state: Rc<RefCell<SchedulerState>>,
    dispatch: Dispatch,
}

impl WebScheduler {
    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            state: Rc::new(RefCell::new(SchedulerState::default())),
            dispatch,
        }
    }

    fn register(&mut self, kind: Kind, delay: Duration) -> TimerId {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            TimerId::new(state.next_id)
        };

        let weak: Weak<RefCell<SchedulerState>> = Rc::downgrade(&self.state);
        let dispatch = Rc::clone(&self.dispatch);
        let callback = Closure::wrap(Box::new(move || {
            if let Some(state) = weak.upgrade() {
                let mut state = state.borrow_mut();
                // Nothing else is running, so earlier spent callbacks can go
                state.spent.clear();
                let one_shot = matches!(
                    state.live.get(&id.value()).map(|r| r.kind),
                    Some(Kind::Frame | Kind::Timeout)
                );
                if one_shot {
                    if let Some(registration) = state.live.remove(&id.value()) {
                        state.spent.push(registration.callback);
                    }
                }
            }
            dispatch(id);
        }) as Box<dyn FnMut()>);

        let Some(window) = web_sys::window() else {
            warn!("no window, timer not registered");
            return id;
        };
        let function: &js_sys::Function = callback.as_ref().unchecked_ref();
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let handle = match kind {
            Kind::Frame => window.request_animation_frame(function),
            Kind::Interval => {
                window.set_interval_with_callback_and_timeout_and_arguments_0(function, millis)
            }
            Kind::Timeout => {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(function, millis)
            }
        };

        match handle {
            Ok(handle) => {
                self.state.borrow_mut().live.insert(
                    id.value(),
                    Registration {
                        kind,
                        handle,
                        callback,
                    },
                );
            }
            Err(err) => warn!(?err, "timer registration failed"),
        }
        id
    }
}

impl Scheduler for WebScheduler {
    fn request_frame(&mut self) -> TimerId {
        self.register(Kind::Frame, Duration::ZERO)
    }

    fn set_interval(&mut self, period: Duration) -> TimerId {
        self.register(Kind::Interval, period)
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.register(Kind::Timeout, delay)
    }

    fn cancel(&mut self, id: TimerId) {
        let Some(registration) = self.state.borrow_mut().live.remove(&id.value()) else {
            return;
        };
        if let Some(window) = web_sys::window() {
            match registration.kind {
                Kind::Frame => {
                    let _ = window.cancel_animation_frame(registration.handle);
                }
                Kind::Interval => window.clear_interval_with_handle(registration.handle),
                Kind::Timeout => window.clear_timeout_with_handle(registration.handle),
            }
        }

        // May be cancelled from inside its own callback
        self.state.borrow_mut().spent.push(registration.callback);
    }
}
