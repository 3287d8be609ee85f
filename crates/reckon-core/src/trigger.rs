//! Reactive triggers and dispatch
//!
//! A [`Trigger`] is the reactive half of a formula variable: it is subscribed
//! to the storage cells the variable reads, and decides whether a change
//! notification should run the variable's recomputation now or be held back
//! while the trigger is paused. [`Dispatch`] decides on which thread that
//! recomputation runs.

use std::sync::{Mutex, Weak};
use std::thread;

use crate::cell::ThingCell;
use crate::sync::lock;

/// Receiver of storage-cell change notifications
pub trait CellListener: Send + Sync {
    /// Called after a subscribed cell has been written
    fn cell_changed(&self);
}

/// How triggered recomputation is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Run on the thread that changed the cell
    #[default]
    Immediate,
    /// Run on a fresh worker thread per change
    Spawn,
}

impl Dispatch {
    /// Run a job according to this dispatch mode.
    ///
    /// Returns false if the job could not be started.
    pub fn run<F>(self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Dispatch::Immediate => {
                job();
                true
            }
            Dispatch::Spawn => match thread::Builder::new()
                .name("reckon-recompute".into())
                .spawn(job)
            {
                Ok(_) => true,
                Err(e) => {
                    log::error!("failed to spawn recompute worker: {e}");
                    false
                }
            },
        }
    }
}

#[derive(Debug)]
struct TriggerState {
    enabled: bool,
    pending: bool,
}

/// Pausable reactive trigger
#[derive(Debug)]
pub struct Trigger {
    state: Mutex<TriggerState>,
}

impl Trigger {
    /// Create an enabled trigger with nothing pending
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TriggerState {
                enabled: true,
                pending: false,
            }),
        }
    }

    /// Stop running on notifications; they are remembered until [`Trigger::resume`]
    pub fn pause(&self) {
        lock(&self.state).enabled = false;
    }

    /// Re-enable the trigger.
    ///
    /// Returns `true` if a notification arrived while paused, in which case
    /// the owner should recompute once.
    pub fn resume(&self) -> bool {
        let mut state = lock(&self.state);
        state.enabled = true;
        std::mem::take(&mut state.pending)
    }

    /// Check whether the trigger is currently enabled
    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    /// Consume a change notification.
    ///
    /// Returns `true` when the owner should recompute now.
    pub fn fire(&self) -> bool {
        let mut state = lock(&self.state);
        if state.enabled {
            true
        } else {
            state.pending = true;
            false
        }
    }

    /// Subscribe `listener` to `cell` on behalf of this trigger.
    ///
    /// A new subscription counts as a notification, so a freshly wired
    /// variable computes its first value. Returns the result of [`Trigger::fire`].
    pub fn subscribe(&self, cell: &ThingCell, listener: Weak<dyn CellListener>) -> bool {
        cell.subscribe(listener);
        self.fire()
    }

    /// Remove `listener` from `cell`
    pub fn unsubscribe(&self, cell: &ThingCell, listener: &Weak<dyn CellListener>) {
        cell.unsubscribe(listener);
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Self::new()
    }
}
