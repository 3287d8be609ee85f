//! Observable storage cells
//!
//! A [`ThingCell`] holds at most one [`Thing`] and notifies its subscribers
//! every time the value is written. Formula variables store their results in
//! one, and subscribe to the cells of the variables they read.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::Thing;
use crate::sync::{lock, read, write};
use crate::trigger::CellListener;

struct CellInner {
    value: RwLock<Option<Thing>>,
    listeners: Mutex<Vec<Weak<dyn CellListener>>>,
}

/// Shared, observable single-value container.
///
/// Clones share the same underlying slot; use [`ThingCell::same`] to compare
/// identity.
#[derive(Clone)]
pub struct ThingCell {
    inner: Arc<CellInner>,
}

impl ThingCell {
    /// Create an empty cell
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CellInner {
                value: RwLock::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a cell holding an initial value
    pub fn with_value(thing: impl Into<Thing>) -> Self {
        let cell = Self::new();
        *write(&cell.inner.value) = Some(thing.into());
        cell
    }

    /// Current value, if any
    pub fn get(&self) -> Option<Thing> {
        read(&self.inner.value).clone()
    }

    /// Check whether the cell holds a value
    pub fn has_value(&self) -> bool {
        read(&self.inner.value).is_some()
    }

    /// Store a value and notify subscribers
    pub fn set(&self, thing: impl Into<Thing>) {
        *write(&self.inner.value) = Some(thing.into());
        self.notify();
    }

    /// Empty the cell and notify subscribers
    pub fn clear(&self) {
        *write(&self.inner.value) = None;
        self.notify();
    }

    /// Register a listener. Listeners are held weakly.
    pub fn subscribe(&self, listener: Weak<dyn CellListener>) {
        let mut listeners = lock(&self.inner.listeners);
        if !listeners.iter().any(|l| l.ptr_eq(&listener)) {
            listeners.push(listener);
        }
    }

    /// Remove a previously registered listener
    pub fn unsubscribe(&self, listener: &Weak<dyn CellListener>) {
        lock(&self.inner.listeners).retain(|l| !l.ptr_eq(listener));
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners)
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }

    /// Check whether two handles refer to the same cell
    pub fn same(&self, other: &ThingCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        // Listeners run without any cell lock held so they may read this cell
        // or write others.
        let live: Vec<Arc<dyn CellListener>> = {
            let mut listeners = lock(&self.inner.listeners);
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.cell_changed();
        }
    }
}

impl Default for ThingCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThingCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThingCell")
            .field("value", &*read(&self.inner.value))
            .finish()
    }
}
