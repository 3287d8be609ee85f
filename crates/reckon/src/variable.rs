//! Formula variables
//!
//! A [`FormulaVar`] owns a storage cell, an optional compiled formula and its
//! side of the dependency edges. It listens to the storage cells of the
//! variables it reads; a change runs its recomputation through the manager's
//! [`Dispatch`].

use std::sync::{Arc, Condvar, Mutex, RwLock, Weak};

use ahash::AHashSet;
use reckon_core::sync::{lock, read, write};
use reckon_core::{CellListener, Dispatch, Thing, ThingCell, Trigger};
use reckon_formula::{evaluate, Program};

use crate::manager::ManagerInner;

/// Mutable formula state, guarded by one lock
#[derive(Debug, Default)]
pub(crate) struct VarState {
    pub(crate) formula: Option<String>,
    pub(crate) program: Option<Arc<Program>>,
    /// Keys of the variables this one reads
    pub(crate) dependencies: AHashSet<String>,
    /// Keys of the variables that read this one
    pub(crate) dependents: AHashSet<String>,
    /// Scheduled or running recomputations
    pub(crate) computing: usize,
    /// A worker is evaluating this variable
    running: bool,
    /// Inputs changed while the worker was evaluating
    rerun: bool,
}

/// A named reactive variable
pub struct FormulaVar {
    name: String,
    key: String,
    cell: RwLock<ThingCell>,
    pub(crate) trigger: Trigger,
    pub(crate) state: Mutex<VarState>,
    idle: Condvar,
    errors: Mutex<Vec<String>>,
    text_link: Mutex<Option<Arc<TextLink>>>,
    dispatch: Dispatch,
    this: Weak<FormulaVar>,
    manager: Weak<ManagerInner>,
}

impl FormulaVar {
    pub(crate) fn new(
        name: &str,
        cell: ThingCell,
        dispatch: Dispatch,
        manager: Weak<ManagerInner>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.to_string(),
            key: name.to_uppercase(),
            cell: RwLock::new(cell),
            trigger: Trigger::new(),
            state: Mutex::new(VarState::default()),
            idle: Condvar::new(),
            errors: Mutex::new(Vec::new()),
            text_link: Mutex::new(None),
            dispatch,
            this: this.clone(),
            manager,
        })
    }

    /// Name as first spelled
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-folded name used as the table key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current storage cell
    pub fn cell(&self) -> ThingCell {
        read(&self.cell).clone()
    }

    /// Current value
    pub fn value(&self) -> Option<Thing> {
        self.cell().get()
    }

    /// Formula text, if a formula is assigned
    pub fn formula(&self) -> Option<String> {
        lock(&self.state).formula.clone()
    }

    /// Compiled program, if a formula is assigned
    pub fn program(&self) -> Option<Arc<Program>> {
        lock(&self.state).program.clone()
    }

    /// Check whether a recomputation is scheduled or running
    pub fn is_computing(&self) -> bool {
        lock(&self.state).computing > 0
    }

    /// Block until no recomputation is scheduled or running
    pub fn wait(&self) {
        let mut state = lock(&self.state);
        while state.computing > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Block until idle; returns whether any wait was needed
    pub(crate) fn wait_reporting(&self) -> bool {
        let busy = self.is_computing();
        self.wait();
        busy
    }

    pub(crate) fn replace_cell(&self, cell: ThingCell) -> ThingCell {
        std::mem::replace(&mut *write(&self.cell), cell)
    }

    pub(crate) fn listener(&self) -> Weak<dyn CellListener> {
        self.this.clone()
    }

    pub(crate) fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: {}", self.name, message);
        lock(&self.errors).push(message);
    }

    /// Take the error log, leaving it empty
    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.errors))
    }

    pub(crate) fn clear_errors(&self) {
        lock(&self.errors).clear();
    }

    /// Schedule a recomputation through the dispatch.
    ///
    /// At most one worker evaluates a variable at a time. A request arriving
    /// while it runs makes that worker evaluate again once it is done.
    pub(crate) fn schedule(&self) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        {
            let mut state = lock(&self.state);
            state.computing += 1;
            if state.running {
                state.rerun = true;
                return;
            }
            state.running = true;
        }
        if !self.dispatch.run(move || this.run_scheduled()) {
            let mut state = lock(&self.state);
            state.running = false;
            state.rerun = false;
            state.computing = 0;
            self.idle.notify_all();
        }
    }

    fn run_scheduled(&self) {
        loop {
            self.recompute_now();
            let mut state = lock(&self.state);
            if std::mem::take(&mut state.rerun) {
                continue;
            }
            state.running = false;
            state.computing = 0;
            self.idle.notify_all();
            return;
        }
    }

    /// Evaluate the current program and store the result.
    ///
    /// A null result keeps the previous value.
    fn recompute_now(&self) {
        let Some(program) = self.program() else {
            return;
        };
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        log::trace!("recomputing {}", self.name);

        let mut errors = Vec::new();
        let mut scope = |name: &str| manager.lookup_value(name);
        let result = evaluate(&program, manager.registry(), &mut scope, &mut errors);
        if result.is_none() {
            errors.push("formula evaluated to no value".to_string());
        }
        for message in errors {
            self.log_error(message);
        }
        if let Some(value) = result {
            self.cell().set(value);
        }
    }

    /// Install a text link, replacing and detaching any previous one
    pub(crate) fn set_text_link(&self, link: Option<Arc<TextLink>>) {
        let previous = std::mem::replace(&mut *lock(&self.text_link), link);
        if let Some(previous) = previous {
            previous.detach();
        }
    }
}

impl CellListener for FormulaVar {
    fn cell_changed(&self) {
        if self.trigger.fire() {
            self.schedule();
        }
    }
}

impl std::fmt::Debug for FormulaVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaVar")
            .field("name", &self.name)
            .field("value", &self.value())
            .field("formula", &self.formula())
            .finish()
    }
}

/// Keeps a variable's formula equal to the text held by an external cell
pub(crate) struct TextLink {
    cell: ThingCell,
    this: Weak<TextLink>,
    var: Weak<FormulaVar>,
    manager: Weak<ManagerInner>,
}

impl TextLink {
    pub(crate) fn attach(
        cell: ThingCell,
        var: &Arc<FormulaVar>,
        manager: Weak<ManagerInner>,
    ) -> Arc<Self> {
        let link = Arc::new_cyclic(|this| Self {
            cell,
            this: this.clone(),
            var: Arc::downgrade(var),
            manager,
        });
        let listener: Weak<dyn CellListener> = link.this.clone();
        link.cell.subscribe(listener);
        link
    }

    fn detach(&self) {
        let listener: Weak<dyn CellListener> = self.this.clone();
        self.cell.unsubscribe(&listener);
    }

    /// Reassign the variable if the linked text differs from its formula
    pub(crate) fn apply(&self) {
        let (Some(var), Some(manager)) = (self.var.upgrade(), self.manager.upgrade()) else {
            return;
        };
        let text = match self.cell.get() {
            Some(Thing::Text(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        if var.formula().unwrap_or_default() == text {
            return;
        }
        // Failures are already in the variable's error log.
        if let Err(e) = manager.assign_formula(var.name(), &text) {
            log::debug!("linked formula for {} rejected: {}", var.name(), e);
        }
    }
}

impl CellListener for TextLink {
    fn cell_changed(&self) {
        self.apply();
    }
}
