//! Formula manager
//!
//! The manager owns the name table and the dependency graph. Edges are stored
//! on both endpoints as case-folded names and are only changed while the
//! rewiring lock is held, so two concurrent reassignments cannot race each
//! other's cycle checks. Recomputation never takes that lock.
//!
//! # Example
//!
//! ```rust
//! use reckon::prelude::*;
//!
//! let manager = FormulaManager::standard()?;
//! manager.set_thing("a", 2.0)?;
//! manager.set_thing("b", 3.0)?;
//! manager.assign_formula("total", "a + b")?;
//! assert_eq!(manager.get_thing("total")?, Some(Thing::Number(5.0)));
//!
//! // Dependents follow their inputs.
//! manager.set_thing("a", 10.0)?;
//! assert_eq!(manager.get_thing("total")?, Some(Thing::Number(13.0)));
//! # Ok::<(), reckon::FormulaError>(())
//! ```

use std::sync::{Arc, Mutex, RwLock, Weak};

use ahash::AHashMap;
use reckon_core::sync::{lock, read, write};
use reckon_core::{Dispatch, Thing, ThingCell};
use reckon_formula::dependency::creates_cycle;
use reckon_formula::{
    compile, FormulaError, FormulaResult, Program, Registry, RegistrySpec, Resolver,
};

use crate::variable::{FormulaVar, TextLink, VarState};

/// Manager configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerOptions {
    /// How triggered recomputations run
    pub dispatch: Dispatch,
}

impl ManagerOptions {
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Owner of a graph of formula variables. Clones share the same graph.
#[derive(Clone)]
pub struct FormulaManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    registry: Arc<Registry>,
    options: ManagerOptions,
    vars: RwLock<AHashMap<String, Arc<FormulaVar>>>,
    rewiring: Mutex<()>,
    this: Weak<ManagerInner>,
}

impl FormulaManager {
    /// Create a manager with its own registry
    pub fn new(
        spec: &RegistrySpec,
        resolver: &dyn Resolver,
        options: ManagerOptions,
    ) -> FormulaResult<Self> {
        let registry = Registry::new(spec, resolver)?;
        Ok(Self::with_registry(Arc::new(registry), options))
    }

    /// Create a manager sharing an existing registry
    pub fn with_registry(registry: Arc<Registry>, options: ManagerOptions) -> Self {
        let inner = Arc::new_cyclic(|this| ManagerInner {
            registry,
            options,
            vars: RwLock::new(AHashMap::new()),
            rewiring: Mutex::new(()),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Manager over the built-in operators and functions
    pub fn standard() -> FormulaResult<Self> {
        Ok(Self::with_registry(
            Registry::standard()?,
            ManagerOptions::default(),
        ))
    }

    /// Built-in operators and functions with custom options
    pub fn standard_with(options: ManagerOptions) -> FormulaResult<Self> {
        Ok(Self::with_registry(Registry::standard()?, options))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn options(&self) -> ManagerOptions {
        self.inner.options
    }

    /// Create a variable, optionally bound to an existing storage cell
    pub fn create_var(
        &self,
        name: &str,
        cell: Option<ThingCell>,
    ) -> FormulaResult<Arc<FormulaVar>> {
        self.inner.check_name(name)?;
        let mut vars = write(&self.inner.vars);
        let key = name.to_uppercase();
        if vars.contains_key(&key) {
            return Err(FormulaError::VariableExists(name.to_string()));
        }
        let var = self.inner.new_var(name, cell.unwrap_or_default());
        vars.insert(key, Arc::clone(&var));
        Ok(var)
    }

    /// Look up a variable
    pub fn var(&self, name: &str) -> Option<Arc<FormulaVar>> {
        self.inner.get(name)
    }

    /// Compile `formula` and make it the definition of `name`.
    ///
    /// `name` and every variable the formula reads are created on demand. A
    /// formula that fails to compile, or that would make a variable depend on
    /// itself, leaves the previous definition in place and is recorded in the
    /// variable's error log.
    pub fn assign_formula(&self, name: &str, formula: &str) -> FormulaResult<()> {
        self.inner.assign_formula(name, formula)
    }

    /// Replace any formula with a plain value
    pub fn set_thing(&self, name: &str, thing: impl Into<Thing>) -> FormulaResult<()> {
        let var = {
            let _rewiring = lock(&self.inner.rewiring);
            let var = self.inner.var_or_create(name)?;
            let mut state = lock(&var.state);
            self.inner.unwire(&var, &mut state);
            state.formula = None;
            state.program = None;
            drop(state);
            var
        };
        var.cell().set(thing);
        Ok(())
    }

    /// Rebind the storage cell of `name`.
    ///
    /// Readers of `name` move their subscriptions to the new cell and are
    /// recomputed.
    pub fn set_reference(&self, name: &str, cell: ThingCell) -> FormulaResult<()> {
        let mut poke = Vec::new();
        let var = {
            let _rewiring = lock(&self.inner.rewiring);
            let var = self.inner.var_or_create(name)?;
            let old = var.replace_cell(cell.clone());
            if old.same(&cell) {
                return Ok(());
            }
            let dependents = lock(&var.state).dependents.clone();
            for dependent in dependents.iter().filter_map(|key| self.inner.get(key)) {
                let listener = dependent.listener();
                dependent.trigger.unsubscribe(&old, &listener);
                if dependent.trigger.subscribe(&cell, listener) {
                    poke.push(dependent);
                }
            }
            log::debug!(
                "{} rebound to a new cell, {} readers moved",
                var.name(),
                dependents.len()
            );
            var
        };
        if var.program().is_some() {
            var.schedule();
        }
        for dependent in poke {
            dependent.schedule();
        }
        Ok(())
    }

    /// Keep the formula of `name` equal to the text in `text_cell`.
    ///
    /// Replaces any previous link. The current text is applied immediately.
    pub fn set_text_ref(&self, name: &str, text_cell: ThingCell) -> FormulaResult<()> {
        let var = self.inner.var_or_create(name)?;
        let link = TextLink::attach(text_cell, &var, self.inner.this.clone());
        var.set_text_link(Some(Arc::clone(&link)));
        link.apply();
        Ok(())
    }

    /// Detach the text link of `name`, if any
    pub fn clear_text_ref(&self, name: &str) -> FormulaResult<()> {
        self.inner.require(name)?.set_text_link(None);
        Ok(())
    }

    pub fn get_thing(&self, name: &str) -> FormulaResult<Option<Thing>> {
        Ok(self.inner.require(name)?.value())
    }

    pub fn get_reference(&self, name: &str) -> FormulaResult<ThingCell> {
        Ok(self.inner.require(name)?.cell())
    }

    pub fn get_formula(&self, name: &str) -> FormulaResult<Option<String>> {
        Ok(self.inner.require(name)?.formula())
    }

    /// Compiled postfix program of `name`, space separated
    pub fn get_program(&self, name: &str) -> FormulaResult<Option<String>> {
        Ok(self
            .inner
            .require(name)?
            .program()
            .map(|program| program.to_string()))
    }

    /// Names `name` reads, sorted
    pub fn get_dependencies(&self, name: &str) -> FormulaResult<Vec<String>> {
        let var = self.inner.require(name)?;
        let keys = lock(&var.state).dependencies.clone();
        Ok(self.inner.display_names(keys))
    }

    /// Names that read `name`, sorted
    pub fn get_dependents(&self, name: &str) -> FormulaResult<Vec<String>> {
        let var = self.inner.require(name)?;
        let keys = lock(&var.state).dependents.clone();
        Ok(self.inner.display_names(keys))
    }

    /// Take the error log of `name`; `None` when there is nothing to report
    pub fn get_errors(&self, name: &str) -> Option<Vec<String>> {
        let errors = self.inner.get(name)?.take_errors();
        (!errors.is_empty()).then_some(errors)
    }

    pub fn clear_errors(&self, name: &str) -> FormulaResult<()> {
        self.inner.require(name)?.clear_errors();
        Ok(())
    }

    /// Check whether no formula reads `name`
    pub fn can_be_removed(&self, name: &str) -> FormulaResult<bool> {
        let var = self.inner.require(name)?;
        let removable = lock(&var.state).dependents.is_empty();
        Ok(removable)
    }

    /// Remove a variable that no formula reads.
    ///
    /// Its own dependency edges and text link are removed with it.
    pub fn remove(&self, name: &str) -> FormulaResult<()> {
        let var = {
            let _rewiring = lock(&self.inner.rewiring);
            let var = self.inner.require(name)?;
            let mut state = lock(&var.state);
            if !state.dependents.is_empty() {
                let dependents = self.inner.display_names(state.dependents.clone());
                return Err(FormulaError::InUse {
                    name: var.name().to_string(),
                    dependents,
                });
            }
            self.inner.unwire(&var, &mut state);
            state.formula = None;
            state.program = None;
            drop(state);
            let mut vars = write(&self.inner.vars);
            if vars.get(var.key()).is_some_and(|entry| Arc::ptr_eq(entry, &var)) {
                vars.remove(var.key());
            }
            drop(vars);
            var
        };
        var.set_text_link(None);
        log::debug!("removed {}", var.name());
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.get(name).is_some()
    }

    /// All variable names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.inner.vars)
            .values()
            .map(|var| var.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Block until `name` has no scheduled or running recomputation
    pub fn wait_for_formula(&self, name: &str) -> FormulaResult<()> {
        self.inner.require(name)?.wait();
        Ok(())
    }

    /// Block until the whole graph has settled
    pub fn wait_for_all(&self) {
        loop {
            let vars: Vec<Arc<FormulaVar>> = read(&self.inner.vars).values().cloned().collect();
            let mut waited = false;
            for var in vars {
                waited |= var.wait_reporting();
            }
            if !waited {
                break;
            }
        }
    }

    /// Recompute `name` from its formula
    pub fn recompute(&self, name: &str) -> FormulaResult<()> {
        self.inner.require(name)?.schedule();
        Ok(())
    }
}

impl std::fmt::Debug for FormulaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormulaManager")
            .field("options", &self.inner.options)
            .field("variables", &self.names())
            .finish()
    }
}

impl ManagerInner {
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    fn new_var(&self, name: &str, cell: ThingCell) -> Arc<FormulaVar> {
        log::debug!("creating variable {}", name);
        FormulaVar::new(name, cell, self.options.dispatch, self.this.clone())
    }

    fn get(&self, name: &str) -> Option<Arc<FormulaVar>> {
        read(&self.vars).get(&name.to_uppercase()).cloned()
    }

    fn require(&self, name: &str) -> FormulaResult<Arc<FormulaVar>> {
        self.get(name)
            .ok_or_else(|| FormulaError::UnknownVariable(name.to_string()))
    }

    fn var_or_create(&self, name: &str) -> FormulaResult<Arc<FormulaVar>> {
        if let Some(var) = self.get(name) {
            return Ok(var);
        }
        self.check_name(name)?;
        let mut vars = write(&self.vars);
        let var = vars
            .entry(name.to_uppercase())
            .or_insert_with(|| self.new_var(name, ThingCell::new()));
        Ok(Arc::clone(var))
    }

    /// Reject names the compiler would not read back as a single reference
    fn check_name(&self, name: &str) -> FormulaResult<()> {
        let illegal = match name.chars().next() {
            None => true,
            Some(first) => {
                first.is_ascii_digit()
                    || first == '.'
                    || name.chars().any(|c| {
                        c.is_whitespace()
                            || matches!(c, '(' | ')' | ',' | '"')
                            || self.registry.is_operator_char(c)
                    })
            }
        };
        if illegal {
            Err(FormulaError::IllegalName(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Value of a variable during evaluation; unknown names are created empty
    pub(crate) fn lookup_value(&self, name: &str) -> Option<Thing> {
        match self.var_or_create(name) {
            Ok(var) => var.value(),
            Err(e) => {
                log::debug!("lookup of {} failed: {}", name, e);
                None
            }
        }
    }

    fn dependencies_of(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(var) => lock(&var.state).dependencies.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    fn display_names(&self, keys: impl IntoIterator<Item = String>) -> Vec<String> {
        let vars = read(&self.vars);
        let mut names: Vec<String> = keys
            .into_iter()
            .map(|key| match vars.get(&key) {
                Some(var) => var.name().to_string(),
                None => key,
            })
            .collect();
        names.sort();
        names
    }

    /// Add the edge `var -> dependency` on both ends and subscribe to its cell
    fn link(&self, var: &FormulaVar, state: &mut VarState, dependency: &FormulaVar) {
        state.dependencies.insert(dependency.key().to_string());
        lock(&dependency.state)
            .dependents
            .insert(var.key().to_string());
        var.trigger.subscribe(&dependency.cell(), var.listener());
    }

    fn unlink(&self, var: &FormulaVar, state: &mut VarState, dependency: &FormulaVar) {
        state.dependencies.remove(dependency.key());
        lock(&dependency.state).dependents.remove(var.key());
        var.trigger.unsubscribe(&dependency.cell(), &var.listener());
    }

    /// Remove every dependency edge of `var`, returning the removed keys
    fn unwire(&self, var: &FormulaVar, state: &mut VarState) -> Vec<String> {
        let keys: Vec<String> = state.dependencies.iter().cloned().collect();
        for key in &keys {
            match self.get(key) {
                Some(dependency) => self.unlink(var, state, &dependency),
                None => {
                    state.dependencies.remove(key);
                }
            }
        }
        keys
    }

    pub(crate) fn assign_formula(&self, name: &str, formula: &str) -> FormulaResult<()> {
        let var = self.var_or_create(name)?;

        let program = match compile(formula, &self.registry) {
            Ok(program) => program,
            Err(e) => {
                var.log_error(e.to_string());
                return Err(e);
            }
        };
        let references = program.as_ref().map(Program::references).unwrap_or_default();
        for reference in &references {
            if let Err(e) = self.check_name(reference) {
                var.log_error(e.to_string());
                return Err(e);
            }
        }

        let rewiring = lock(&self.rewiring);
        // A concurrent remove may have replaced the entry since it was resolved.
        let var = self.var_or_create(name)?;
        let mut state = lock(&var.state);
        var.trigger.pause();

        let previous_formula = state.formula.take();
        let previous_program = state.program.take();
        let previous_dependencies = self.unwire(&var, &mut state);

        if let Err(e) = self.wire(&var, &mut state, &references) {
            self.unwire(&var, &mut state);
            for key in &previous_dependencies {
                if let Some(dependency) = self.get(key) {
                    self.link(&var, &mut state, &dependency);
                }
            }
            state.formula = previous_formula;
            state.program = previous_program;
            let has_program = state.program.is_some();
            drop(state);
            let pending = var.trigger.resume();
            drop(rewiring);

            var.log_error(match &e {
                FormulaError::InfiniteLoop(_) => "formula creates an infinite loop".to_string(),
                other => other.to_string(),
            });
            if pending && has_program {
                var.schedule();
            }
            return Err(e);
        }

        let has_program = program.is_some();
        state.formula = has_program.then(|| formula.to_string());
        state.program = program.map(Arc::new);
        drop(state);
        let pending = var.trigger.resume();
        drop(rewiring);

        log::debug!(
            "{} = {} ({} dependencies)",
            var.name(),
            formula.trim(),
            references.len()
        );
        if has_program && (pending || references.is_empty()) {
            var.schedule();
        }
        Ok(())
    }

    /// Add an edge for every reference; stops at the first one closing a cycle
    fn wire(
        &self,
        var: &FormulaVar,
        state: &mut VarState,
        references: &[String],
    ) -> FormulaResult<()> {
        for reference in references {
            let dependency = self.var_or_create(reference)?;
            if creates_cycle(var.key(), dependency.key(), |key| self.dependencies_of(key)) {
                log::warn!(
                    "rejecting formula for {}: {} already depends on it",
                    var.name(),
                    dependency.name()
                );
                return Err(FormulaError::InfiniteLoop(var.name().to_string()));
            }
            self.link(var, state, &dependency);
        }
        Ok(())
    }
}
