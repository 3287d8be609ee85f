//! Operator and function implementations
//!
//! Registries never hold callables directly in their construction tables:
//! they hold identifiers, and a [`Resolver`] maps each identifier to an
//! [`Implementation`] once, when the registry is built. [`StandardLibrary`]
//! is the built-in resolver.

pub mod list;
pub mod logical;
pub mod math;
pub mod operators;
pub mod text;

use ahash::AHashMap;
use reckon_core::Thing;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Why a candidate implementation declined to produce a value.
///
/// The evaluator treats every variant the same way: the candidate failed and
/// the next one is tried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The implementation refused to run
    #[error("no permission")]
    NoPermission,

    /// Operands have the wrong count or type for this implementation
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// The implementation failed while running
    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<reckon_core::Error> for CallError {
    fn from(e: reckon_core::Error) -> Self {
        CallError::BadArguments(e.to_string())
    }
}

impl CallError {
    pub fn bad_arguments<S: Into<String>>(msg: S) -> Self {
        CallError::BadArguments(msg.into())
    }
}

/// Outcome of a single implementation call; `Ok(None)` counts as a failure
pub type CallResult = Result<Option<Thing>, CallError>;

/// Callable operator or function implementation
pub type Implementation = Arc<dyn Fn(&[Thing]) -> CallResult + Send + Sync>;

/// Formula text rewrite applied before compilation
pub type PreParse = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Resolved implementation together with the identifier it came from
#[derive(Clone)]
pub struct Candidate {
    id: String,
    call: Implementation,
}

impl Candidate {
    pub fn new<S: Into<String>>(id: S, call: Implementation) -> Self {
        Self {
            id: id.into(),
            call,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn call(&self, args: &[Thing]) -> CallResult {
        (self.call)(args)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Candidate").field(&self.id).finish()
    }
}

/// Maps implementation identifiers to callables
pub trait Resolver {
    /// Resolve an operator or function implementation
    fn implementation(&self, id: &str) -> Option<Implementation>;

    /// Resolve a pre-parse transform
    fn pre_parse(&self, _id: &str) -> Option<PreParse> {
        None
    }
}

/// Built-in implementations, addressable by identifier
#[derive(Clone, Default)]
pub struct StandardLibrary {
    implementations: AHashMap<String, Implementation>,
    pre_parses: AHashMap<String, PreParse>,
}

static STANDARD_LIBRARY: OnceLock<StandardLibrary> = OnceLock::new();

impl StandardLibrary {
    /// Create a library with all built-in implementations
    pub fn new() -> Self {
        let mut lib = Self::default();

        lib.register_operators();
        lib.register_math_functions();
        lib.register_logical_functions();
        lib.register_text_functions();
        lib.register_list_functions();

        lib
    }

    /// Shared built-in library (lazily initialized)
    pub fn shared() -> &'static StandardLibrary {
        STANDARD_LIBRARY.get_or_init(StandardLibrary::new)
    }

    /// Add or replace an implementation
    pub fn with_implementation<S, F>(mut self, id: S, call: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[Thing]) -> CallResult + Send + Sync + 'static,
    {
        self.register(id, call);
        self
    }

    /// Add or replace a pre-parse transform
    pub fn with_pre_parse<S, F>(mut self, id: S, transform: F) -> Self
    where
        S: Into<String>,
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.pre_parses.insert(id.into(), Arc::new(transform));
        self
    }

    /// Check whether an identifier is known
    pub fn contains(&self, id: &str) -> bool {
        self.implementations.contains_key(id)
    }

    fn register<S, F>(&mut self, id: S, call: F)
    where
        S: Into<String>,
        F: Fn(&[Thing]) -> CallResult + Send + Sync + 'static,
    {
        self.implementations.insert(id.into(), Arc::new(call));
    }

    fn register_operators(&mut self) {
        self.register("add", operators::op_add);
        self.register("subtract", operators::op_subtract);
        self.register("multiply", operators::op_multiply);
        self.register("divide", operators::op_divide);
        self.register("modulo", operators::op_modulo);
        self.register("power", operators::op_power);
        self.register("equal", operators::op_equal);
        self.register("less", operators::op_less);
        self.register("greater", operators::op_greater);
        self.register("negate", operators::op_negate);
        self.register("identity", operators::op_identity);
        self.register("not", logical::fn_not);
        self.register("concat", text::fn_concat);
    }

    fn register_math_functions(&mut self) {
        self.register("abs", math::fn_abs);
        self.register("sqrt", math::fn_sqrt);
        self.register("exp", math::fn_exp);
        self.register("ln", math::fn_ln);
        self.register("log", math::fn_log10);
        self.register("sin", math::fn_sin);
        self.register("cos", math::fn_cos);
        self.register("tan", math::fn_tan);
        self.register("floor", math::fn_floor);
        self.register("ceil", math::fn_ceil);
        self.register("round", math::fn_round);
        self.register("min", math::fn_min);
        self.register("max", math::fn_max);
        self.register("sum", math::fn_sum);
        self.register("avg", math::fn_avg);
    }

    fn register_logical_functions(&mut self) {
        self.register("if", logical::fn_if);
    }

    fn register_text_functions(&mut self) {
        self.register("text", text::fn_text);
        self.register("num", text::fn_num);
        self.pre_parses
            .insert("bracket_index".into(), Arc::new(text::bracket_index));
    }

    fn register_list_functions(&mut self) {
        self.register("list", list::fn_list);
        self.register("len", list::fn_len);
        self.register("index", list::fn_index);
    }
}

impl Resolver for StandardLibrary {
    fn implementation(&self, id: &str) -> Option<Implementation> {
        self.implementations.get(id).cloned()
    }

    fn pre_parse(&self, id: &str) -> Option<PreParse> {
        self.pre_parses.get(id).cloned()
    }
}

/// Check an exact argument count
pub(crate) fn expect_args(name: &str, args: &[Thing], count: usize) -> Result<(), CallError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(CallError::BadArguments(format!(
            "{} expects {} argument(s), got {}",
            name,
            count,
            args.len()
        )))
    }
}

/// Single numeric argument
pub(crate) fn number_arg(name: &str, args: &[Thing]) -> Result<f64, CallError> {
    expect_args(name, args, 1)?;
    Ok(args[0].to_number()?)
}
