//! # reckon
//!
//! Reactive formula variables.
//!
//! Each variable holds a value in an observable storage cell, or a formula
//! that is compiled once and recomputed whenever a variable it reads
//! changes. A variable can never depend on itself: a formula that would
//! close a cycle is rejected and the previous definition is kept.
//!
//! ## Features
//!
//! - Configurable operator and function tables with ordered fallback candidates
//! - Infix formulas compiled to postfix programs
//! - Automatic dependency tracking with cycle rejection
//! - Immediate or threaded recomputation, with waiting for quiescence
//! - Per-variable error logs instead of failing evaluations
//!
//! ## Example
//!
//! ```rust
//! use reckon::prelude::*;
//!
//! let manager = FormulaManager::standard()?;
//! manager.set_thing("width", 4.0)?;
//! manager.set_thing("height", 2.5)?;
//! manager.assign_formula("area", "width * height")?;
//! assert_eq!(manager.get_thing("area")?, Some(Thing::Number(10.0)));
//!
//! // Cycles are rejected and logged on the variable being assigned.
//! assert!(manager.assign_formula("width", "area / 2").is_err());
//! assert_eq!(
//!     manager.get_errors("width"),
//!     Some(vec!["formula creates an infinite loop".to_string()])
//! );
//! # Ok::<(), reckon::FormulaError>(())
//! ```

pub mod manager;
pub mod prelude;
pub mod variable;

pub use manager::{FormulaManager, ManagerOptions};
pub use variable::FormulaVar;

// Re-export core types
pub use reckon_core::{CellListener, Dispatch, Error, Result, Thing, ThingCell, Trigger};

// Re-export formula types
pub use reckon_formula::{
    compile, evaluate, CallError, CallResult, FormulaError, FormulaResult, FuncKind, Program,
    Registry, RegistrySpec, Resolver, Scope, StandardLibrary, Token, TokenKind,
};
