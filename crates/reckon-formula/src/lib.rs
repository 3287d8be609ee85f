//! # reckon-formula
//!
//! Formula compiler and evaluator for reckon.
//!
//! This crate provides:
//! - An operator and function registry built from identifier tables
//! - Formula compilation (infix text → postfix [`Program`])
//! - Stack-machine evaluation with per-call diagnostics
//! - Built-in operator and function implementations
//! - Cycle detection for dependency graphs
//!
//! ## Example
//!
//! ```rust
//! use reckon_core::Thing;
//! use reckon_formula::{compile, evaluate, Registry};
//!
//! let registry = Registry::standard()?;
//! let program = compile("max(a, 2) * 10", &registry)?.expect("non-empty formula");
//! assert_eq!(program.to_string(), "a 2 2 max 10 *");
//!
//! let mut scope = |_: &str| Some(Thing::Number(3.0));
//! let mut errors = Vec::new();
//! let value = evaluate(&program, &registry, &mut scope, &mut errors);
//! assert_eq!(value, Some(Thing::Number(30.0)));
//! # Ok::<(), reckon_formula::FormulaError>(())
//! ```

pub mod compiler;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod program;
pub mod registry;

pub use compiler::compile;
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, Scope};
pub use functions::{CallError, CallResult, Candidate, Resolver, StandardLibrary};
pub use program::{FuncKind, Program, Token, TokenKind};
pub use registry::{Registry, RegistrySpec, COMMA_PRECEDENCE, PAREN_PRECEDENCE};
