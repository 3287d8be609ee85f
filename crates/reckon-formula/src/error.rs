//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while registering operators, compiling formulas or
/// rewiring the variable graph
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Malformed operator/function tables or unresolved implementation ids
    #[error("Registration error: {0}")]
    Registration(String),

    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Variable name contains a reserved character
    #[error("Illegal variable name: {0}")]
    IllegalName(String),

    /// No variable with that name
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Variable already created
    #[error("Variable already exists: {0}")]
    VariableExists(String),

    /// Assigning the formula would make a variable depend on itself
    #[error("Formula for {0} creates an infinite loop")]
    InfiniteLoop(String),

    /// Variable cannot be removed while other formulas read it
    #[error("Cannot remove {name}: used by {}", dependents.join(", "))]
    InUse {
        name: String,
        dependents: Vec<String>,
    },

    /// Error from the core value layer
    #[error(transparent)]
    Core(#[from] reckon_core::Error),
}
