//! Prelude module - common imports for reckon users
//!
//! ```rust
//! use reckon::prelude::*;
//! ```

pub use crate::{
    // Errors
    CallError,
    // Execution
    Dispatch,
    FormulaError,
    // Main types
    FormulaManager,
    FormulaResult,
    FormulaVar,
    ManagerOptions,
    // Registry
    Registry,
    RegistrySpec,
    StandardLibrary,
    // Values
    Thing,
    ThingCell,
};
