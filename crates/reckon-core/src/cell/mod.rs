//! Value and storage types
//!
//! This module contains:
//! - [`Thing`] - The tagged value carried by variables and the evaluator
//! - [`ThingCell`] - An observable single-value storage cell

mod storage;
mod value;

pub use storage::ThingCell;
pub use value::Thing;
