//! # reckon-core
//!
//! Core types shared by the reckon formula crates.
//!
//! This crate provides the collaborators a reactive formula graph is built on:
//! - [`Thing`] - Tagged values (numbers, constants, text, booleans, lists)
//! - [`ThingCell`] - Observable storage cells with change notification
//! - [`Trigger`] and [`Dispatch`] - Pausable reactive triggers and how they run
//!
//! ## Example
//!
//! ```rust
//! use reckon_core::{Thing, ThingCell};
//!
//! let cell = ThingCell::with_value(2.0);
//! cell.set(Thing::text("two"));
//! assert_eq!(cell.get(), Some(Thing::text("two")));
//! ```

pub mod cell;
pub mod error;
pub mod sync;
pub mod trigger;

pub use cell::{Thing, ThingCell};
pub use error::{Error, Result};
pub use trigger::{CellListener, Dispatch, Trigger};
