//! Tagged values flowing through formula variables

use crate::error::{Error, Result};
use std::fmt;

/// A generic tagged value held by a storage cell or an evaluator stack slot.
///
/// The absence of a value (an empty cell, a failed operator) is modelled as
/// `Option<Thing>::None` rather than as a variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Thing {
    /// Plain numeric value
    Number(f64),

    /// Numeric literal taken from formula text.
    ///
    /// Constants behave like numbers for every built-in implementation but
    /// stay distinguishable so that operators can tell a literal `2` from a
    /// variable that currently holds `2`.
    Constant(f64),

    /// Text value
    Text(String),

    /// Boolean value
    Bool(bool),

    /// Ordered collection of values
    List(Vec<Thing>),
}

impl Thing {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Thing::Text(s.into())
    }

    /// Check if this is a literal constant
    pub fn is_constant(&self) -> bool {
        matches!(self, Thing::Constant(_))
    }

    /// Check if this value is numeric (number or constant)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Thing::Number(_) | Thing::Constant(_))
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Thing::Number(n) | Thing::Constant(n) => Some(*n),
            Thing::Bool(true) => Some(1.0),
            Thing::Bool(false) => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to a number
    pub fn to_number(&self) -> Result<f64> {
        self.as_number().ok_or(Error::InvalidValueType {
            expected: "number",
            actual: self.type_name(),
        })
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Thing::Bool(b) => Some(*b),
            Thing::Number(n) | Thing::Constant(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Try to get the value as a string slice
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Thing::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as a list
    pub fn as_list(&self) -> Option<&[Thing]> {
        match self {
            Thing::List(items) => Some(items),
            _ => None,
        }
    }

    /// Element at a zero-based index of a list, or character of a text
    pub fn index(&self, index: i64) -> Result<Thing> {
        match self {
            Thing::List(items) => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(Error::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }),
            Thing::Text(s) => {
                let len = s.chars().count();
                usize::try_from(index)
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Thing::Text(c.to_string()))
                    .ok_or(Error::IndexOutOfBounds { index, len })
            }
            other => Err(Error::InvalidValueType {
                expected: "list",
                actual: other.type_name(),
            }),
        }
    }

    /// Strip the constant tag, recursively for lists
    pub fn into_plain(self) -> Thing {
        match self {
            Thing::Constant(n) => Thing::Number(n),
            Thing::List(items) => Thing::List(items.into_iter().map(Thing::into_plain).collect()),
            other => other,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Thing::Number(_) => "number",
            Thing::Constant(_) => "constant",
            Thing::Text(_) => "text",
            Thing::Bool(_) => "boolean",
            Thing::List(_) => "list",
        }
    }
}

impl fmt::Display for Thing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Thing::Number(n) | Thing::Constant(n) => write!(f, "{}", n),
            Thing::Text(s) => write!(f, "{}", s),
            Thing::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Thing::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Thing {
    fn from(n: f64) -> Self {
        Thing::Number(n)
    }
}

impl From<i32> for Thing {
    fn from(n: i32) -> Self {
        Thing::Number(n as f64)
    }
}

impl From<bool> for Thing {
    fn from(b: bool) -> Self {
        Thing::Bool(b)
    }
}

impl From<&str> for Thing {
    fn from(s: &str) -> Self {
        Thing::text(s)
    }
}

impl From<String> for Thing {
    fn from(s: String) -> Self {
        Thing::Text(s)
    }
}

impl From<Vec<Thing>> for Thing {
    fn from(items: Vec<Thing>) -> Self {
        Thing::List(items)
    }
}
