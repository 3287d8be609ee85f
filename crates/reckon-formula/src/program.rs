//! Compiled postfix programs

use std::fmt;

/// Which flavour of call a function token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncKind {
    /// Call to a function from the registry's function table.
    ///
    /// The argument count is the operand directly beneath the call.
    Named,
    /// Call selected by argument count alone.
    ///
    /// The token text holds the number of arguments; the callee is the operand
    /// beneath them.
    Implicit,
}

/// Classification of a program token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Binary,
    Unary,
    Func(FuncKind),
    /// Numeric literal, text literal or variable name
    Other,
}

/// A single postfix instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    /// Check if this token is a variable reference
    pub fn is_reference(&self) -> bool {
        self.kind == TokenKind::Other
            && parse_number(&self.text).is_none()
            && text_literal(&self.text).is_none()
    }
}

/// A compiled formula in reverse-Polish order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    tokens: Vec<Token>,
}

impl Program {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Variable names read by this program, in order of first use.
    ///
    /// Names are compared case-insensitively; the first spelling wins.
    pub fn references(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut names = Vec::new();
        for token in self.tokens.iter().filter(|t| t.is_reference()) {
            let key = token.text.to_uppercase();
            if !seen.contains(&key) {
                seen.push(key);
                names.push(token.text.clone());
            }
        }
        names
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", token.text)?;
        }
        Ok(())
    }
}

/// Parse a numeric literal.
///
/// Only words starting with a digit or `.` count, so names such as `inf` or
/// `NaN` stay variable references.
pub fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    text.parse().ok()
}

/// Contents of a `"quoted"` text literal
pub fn text_literal(text: &str) -> Option<&str> {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}
