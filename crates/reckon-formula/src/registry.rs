//! Operator and function registry
//!
//! A [`Registry`] is built once from a [`RegistrySpec`] (tables of tokens,
//! precedences and implementation identifiers) and a [`Resolver`]. Every
//! table is validated and every identifier resolved during construction, so a
//! registry that exists is always complete. Registries are immutable and are
//! shared behind an `Arc` by the compiler and evaluator.

use crate::error::{FormulaError, FormulaResult};
use crate::functions::{Candidate, PreParse, Resolver, StandardLibrary};
use ahash::AHashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Precedence reported for `(`; above every real operator
pub const PAREN_PRECEDENCE: i32 = i32::MAX;

/// Precedence reported for `,`; second only to `(`
pub const COMMA_PRECEDENCE: i32 = i32::MAX - 1;

static STANDARD_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

/// Construction tables for a [`Registry`].
///
/// Each group is a set of parallel vectors. Every operator or function
/// position takes a list of implementation identifiers; candidates are tried
/// in that order at evaluation time. Listing the same token twice appends the
/// second list of candidates to the first.
#[derive(Debug, Clone, Default)]
pub struct RegistrySpec {
    pub binary_tokens: Vec<String>,
    pub binary_precedences: Vec<i32>,
    pub binary_implementations: Vec<Vec<String>>,

    pub unary_tokens: Vec<String>,
    pub unary_precedences: Vec<i32>,
    pub unary_implementations: Vec<Vec<String>>,

    pub function_names: Vec<String>,
    pub function_implementations: Vec<Vec<String>>,

    pub implicit_precedence: i32,
    pub implicit_implementations: Vec<String>,

    pub pre_parse: Option<String>,
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

impl RegistrySpec {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binary operator
    pub fn binary(mut self, token: &str, precedence: i32, implementations: &[&str]) -> Self {
        self.binary_tokens.push(token.to_string());
        self.binary_precedences.push(precedence);
        self.binary_implementations.push(ids(implementations));
        self
    }

    /// Add a unary (prefix) operator
    pub fn unary(mut self, token: &str, precedence: i32, implementations: &[&str]) -> Self {
        self.unary_tokens.push(token.to_string());
        self.unary_precedences.push(precedence);
        self.unary_implementations.push(ids(implementations));
        self
    }

    /// Add a named function
    pub fn function(mut self, name: &str, implementations: &[&str]) -> Self {
        self.function_names.push(name.to_string());
        self.function_implementations.push(ids(implementations));
        self
    }

    /// Set the implicit-call precedence and candidates
    pub fn implicit(mut self, precedence: i32, implementations: &[&str]) -> Self {
        self.implicit_precedence = precedence;
        self.implicit_implementations = ids(implementations);
        self
    }

    /// Set the pre-parse transform
    pub fn pre_parse(mut self, id: &str) -> Self {
        self.pre_parse = Some(id.to_string());
        self
    }

    /// Tables for the built-in operators and functions of [`StandardLibrary`]
    pub fn standard() -> Self {
        let mut spec = Self::new()
            .binary("=", 1, &["equal"])
            .binary("<", 1, &["less"])
            .binary(">", 1, &["greater"])
            .binary("&", 2, &["concat"])
            .binary("+", 3, &["add", "concat"])
            .binary("-", 3, &["subtract"])
            .binary("*", 4, &["multiply"])
            .binary("/", 4, &["divide"])
            .binary("%", 4, &["modulo"])
            .binary("^", 6, &["power"])
            .unary("-", 5, &["negate"])
            .unary("+", 5, &["identity"])
            .unary("!", 5, &["not"])
            .implicit(7, &["index"])
            .pre_parse("bracket_index");

        for name in [
            "abs", "sqrt", "exp", "ln", "log", "sin", "cos", "tan", "floor", "ceil", "round",
            "min", "max", "sum", "avg", "if", "len", "list", "text", "num",
        ] {
            spec = spec.function(name, &[name]);
        }
        spec
    }
}

/// Operator table entry
#[derive(Debug, Clone)]
pub struct OperatorSpec {
    pub token: String,
    pub precedence: i32,
    pub candidates: Vec<Candidate>,
}

/// Function table entry
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub candidates: Vec<Candidate>,
}

/// Validated, immutable operator and function tables
pub struct Registry {
    binary: AHashMap<String, OperatorSpec>,
    unary: AHashMap<String, OperatorSpec>,
    functions: AHashMap<String, FunctionSpec>,
    implicit_precedence: i32,
    implicit: Vec<Candidate>,
    pre_parse: Option<PreParse>,
    operator_chars: Vec<char>,
}

impl Registry {
    /// Validate the tables and resolve every identifier
    pub fn new(spec: &RegistrySpec, resolver: &dyn Resolver) -> FormulaResult<Self> {
        let binary = build_operator_table(
            "binary",
            &spec.binary_tokens,
            &spec.binary_precedences,
            &spec.binary_implementations,
            resolver,
        )?;
        let unary = build_operator_table(
            "unary",
            &spec.unary_tokens,
            &spec.unary_precedences,
            &spec.unary_implementations,
            resolver,
        )?;

        if spec.function_names.len() != spec.function_implementations.len() {
            return Err(FormulaError::Registration(format!(
                "function tables differ in length: {} names, {} implementation lists",
                spec.function_names.len(),
                spec.function_implementations.len()
            )));
        }
        let mut functions: AHashMap<String, FunctionSpec> = AHashMap::new();
        for (name, impls) in spec
            .function_names
            .iter()
            .zip(&spec.function_implementations)
        {
            if !name.chars().next().is_some_and(|c| c.is_alphabetic()) {
                return Err(FormulaError::Registration(format!(
                    "function name '{}' must start with a letter",
                    name
                )));
            }
            let candidates = resolve_all(impls, resolver)?;
            functions
                .entry(name.to_uppercase())
                .or_insert_with(|| FunctionSpec {
                    name: name.clone(),
                    candidates: Vec::new(),
                })
                .candidates
                .extend(candidates);
        }

        let implicit = resolve_all(&spec.implicit_implementations, resolver)?;

        let pre_parse = match &spec.pre_parse {
            Some(id) => Some(resolver.pre_parse(id).ok_or_else(|| {
                FormulaError::Registration(format!("unresolved pre-parse transform '{}'", id))
            })?),
            None => None,
        };

        let mut operator_chars: Vec<char> = binary
            .keys()
            .chain(unary.keys())
            .filter_map(|token| token.chars().next())
            .collect();
        operator_chars.sort_unstable();
        operator_chars.dedup();

        log::debug!(
            "registry built: {} binary, {} unary, {} functions, {} implicit candidates",
            binary.len(),
            unary.len(),
            functions.len(),
            implicit.len()
        );

        Ok(Self {
            binary,
            unary,
            functions,
            implicit_precedence: spec.implicit_precedence,
            implicit,
            pre_parse,
            operator_chars,
        })
    }

    /// Shared registry of the built-in operators and functions
    pub fn standard() -> FormulaResult<Arc<Self>> {
        if let Some(registry) = STANDARD_REGISTRY.get() {
            return Ok(Arc::clone(registry));
        }
        let registry = Arc::new(Self::new(
            &RegistrySpec::standard(),
            StandardLibrary::shared(),
        )?);
        Ok(Arc::clone(STANDARD_REGISTRY.get_or_init(|| registry)))
    }

    pub fn is_binary_op(&self, token: &str) -> bool {
        self.binary.contains_key(token)
    }

    pub fn is_unary_op(&self, token: &str) -> bool {
        self.unary.contains_key(token)
    }

    /// Case-insensitive function lookup
    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Check whether a character is any registered operator token
    pub fn is_operator_char(&self, c: char) -> bool {
        self.operator_chars.binary_search(&c).is_ok()
    }

    /// Precedence of a token.
    ///
    /// `(` and `,` report the grouping sentinels [`PAREN_PRECEDENCE`] and
    /// [`COMMA_PRECEDENCE`]; a token present in both operator tables reports
    /// its binary precedence.
    pub fn precedence_of(&self, token: &str) -> Option<i32> {
        match token {
            "(" => Some(PAREN_PRECEDENCE),
            "," => Some(COMMA_PRECEDENCE),
            _ => self
                .binary_precedence(token)
                .or_else(|| self.unary_precedence(token)),
        }
    }

    pub fn binary_precedence(&self, token: &str) -> Option<i32> {
        self.binary.get(token).map(|op| op.precedence)
    }

    pub fn unary_precedence(&self, token: &str) -> Option<i32> {
        self.unary.get(token).map(|op| op.precedence)
    }

    pub fn implicit_precedence(&self) -> i32 {
        self.implicit_precedence
    }

    pub fn binary_candidates(&self, token: &str) -> &[Candidate] {
        self.binary
            .get(token)
            .map(|op| op.candidates.as_slice())
            .unwrap_or_default()
    }

    pub fn unary_candidates(&self, token: &str) -> &[Candidate] {
        self.unary
            .get(token)
            .map(|op| op.candidates.as_slice())
            .unwrap_or_default()
    }

    pub fn function_candidates(&self, name: &str) -> &[Candidate] {
        self.functions
            .get(&name.to_uppercase())
            .map(|f| f.candidates.as_slice())
            .unwrap_or_default()
    }

    pub fn implicit_candidates(&self) -> &[Candidate] {
        &self.implicit
    }

    /// Apply the pre-parse transform, if one is registered
    pub fn pre_parse(&self, formula: &str) -> String {
        match &self.pre_parse {
            Some(transform) => transform(formula),
            None => formula.to_string(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut binary: Vec<_> = self.binary.keys().collect();
        binary.sort();
        let mut unary: Vec<_> = self.unary.keys().collect();
        unary.sort();
        let mut functions: Vec<_> = self.functions.values().map(|f| &f.name).collect();
        functions.sort();
        f.debug_struct("Registry")
            .field("binary", &binary)
            .field("unary", &unary)
            .field("functions", &functions)
            .field("implicit_precedence", &self.implicit_precedence)
            .field("pre_parse", &self.pre_parse.is_some())
            .finish()
    }
}

fn valid_operator_token(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            !(c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(c, '(' | ')' | ',' | '"' | '_' | '.'))
        }
        _ => false,
    }
}

fn build_operator_table(
    group: &str,
    tokens: &[String],
    precedences: &[i32],
    implementations: &[Vec<String>],
    resolver: &dyn Resolver,
) -> FormulaResult<AHashMap<String, OperatorSpec>> {
    if tokens.len() != precedences.len() || tokens.len() != implementations.len() {
        return Err(FormulaError::Registration(format!(
            "{} operator tables differ in length: {} tokens, {} precedences, {} implementation lists",
            group,
            tokens.len(),
            precedences.len(),
            implementations.len()
        )));
    }

    let mut table: AHashMap<String, OperatorSpec> = AHashMap::new();
    for ((token, &precedence), impls) in tokens.iter().zip(precedences).zip(implementations) {
        if !valid_operator_token(token) {
            return Err(FormulaError::Registration(format!(
                "{} operator '{}' must be a single non-alphanumeric character other than '(', ')' or ','",
                group, token
            )));
        }
        if precedence >= COMMA_PRECEDENCE {
            return Err(FormulaError::Registration(format!(
                "{} operator '{}' uses a reserved precedence",
                group, token
            )));
        }
        let candidates = resolve_all(impls, resolver)?;
        match table.get_mut(token) {
            Some(existing) if existing.precedence != precedence => {
                return Err(FormulaError::Registration(format!(
                    "{} operator '{}' registered with precedences {} and {}",
                    group, token, existing.precedence, precedence
                )));
            }
            Some(existing) => existing.candidates.extend(candidates),
            None => {
                table.insert(
                    token.clone(),
                    OperatorSpec {
                        token: token.clone(),
                        precedence,
                        candidates,
                    },
                );
            }
        }
    }
    Ok(table)
}

fn resolve_all(ids: &[String], resolver: &dyn Resolver) -> FormulaResult<Vec<Candidate>> {
    ids.iter()
        .map(|id| {
            resolver
                .implementation(id)
                .map(|call| Candidate::new(id.clone(), call))
                .ok_or_else(|| {
                    FormulaError::Registration(format!("unresolved implementation '{}'", id))
                })
        })
        .collect()
}
