//! Stack-machine evaluator
//!
//! Runs a postfix [`Program`] against a [`Registry`]. Evaluation never fails:
//! every problem is appended to the caller's error trail and replaced by a
//! null placeholder on the stack, so a formula always produces some answer
//! (possibly `None`).

use crate::functions::Candidate;
use crate::program::{parse_number, text_literal, FuncKind, Program, Token, TokenKind};
use crate::registry::Registry;
use reckon_core::Thing;

/// Resolves variable names during evaluation
pub trait Scope {
    /// Current value of a variable, or `None` if it has no value
    fn lookup(&mut self, name: &str) -> Option<Thing>;
}

impl<F> Scope for F
where
    F: FnMut(&str) -> Option<Thing>,
{
    fn lookup(&mut self, name: &str) -> Option<Thing> {
        self(name)
    }
}

type Slot = Option<Thing>;

/// Evaluate a compiled program.
///
/// Diagnostics are appended to `errors`; existing entries are kept.
/// Numeric literals are tagged [`Thing::Constant`] while on the stack and
/// are returned as plain numbers.
///
/// # Example
/// ```rust
/// use reckon_core::Thing;
/// use reckon_formula::{compile, evaluate, Registry};
///
/// let registry = Registry::standard().unwrap();
/// let program = compile("x * 2 + 1", &registry).unwrap().unwrap();
/// let mut scope = |name: &str| (name == "x").then(|| Thing::Number(4.0));
/// let mut errors = Vec::new();
///
/// let result = evaluate(&program, &registry, &mut scope, &mut errors);
/// assert_eq!(result, Some(Thing::Number(9.0)));
/// assert!(errors.is_empty());
/// ```
pub fn evaluate(
    program: &Program,
    registry: &Registry,
    scope: &mut dyn Scope,
    errors: &mut Vec<String>,
) -> Option<Thing> {
    let mut machine = Machine {
        registry,
        stack: Vec::with_capacity(program.len()),
        errors,
    };
    for token in program.tokens() {
        machine.step(token, scope);
    }
    machine.finish()
}

struct Machine<'a> {
    registry: &'a Registry,
    stack: Vec<Slot>,
    errors: &'a mut Vec<String>,
}

impl Machine<'_> {
    fn step(&mut self, token: &Token, scope: &mut dyn Scope) {
        match token.kind {
            TokenKind::Other => {
                let value = self.operand(&token.text, scope);
                self.stack.push(value);
            }
            TokenKind::Unary => {
                let operand = self.pop();
                let result = match operand {
                    Some(value) => {
                        try_candidates(self.registry.unary_candidates(&token.text), &[value])
                    }
                    None => None,
                };
                self.push_or_log(result, || format!("could not evaluate operator {}", token.text));
            }
            TokenKind::Binary => {
                let right = self.pop();
                let left = self.pop();
                let result = match (left, right) {
                    (Some(left), Some(right)) => try_candidates(
                        self.registry.binary_candidates(&token.text),
                        &[left, right],
                    ),
                    _ => None,
                };
                self.push_or_log(result, || format!("could not evaluate operator {}", token.text));
            }
            TokenKind::Func(FuncKind::Named) => {
                let count = self.pop();
                let count = self.argument_count(count, &token.text);
                let args = self.pop_args(count);
                let result = args.and_then(|args| {
                    try_candidates(self.registry.function_candidates(&token.text), &args)
                });
                self.push_or_log(result, || format!("could not evaluate function {}", token.text));
            }
            TokenKind::Func(FuncKind::Implicit) => {
                let count = match token.text.parse::<usize>() {
                    Ok(k) => k.saturating_add(1),
                    Err(_) => {
                        self.errors
                            .push(format!("bad implicit argument count {}", token.text));
                        1
                    }
                };
                let args = self.pop_args(count);
                let result = args.and_then(|args| {
                    try_candidates(self.registry.implicit_candidates(), &args)
                });
                self.push_or_log(result, || "could not evaluate implicit function".to_string());
            }
        }
    }

    fn operand(&mut self, text: &str, scope: &mut dyn Scope) -> Slot {
        if let Some(n) = parse_number(text) {
            return Some(Thing::Constant(n));
        }
        if let Some(s) = text_literal(text) {
            return Some(Thing::text(s));
        }
        let value = scope.lookup(text);
        if value.is_none() {
            self.errors.push(format!("variable {} has no value", text));
        }
        value
    }

    fn pop(&mut self) -> Slot {
        match self.stack.pop() {
            Some(slot) => slot,
            None => {
                self.errors.push("stack empty".to_string());
                None
            }
        }
    }

    /// Pop `count` operands in call order; `None` if any is null.
    ///
    /// A count beyond the stack empties it and yields `None`.
    fn pop_args(&mut self, count: usize) -> Option<Vec<Thing>> {
        let Some(start) = self.stack.len().checked_sub(count) else {
            self.stack.clear();
            self.errors.push("stack empty".to_string());
            return None;
        };
        self.stack.split_off(start).into_iter().collect()
    }

    /// Argument count operand of a named call; invalid counts become 0
    fn argument_count(&mut self, count: Slot, function: &str) -> usize {
        match count.as_ref().and_then(Thing::as_number) {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
            _ => {
                self.errors
                    .push(format!("bad argument count for function {}", function));
                0
            }
        }
    }

    fn push_or_log(&mut self, result: Slot, message: impl FnOnce() -> String) {
        if result.is_none() {
            self.errors.push(message());
        }
        self.stack.push(result);
    }

    fn finish(mut self) -> Option<Thing> {
        if self.stack.len() > 1 {
            self.errors
                .push(format!("{} values left on stack", self.stack.len()));
        }
        self.stack.pop().flatten().map(Thing::into_plain)
    }
}

/// First candidate, in registration order, that produces a value
fn try_candidates(candidates: &[Candidate], args: &[Thing]) -> Slot {
    candidates.iter().find_map(|candidate| match candidate.call(args) {
        Ok(Some(value)) => Some(value),
        Ok(None) => None,
        Err(e) => {
            log::trace!("candidate {} declined: {}", candidate.id(), e);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::functions::{CallError, StandardLibrary};
    use crate::registry::RegistrySpec;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn run_with(
        registry: &Registry,
        formula: &str,
        vars: &[(&str, Thing)],
    ) -> (Option<Thing>, Vec<String>) {
        let program = compile(formula, registry).unwrap().unwrap();
        let mut scope = |name: &str| {
            vars.iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };
        let mut errors = Vec::new();
        let result = evaluate(&program, registry, &mut scope, &mut errors);
        (result, errors)
    }

    fn run(formula: &str, vars: &[(&str, Thing)]) -> (Option<Thing>, Vec<String>) {
        let registry = Registry::standard().unwrap();
        run_with(&registry, formula, vars)
    }

    fn n(v: f64) -> Thing {
        Thing::Number(v)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1+2*3", &[]), (Some(n(7.0)), vec![]));
        assert_eq!(run("(1+2)*3", &[]), (Some(n(9.0)), vec![]));
        assert_eq!(run("-2^2", &[]), (Some(n(-4.0)), vec![]));
        assert_eq!(run("a+b", &[("a", n(2.0)), ("b", n(3.0))]), (Some(n(5.0)), vec![]));
    }

    #[test]
    fn test_literal_result_is_plain_number() {
        assert_eq!(run("42", &[]), (Some(n(42.0)), vec![]));
        assert_eq!(run("-1", &[]), (Some(n(-1.0)), vec![]));
    }

    #[test]
    fn test_text_and_concat() {
        assert_eq!(
            run("\"n=\" & x", &[("x", n(3.0))]),
            (Some(Thing::text("n=3")), vec![])
        );
        // `+` falls back to concatenation when addition declines.
        assert_eq!(
            run("\"a\" + 1", &[]),
            (Some(Thing::text("a1")), vec![])
        );
    }

    #[test]
    fn test_missing_variable_logs_and_propagates() {
        let (result, errors) = run("a + 1", &[]);
        assert_eq!(result, None);
        assert_eq!(
            errors,
            vec![
                "variable a has no value".to_string(),
                "could not evaluate operator +".to_string(),
            ]
        );
    }

    #[test]
    fn test_function_failure() {
        let (result, errors) = run("sqrt(0-4)", &[]);
        assert_eq!(result, None);
        assert_eq!(errors, vec!["could not evaluate function sqrt".to_string()]);
    }

    #[test]
    fn test_first_failing_candidate_falls_through() {
        let lib = StandardLibrary::new()
            .with_implementation("refuse", |_| Err(CallError::NoPermission))
            .with_implementation("nothing", |_| Ok(None))
            .with_implementation("pick_right", |args| Ok(Some(args[1].clone())));
        let spec = RegistrySpec::new().binary("+", 1, &["refuse", "nothing", "pick_right"]);
        let registry = Registry::new(&spec, &lib).unwrap();

        assert_eq!(run_with(&registry, "1 + 9", &[]), (Some(n(9.0)), vec![]));
    }

    #[test]
    fn test_all_candidates_failing_logs_once() {
        let lib = StandardLibrary::new()
            .with_implementation("broken", |_| Err(CallError::Internal("boom".into())));
        let spec = RegistrySpec::new().unary("~", 1, &["broken"]);
        let registry = Registry::new(&spec, &lib).unwrap();

        let (result, errors) = run_with(&registry, "~1", &[]);
        assert_eq!(result, None);
        assert_eq!(errors, vec!["could not evaluate operator ~".to_string()]);
    }

    #[test]
    fn test_nested_named_and_implicit_calls() {
        let v = Thing::List(vec![n(10.0), n(20.0), n(30.0)]);
        let m = Thing::List(vec![
            Thing::List(vec![n(1.0), n(2.0)]),
            Thing::List(vec![n(3.0), n(4.0)]),
        ]);
        let (result, errors) = run(
            "max(v(2), min(100, m(1, 0) * 5), list(v(0))(0))",
            &[("v", v), ("m", m)],
        );
        assert_eq!(errors, Vec::<String>::new());
        assert_eq!(result, Some(n(30.0)));

        assert_eq!(
            run("len(v[0]) + 1", &[("v", Thing::List(vec![Thing::text("abc")]))]),
            (Some(n(4.0)), vec![])
        );
    }

    #[test]
    fn test_zero_argument_calls() {
        assert_eq!(run("list()", &[]), (Some(Thing::List(vec![])), vec![]));
        let (result, errors) = run("x()", &[("x", n(1.0))]);
        assert_eq!(result, None);
        assert_eq!(errors, vec!["could not evaluate implicit function".to_string()]);
    }

    #[test]
    fn test_malformed_programs() {
        let registry = Registry::standard().unwrap();
        let mut scope = |_: &str| -> Option<Thing> { None };

        let program = Program::new(vec![Token::new("+", TokenKind::Binary)]);
        let mut errors = Vec::new();
        assert_eq!(evaluate(&program, &registry, &mut scope, &mut errors), None);
        assert_eq!(
            errors,
            vec![
                "stack empty".to_string(),
                "stack empty".to_string(),
                "could not evaluate operator +".to_string(),
            ]
        );

        let program = Program::new(vec![
            Token::new("1", TokenKind::Other),
            Token::new("2", TokenKind::Other),
        ]);
        let mut errors = vec!["earlier".to_string()];
        assert_eq!(
            evaluate(&program, &registry, &mut scope, &mut errors),
            Some(n(2.0))
        );
        assert_eq!(
            errors,
            vec!["earlier".to_string(), "2 values left on stack".to_string()]
        );

        let program = Program::new(vec![
            Token::new("1", TokenKind::Other),
            Token::new("-1", TokenKind::Other),
            Token::new("abs", TokenKind::Func(FuncKind::Named)),
        ]);
        let mut errors = Vec::new();
        assert_eq!(evaluate(&program, &registry, &mut scope, &mut errors), None);
        assert_eq!(
            errors,
            vec![
                "variable -1 has no value".to_string(),
                "bad argument count for function abs".to_string(),
                "could not evaluate function abs".to_string(),
                "2 values left on stack".to_string(),
            ]
        );
    }

    #[test]
    fn test_oversized_argument_counts() {
        let registry = Registry::standard().unwrap();
        let mut scope = |_: &str| -> Option<Thing> { None };

        let program = Program::new(vec![
            Token::new("4", TokenKind::Other),
            Token::new("1e15", TokenKind::Other),
            Token::new("max", TokenKind::Func(FuncKind::Named)),
        ]);
        let mut errors = Vec::new();
        assert_eq!(evaluate(&program, &registry, &mut scope, &mut errors), None);
        assert_eq!(
            errors,
            vec![
                "stack empty".to_string(),
                "could not evaluate function max".to_string(),
            ]
        );

        let program = Program::new(vec![
            Token::new("max", TokenKind::Other),
            Token::new(usize::MAX.to_string(), TokenKind::Func(FuncKind::Implicit)),
        ]);
        let mut errors = Vec::new();
        assert_eq!(evaluate(&program, &registry, &mut scope, &mut errors), None);
        assert_eq!(errors.last(), Some(&"could not evaluate implicit function".to_string()));
    }

    #[test]
    fn test_registry_is_shareable() {
        let registry = Registry::standard().unwrap();
        let program = Arc::new(compile("1+1", &registry).unwrap().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let program = Arc::clone(&program);
                std::thread::spawn(move || {
                    let mut errors = Vec::new();
                    let mut scope = |_: &str| -> Option<Thing> { None };
                    evaluate(&program, &registry, &mut scope, &mut errors)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(n(2.0)));
        }
    }
}
