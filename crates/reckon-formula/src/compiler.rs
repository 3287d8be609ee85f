//! Formula compiler
//!
//! Converts infix formula text into a postfix [`Program`] with an
//! operator-precedence (shunting-yard) parser driven by a [`Registry`].
//!
//! Call forms:
//! - `name(a, b)` where `name` is in the function table compiles to
//!   `a b 2 name`: the argument count is pushed as an ordinary operand just
//!   before the [`FuncKind::Named`] token.
//! - Any other operand followed by `(` is an implicit call. `x(a, b)`
//!   compiles to `x a b 2` where the final token is [`FuncKind::Implicit`]
//!   and its text is the number of arguments (the callee not counted).

use crate::error::{FormulaError, FormulaResult};
use crate::program::{FuncKind, Program, Token, TokenKind};
use crate::registry::{Registry, COMMA_PRECEDENCE, PAREN_PRECEDENCE};

/// Compile a formula.
///
/// Returns `Ok(None)` for a blank formula.
///
/// # Example
/// ```rust
/// use reckon_formula::{compile, Registry};
///
/// let registry = Registry::standard().unwrap();
/// let program = compile("a + b * 2", &registry).unwrap().unwrap();
/// assert_eq!(program.to_string(), "a b 2 * +");
/// ```
pub fn compile(formula: &str, registry: &Registry) -> FormulaResult<Option<Program>> {
    let formula = registry.pre_parse(formula);
    if formula.trim().is_empty() {
        return Ok(None);
    }

    let lexemes = tokenize(&formula, registry)?;
    let mut compiler = Compiler::new(registry);
    for lexeme in lexemes {
        compiler.push(lexeme)?;
    }
    compiler.finish().map(Some)
}

/// Lexical units
#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    /// Number or name
    Word(String),
    /// Quoted text literal, quotes included
    Text(String),
    Op(char),
    LeftParen,
    RightParen,
    Comma,
}

fn tokenize(formula: &str, registry: &Registry) -> FormulaResult<Vec<Lexeme>> {
    let chars: Vec<char> = formula.chars().collect();
    let mut lexemes = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                lexemes.push(Lexeme::LeftParen);
                pos += 1;
            }
            ')' => {
                lexemes.push(Lexeme::RightParen);
                pos += 1;
            }
            ',' => {
                lexemes.push(Lexeme::Comma);
                pos += 1;
            }
            '"' => {
                let end = chars[pos + 1..]
                    .iter()
                    .position(|&ch| ch == '"')
                    .map(|offset| pos + 1 + offset)
                    .ok_or_else(|| FormulaError::Parse("unterminated text literal".into()))?;
                lexemes.push(Lexeme::Text(chars[pos..=end].iter().collect()));
                pos = end + 1;
            }
            c if registry.is_operator_char(c) => {
                lexemes.push(Lexeme::Op(c));
                pos += 1;
            }
            _ => {
                let start = pos;
                while pos < chars.len() {
                    let ch = chars[pos];
                    let ends_word = ch.is_whitespace()
                        || matches!(ch, '(' | ')' | ',' | '"')
                        || registry.is_operator_char(ch);
                    if ends_word && !continues_exponent(&chars[start..pos], &chars[pos..]) {
                        break;
                    }
                    pos += 1;
                }
                lexemes.push(Lexeme::Word(chars[start..pos].iter().collect()));
            }
        }
    }
    Ok(lexemes)
}

/// Check for the sign of a scientific-notation exponent, as in `1.5e-3`
fn continues_exponent(word: &[char], rest: &[char]) -> bool {
    let (Some(&first), Some(&last)) = (word.first(), word.last()) else {
        return false;
    };
    let mantissa = &word[..word.len() - 1];
    (first.is_ascii_digit() || first == '.')
        && matches!(last, 'e' | 'E')
        && mantissa.iter().all(|c| c.is_ascii_digit() || *c == '.')
        && matches!(rest.first(), Some('+' | '-'))
        && rest.get(1).is_some_and(|c| c.is_ascii_digit())
}

/// Operator-stack entries
#[derive(Debug)]
enum Pending {
    Unary(String, i32),
    Binary(String, i32),
    /// Grouping parenthesis
    Paren,
    /// Open call; `commas` counts separators seen so far
    Call {
        name: String,
        kind: FuncKind,
        commas: usize,
    },
}

impl Pending {
    fn precedence(&self) -> i32 {
        match self {
            Pending::Unary(_, p) | Pending::Binary(_, p) => *p,
            Pending::Paren | Pending::Call { .. } => PAREN_PRECEDENCE,
        }
    }

    fn into_token(self) -> Option<Token> {
        match self {
            Pending::Unary(op, _) => Some(Token::new(op, TokenKind::Unary)),
            Pending::Binary(op, _) => Some(Token::new(op, TokenKind::Binary)),
            Pending::Paren | Pending::Call { .. } => None,
        }
    }
}

struct Compiler<'a> {
    registry: &'a Registry,
    output: Vec<Token>,
    stack: Vec<Pending>,
    /// True where the next lexeme must start an operand
    expect_operand: bool,
    /// Named function waiting for its `(`
    pending_function: Option<String>,
}

impl<'a> Compiler<'a> {
    fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            output: Vec::new(),
            stack: Vec::new(),
            expect_operand: true,
            pending_function: None,
        }
    }

    fn push(&mut self, lexeme: Lexeme) -> FormulaResult<()> {
        if let Some(name) = self.pending_function.take() {
            if lexeme == Lexeme::LeftParen {
                self.stack.push(Pending::Call {
                    name,
                    kind: FuncKind::Named,
                    commas: 0,
                });
                self.expect_operand = true;
                return Ok(());
            }
            // Function name used without a call: treat it as a variable.
            self.operand(name)?;
        }

        match lexeme {
            Lexeme::Word(word) => {
                if self.expect_operand && self.registry.is_function(&word) {
                    self.pending_function = Some(word);
                    Ok(())
                } else {
                    self.operand(word)
                }
            }
            Lexeme::Text(text) => self.operand(text),
            Lexeme::Op(c) => self.operator(c),
            Lexeme::LeftParen => {
                if self.expect_operand {
                    self.stack.push(Pending::Paren);
                } else {
                    self.open_implicit_call();
                }
                Ok(())
            }
            Lexeme::Comma => self.comma(),
            Lexeme::RightParen => self.close(),
        }
    }

    fn operand(&mut self, text: String) -> FormulaResult<()> {
        if !self.expect_operand {
            return Err(FormulaError::Parse(format!(
                "missing operator before '{}'",
                text
            )));
        }
        self.output.push(Token::new(text, TokenKind::Other));
        self.expect_operand = false;
        Ok(())
    }

    fn operator(&mut self, c: char) -> FormulaResult<()> {
        let token = c.to_string();
        if self.expect_operand {
            let precedence = self.registry.unary_precedence(&token).ok_or_else(|| {
                FormulaError::Parse(format!("operator '{}' is missing its left operand", c))
            })?;
            // Prefix operators wait for their operand; nothing is popped.
            self.stack.push(Pending::Unary(token, precedence));
            return Ok(());
        }

        let precedence = self
            .registry
            .binary_precedence(&token)
            .ok_or_else(|| FormulaError::Parse(format!("'{}' is not a binary operator", c)))?;
        self.pop_while(|p| p >= precedence);
        self.stack.push(Pending::Binary(token, precedence));
        self.expect_operand = true;
        Ok(())
    }

    /// `(` directly after an operand: the operand becomes the callee
    fn open_implicit_call(&mut self) {
        let precedence = self.registry.implicit_precedence();
        self.pop_while(|p| p >= precedence);
        self.stack.push(Pending::Call {
            name: String::new(),
            kind: FuncKind::Implicit,
            commas: 0,
        });
        self.expect_operand = true;
    }

    fn comma(&mut self) -> FormulaResult<()> {
        if self.expect_operand {
            return Err(FormulaError::Parse("empty argument before ','".into()));
        }
        self.pop_while(|p| p < COMMA_PRECEDENCE);
        match self.stack.last_mut() {
            Some(Pending::Call { commas, .. }) => {
                *commas += 1;
                self.expect_operand = true;
                Ok(())
            }
            _ => Err(FormulaError::Parse(
                "',' is only allowed between call arguments".into(),
            )),
        }
    }

    fn close(&mut self) -> FormulaResult<()> {
        let dangling = self.expect_operand;
        self.pop_while(|p| p < COMMA_PRECEDENCE);
        match self.stack.pop() {
            None => Err(FormulaError::Parse("unbalanced parentheses: extra ')'".into())),
            Some(Pending::Paren) => {
                if dangling {
                    return Err(FormulaError::Parse("empty expression in parentheses".into()));
                }
                self.expect_operand = false;
                Ok(())
            }
            Some(Pending::Call { name, kind, commas }) => {
                let argc = match (dangling, commas) {
                    (true, 0) => 0,
                    (true, _) => {
                        return Err(FormulaError::Parse("empty argument before ')'".into()))
                    }
                    (false, n) => n + 1,
                };
                match kind {
                    FuncKind::Named => {
                        self.output
                            .push(Token::new(argc.to_string(), TokenKind::Other));
                        self.output
                            .push(Token::new(name, TokenKind::Func(FuncKind::Named)));
                    }
                    FuncKind::Implicit => {
                        self.output.push(Token::new(
                            argc.to_string(),
                            TokenKind::Func(FuncKind::Implicit),
                        ));
                    }
                }
                self.expect_operand = false;
                Ok(())
            }
            Some(other) => unreachable!("pop_while left {:?} on top", other),
        }
    }

    /// Move operators to the output while `keep_popping(top precedence)` holds.
    ///
    /// Grouping entries report [`PAREN_PRECEDENCE`] and therefore stop every
    /// caller, since all callers test below [`COMMA_PRECEDENCE`] or against a
    /// real operator precedence.
    fn pop_while(&mut self, keep_popping: impl Fn(i32) -> bool) {
        while let Some(top) = self.stack.last() {
            let precedence = top.precedence();
            if precedence >= COMMA_PRECEDENCE || !keep_popping(precedence) {
                break;
            }
            if let Some(token) = self.stack.pop().and_then(Pending::into_token) {
                self.output.push(token);
            }
        }
    }

    fn finish(mut self) -> FormulaResult<Program> {
        if let Some(name) = self.pending_function.take() {
            self.operand(name)?;
        }
        if self.expect_operand {
            return Err(FormulaError::Parse(
                "formula ends where an operand is expected".into(),
            ));
        }
        while let Some(top) = self.stack.pop() {
            match top.into_token() {
                Some(token) => self.output.push(token),
                None => {
                    return Err(FormulaError::Parse(
                        "unbalanced parentheses: missing ')'".into(),
                    ))
                }
            }
        }
        Ok(Program::new(self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn registry() -> Arc<Registry> {
        Registry::standard().unwrap()
    }

    fn postfix(formula: &str) -> String {
        compile(formula, &registry())
            .unwrap()
            .map(|p| p.to_string())
            .unwrap_or_default()
    }

    fn kinds(formula: &str) -> Vec<(String, TokenKind)> {
        compile(formula, &registry())
            .unwrap()
            .unwrap()
            .tokens()
            .iter()
            .map(|t| (t.text.clone(), t.kind))
            .collect()
    }

    fn parse_error(formula: &str) -> String {
        match compile(formula, &registry()) {
            Err(FormulaError::Parse(msg)) => msg,
            other => panic!("expected parse error for {:?}, got {:?}", formula, other),
        }
    }

    #[test]
    fn test_blank_formula_has_no_program() {
        assert!(compile("", &registry()).unwrap().is_none());
        assert!(compile("   ", &registry()).unwrap().is_none());
    }

    #[test]
    fn test_precedence() {
        assert_eq!(postfix("1+2*3"), "1 2 3 * +");
        assert_eq!(postfix("(1+2)*3"), "1 2 + 3 *");
        assert_eq!(postfix("a - b - c"), "a b - c -");
        assert_eq!(postfix("2^3*4"), "2 3 ^ 4 *");
        assert_eq!(postfix("a < b + 1"), "a b 1 + <");
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(
            kinds("-a*b"),
            vec![
                ("a".into(), TokenKind::Other),
                ("-".into(), TokenKind::Unary),
                ("b".into(), TokenKind::Other),
                ("*".into(), TokenKind::Binary),
            ]
        );
        assert_eq!(postfix("-a^2"), "a 2 ^ -");
        assert_eq!(postfix("--a"), "a - -");
        assert_eq!(postfix("a*-b"), "a b - *");
        assert_eq!(postfix("!(a=b)"), "a b = !");
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(postfix("1.5e-3+x"), "1.5e-3 x +");
        assert_eq!(postfix("2E+4"), "2E+4");
        // A name ending in `e` is not a mantissa.
        assert_eq!(postfix("rate-1"), "rate 1 -");
    }

    #[test]
    fn test_named_function_pushes_argument_count() {
        assert_eq!(postfix("max(a, b, 3)"), "a b 3 3 max");
        assert_eq!(
            kinds("sqrt(x)"),
            vec![
                ("x".into(), TokenKind::Other),
                ("1".into(), TokenKind::Other),
                ("sqrt".into(), TokenKind::Func(FuncKind::Named)),
            ]
        );
        assert_eq!(postfix("list()"), "0 list");
        assert_eq!(postfix("SUM(a+1, b*2)"), "a 1 + b 2 * 2 SUM");
    }

    #[test]
    fn test_implicit_call_embeds_argument_count() {
        assert_eq!(
            kinds("v(2)"),
            vec![
                ("v".into(), TokenKind::Other),
                ("2".into(), TokenKind::Other),
                ("1".into(), TokenKind::Func(FuncKind::Implicit)),
            ]
        );
        assert_eq!(postfix("m(i, j) + 1"), "m i j 2 1 +");
        assert_eq!(postfix("a + b(1)"), "a b 1 1 +");
        assert_eq!(postfix("f()"), "f 0");
    }

    #[test]
    fn test_bracket_index_sugar() {
        assert_eq!(postfix("x[1]"), "x 1 1");
        assert_eq!(postfix("x[i][j]"), "x i 1 j 1");
    }

    #[test]
    fn test_nested_named_and_implicit_calls() {
        assert_eq!(
            kinds("max(v(0), min(1, w(2, 3)))"),
            vec![
                ("v".into(), TokenKind::Other),
                ("0".into(), TokenKind::Other),
                ("1".into(), TokenKind::Func(FuncKind::Implicit)),
                ("1".into(), TokenKind::Other),
                ("w".into(), TokenKind::Other),
                ("2".into(), TokenKind::Other),
                ("3".into(), TokenKind::Other),
                ("2".into(), TokenKind::Func(FuncKind::Implicit)),
                ("2".into(), TokenKind::Other),
                ("min".into(), TokenKind::Func(FuncKind::Named)),
                ("2".into(), TokenKind::Other),
                ("max".into(), TokenKind::Func(FuncKind::Named)),
            ]
        );
    }

    #[test]
    fn test_function_name_without_call_is_a_variable() {
        assert_eq!(postfix("sum + 1"), "sum 1 +");
        assert_eq!(postfix("sum"), "sum");
    }

    #[test]
    fn test_text_literals() {
        assert_eq!(postfix("\"a, (b)\" & x"), "\"a, (b)\" x &");
        assert!(parse_error("\"open").contains("unterminated"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_error("(a+b").contains("missing ')'"));
        assert!(parse_error("a+b)").contains("extra ')'"));
        assert!(parse_error("a+").contains("operand is expected"));
        assert!(parse_error("a+*b").contains("missing its left operand"));
        assert!(parse_error("()").contains("empty expression"));
        assert!(parse_error("a b").contains("missing operator"));
        assert!(parse_error("a, b").contains("between call arguments"));
        assert!(parse_error("(a, b)").contains("between call arguments"));
        assert!(parse_error("max(a,)").contains("empty argument"));
        assert!(parse_error("max(,a)").contains("empty argument"));
        assert!(parse_error("a !b").contains("not a binary operator"));
    }
}
