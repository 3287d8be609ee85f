//! Text functions and the bracket-index rewrite

use super::{expect_args, CallError, CallResult};
use reckon_core::Thing;

/// a & b, or a + b when either side is text
pub fn fn_concat(args: &[Thing]) -> CallResult {
    expect_args("concat", args, 2)?;
    if matches!(args[0], Thing::List(_)) || matches!(args[1], Thing::List(_)) {
        return Err(CallError::bad_arguments("cannot concatenate lists"));
    }
    Ok(Some(Thing::Text(format!("{}{}", args[0], args[1]))))
}

/// TEXT(value)
pub fn fn_text(args: &[Thing]) -> CallResult {
    expect_args("text", args, 1)?;
    Ok(Some(Thing::Text(args[0].to_string())))
}

/// NUM(text)
pub fn fn_num(args: &[Thing]) -> CallResult {
    expect_args("num", args, 1)?;
    match &args[0] {
        Thing::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(|n| Some(Thing::Number(n)))
            .map_err(|_| CallError::BadArguments(format!("'{}' is not a number", s))),
        other if other.is_numeric() => Ok(Some(Thing::Number(other.to_number()?))),
        other => Err(CallError::BadArguments(format!(
            "cannot convert {} to a number",
            other.type_name()
        ))),
    }
}

/// Rewrite `x[i]` as the implicit call `x(i)`, leaving quoted text alone
pub fn bracket_index(formula: &str) -> String {
    let mut out = String::with_capacity(formula.len());
    let mut in_text = false;
    for c in formula.chars() {
        match c {
            '"' => {
                in_text = !in_text;
                out.push(c);
            }
            '[' if !in_text => out.push('('),
            ']' if !in_text => out.push(')'),
            _ => out.push(c),
        }
    }
    out
}
