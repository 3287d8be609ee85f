//! Arithmetic and comparison operators

use super::{expect_args, CallError, CallResult};
use reckon_core::Thing;

/// Numeric operands of a binary operator.
///
/// Text and list operands are rejected so that a later candidate (for
/// instance text concatenation) gets its turn.
fn numeric_pair(name: &str, args: &[Thing]) -> Result<(f64, f64, bool), CallError> {
    expect_args(name, args, 2)?;
    let (left, right) = (&args[0], &args[1]);
    if !left.is_numeric() || !right.is_numeric() {
        return Err(CallError::BadArguments(format!(
            "{} needs numbers, got {} and {}",
            name,
            left.type_name(),
            right.type_name()
        )));
    }
    let both_constant = left.is_constant() && right.is_constant();
    Ok((left.to_number()?, right.to_number()?, both_constant))
}

/// Numeric result that keeps the constant tag when every operand had it
fn numeric(n: f64, constant: bool) -> CallResult {
    if n.is_nan() {
        return Err(CallError::bad_arguments("result is not a number"));
    }
    Ok(Some(if constant {
        Thing::Constant(n)
    } else {
        Thing::Number(n)
    }))
}

/// a + b
pub fn op_add(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("+", args)?;
    numeric(a + b, c)
}

/// a - b
pub fn op_subtract(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("-", args)?;
    numeric(a - b, c)
}

/// a * b
pub fn op_multiply(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("*", args)?;
    numeric(a * b, c)
}

/// a / b
pub fn op_divide(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("/", args)?;
    if b == 0.0 {
        return Err(CallError::bad_arguments("division by zero"));
    }
    numeric(a / b, c)
}

/// a % b, with the sign of the divisor
pub fn op_modulo(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("%", args)?;
    if b == 0.0 {
        return Err(CallError::bad_arguments("division by zero"));
    }
    numeric(a - b * (a / b).floor(), c)
}

/// a ^ b
pub fn op_power(args: &[Thing]) -> CallResult {
    let (a, b, c) = numeric_pair("^", args)?;
    numeric(a.powf(b), c)
}

fn compare(name: &str, args: &[Thing]) -> Result<std::cmp::Ordering, CallError> {
    expect_args(name, args, 2)?;
    match (&args[0], &args[1]) {
        (Thing::Text(a), Thing::Text(b)) => Ok(a.cmp(b)),
        (a, b) => {
            let (a, b) = (a.to_number()?, b.to_number()?);
            a.partial_cmp(&b)
                .ok_or_else(|| CallError::bad_arguments("values are not comparable"))
        }
    }
}

/// a = b
pub fn op_equal(args: &[Thing]) -> CallResult {
    Ok(Some(Thing::Bool(compare("=", args)?.is_eq())))
}

/// a < b
pub fn op_less(args: &[Thing]) -> CallResult {
    Ok(Some(Thing::Bool(compare("<", args)?.is_lt())))
}

/// a > b
pub fn op_greater(args: &[Thing]) -> CallResult {
    Ok(Some(Thing::Bool(compare(">", args)?.is_gt())))
}

/// -a
pub fn op_negate(args: &[Thing]) -> CallResult {
    expect_args("-", args, 1)?;
    match &args[0] {
        Thing::Constant(n) => Ok(Some(Thing::Constant(-n))),
        Thing::Number(n) => Ok(Some(Thing::Number(-n))),
        other => Err(CallError::BadArguments(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

/// +a
pub fn op_identity(args: &[Thing]) -> CallResult {
    expect_args("+", args, 1)?;
    if args[0].is_numeric() {
        Ok(Some(args[0].clone()))
    } else {
        Err(CallError::bad_arguments("unary + needs a number"))
    }
}
