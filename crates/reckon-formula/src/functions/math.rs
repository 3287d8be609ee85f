//! Math functions

use super::{number_arg, CallError, CallResult};
use reckon_core::Thing;

fn unary(name: &str, args: &[Thing], f: impl Fn(f64) -> f64) -> CallResult {
    let x = number_arg(name, args)?;
    let y = f(x);
    if y.is_finite() {
        Ok(Some(Thing::Number(y)))
    } else {
        Err(CallError::BadArguments(format!("{} is undefined for {}", name, x)))
    }
}

/// Numbers from the arguments, flattening lists
fn collect_numbers(name: &str, args: &[Thing]) -> Result<Vec<f64>, CallError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            Thing::List(items) => numbers.extend(collect_numbers(name, items)?),
            other => numbers.push(other.to_number().map_err(|_| {
                CallError::BadArguments(format!("{} cannot use {}", name, other.type_name()))
            })?),
        }
    }
    Ok(numbers)
}

/// ABS(x)
pub fn fn_abs(args: &[Thing]) -> CallResult {
    unary("abs", args, f64::abs)
}

/// SQRT(x)
pub fn fn_sqrt(args: &[Thing]) -> CallResult {
    let x = number_arg("sqrt", args)?;
    if x < 0.0 {
        return Err(CallError::bad_arguments("sqrt of a negative number"));
    }
    Ok(Some(Thing::Number(x.sqrt())))
}

/// EXP(x)
pub fn fn_exp(args: &[Thing]) -> CallResult {
    unary("exp", args, f64::exp)
}

/// LN(x)
pub fn fn_ln(args: &[Thing]) -> CallResult {
    unary("ln", args, f64::ln)
}

/// LOG(x), base 10
pub fn fn_log10(args: &[Thing]) -> CallResult {
    unary("log", args, f64::log10)
}

/// SIN(x)
pub fn fn_sin(args: &[Thing]) -> CallResult {
    unary("sin", args, f64::sin)
}

/// COS(x)
pub fn fn_cos(args: &[Thing]) -> CallResult {
    unary("cos", args, f64::cos)
}

/// TAN(x)
pub fn fn_tan(args: &[Thing]) -> CallResult {
    unary("tan", args, f64::tan)
}

/// FLOOR(x)
pub fn fn_floor(args: &[Thing]) -> CallResult {
    unary("floor", args, f64::floor)
}

/// CEIL(x)
pub fn fn_ceil(args: &[Thing]) -> CallResult {
    unary("ceil", args, f64::ceil)
}

/// ROUND(x, [digits])
pub fn fn_round(args: &[Thing]) -> CallResult {
    match args.len() {
        1 => unary("round", args, f64::round),
        2 => {
            let x = args[0].to_number()?;
            let digits = args[1].to_number()?.trunc() as i32;
            let factor = 10f64.powi(digits);
            Ok(Some(Thing::Number((x * factor).round() / factor)))
        }
        n => Err(CallError::BadArguments(format!(
            "round expects 1 or 2 arguments, got {}",
            n
        ))),
    }
}

/// MIN(values...)
pub fn fn_min(args: &[Thing]) -> CallResult {
    let numbers = collect_numbers("min", args)?;
    Ok(numbers.into_iter().reduce(f64::min).map(Thing::Number))
}

/// MAX(values...)
pub fn fn_max(args: &[Thing]) -> CallResult {
    let numbers = collect_numbers("max", args)?;
    Ok(numbers.into_iter().reduce(f64::max).map(Thing::Number))
}

/// SUM(values...)
pub fn fn_sum(args: &[Thing]) -> CallResult {
    let numbers = collect_numbers("sum", args)?;
    Ok(Some(Thing::Number(numbers.iter().sum())))
}

/// AVG(values...)
pub fn fn_avg(args: &[Thing]) -> CallResult {
    let numbers = collect_numbers("avg", args)?;
    if numbers.is_empty() {
        return Err(CallError::bad_arguments("avg of nothing"));
    }
    Ok(Some(Thing::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> Thing {
        Thing::Number(v)
    }

    #[test]
    fn test_unary_math() {
        assert_eq!(fn_abs(&[n(-2.0)]), Ok(Some(n(2.0))));
        assert_eq!(fn_sqrt(&[Thing::Constant(9.0)]), Ok(Some(n(3.0))));
        assert_eq!(fn_floor(&[n(2.7)]), Ok(Some(n(2.0))));
        assert!(fn_sqrt(&[n(-1.0)]).is_err());
        assert!(fn_ln(&[n(0.0)]).is_err());
        assert!(fn_abs(&[n(1.0), n(2.0)]).is_err());
    }

    #[test]
    fn test_round() {
        assert_eq!(fn_round(&[n(2.5)]), Ok(Some(n(3.0))));
        assert_eq!(fn_round(&[n(3.14159), n(2.0)]), Ok(Some(n(3.14))));
        assert!(fn_round(&[]).is_err());
    }

    #[test]
    fn test_aggregates_flatten_lists() {
        let list = Thing::List(vec![n(1.0), n(5.0)]);
        assert_eq!(fn_sum(&[list.clone(), n(4.0)]), Ok(Some(n(10.0))));
        assert_eq!(fn_max(&[list.clone(), n(4.0)]), Ok(Some(n(5.0))));
        assert_eq!(fn_min(&[list, n(4.0)]), Ok(Some(n(1.0))));
        assert_eq!(fn_avg(&[n(1.0), n(2.0)]), Ok(Some(n(1.5))));
        assert_eq!(fn_min(&[]), Ok(None));
        assert!(fn_sum(&[Thing::text("x")]).is_err());
    }
}
