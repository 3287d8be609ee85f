//! Logical functions

use super::{expect_args, CallError, CallResult};
use reckon_core::Thing;

/// IF(condition, if_true, [if_false])
pub fn fn_if(args: &[Thing]) -> CallResult {
    if !(2..=3).contains(&args.len()) {
        return Err(CallError::BadArguments(format!(
            "if expects 2 or 3 arguments, got {}",
            args.len()
        )));
    }
    let condition = args[0].as_bool().ok_or_else(|| {
        CallError::BadArguments(format!("if condition cannot be {}", args[0].type_name()))
    })?;

    if condition {
        Ok(Some(args[1].clone()))
    } else {
        Ok(Some(args.get(2).cloned().unwrap_or(Thing::Bool(false))))
    }
}

/// !a
pub fn fn_not(args: &[Thing]) -> CallResult {
    expect_args("!", args, 1)?;
    let value = args[0].as_bool().ok_or_else(|| {
        CallError::BadArguments(format!("cannot negate {}", args[0].type_name()))
    })?;
    Ok(Some(Thing::Bool(!value)))
}
