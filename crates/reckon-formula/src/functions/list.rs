//! List functions and the implicit index call

use super::{expect_args, CallError, CallResult};
use reckon_core::Thing;

/// LIST(values...)
pub fn fn_list(args: &[Thing]) -> CallResult {
    Ok(Some(Thing::List(args.to_vec())))
}

/// LEN(list or text)
pub fn fn_len(args: &[Thing]) -> CallResult {
    expect_args("len", args, 1)?;
    let len = match &args[0] {
        Thing::List(items) => items.len(),
        Thing::Text(s) => s.chars().count(),
        other => {
            return Err(CallError::BadArguments(format!(
                "len cannot use {}",
                other.type_name()
            )))
        }
    };
    Ok(Some(Thing::Number(len as f64)))
}

/// Implicit call `callee(i, j, ...)`: successive zero-based indexing
pub fn fn_index(args: &[Thing]) -> CallResult {
    let (callee, indices) = args
        .split_first()
        .ok_or_else(|| CallError::bad_arguments("index needs a callee"))?;
    if indices.is_empty() {
        return Err(CallError::bad_arguments("index needs at least one position"));
    }

    let mut current = callee.clone();
    for index in indices {
        let position = index.to_number()?;
        if position.fract() != 0.0 {
            return Err(CallError::BadArguments(format!(
                "index {} is not a whole number",
                position
            )));
        }
        current = current.index(position as i64)?;
    }
    Ok(Some(current))
}
