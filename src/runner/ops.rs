// Allow-listed operations callable from scripts, as `name(args)` or as
// `receiver.name(args)` with the receiver passed first.

use std::fmt::Write;

use crate::error::EvalError;
use super::value::{Operation, Value};

pub const OPERATIONS: &[(&str, Operation)] = &[
    // string
    ("upper", op_upper),
    ("toUpperCase", op_upper),
    ("lower", op_lower),
    ("toLowerCase", op_lower),
    ("trim", op_trim),
    ("concat", op_concat),
    ("replaceAll", op_replace_all),
    ("startsWith", op_starts_with),
    ("endsWith", op_ends_with),
    // array
    ("split", op_split),
    ("join", op_join),
    ("first", op_first),
    ("last", op_last),
    ("at", op_at),
    ("count", op_count),
    // math
    ("round", op_round),
    ("floor", op_floor),
    ("ceil", op_ceil),
    ("abs", op_abs),
    ("min", op_min),
    ("max", op_max),
    // date
    ("today", op_today),
    ("formatDate", op_format_date),
];

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = match (min, max) {
            (a, b) if a == b => a.to_string(),
            (a, usize::MAX) => format!("at least {}", a),
            (a, b) => format!("{}-{}", a, b),
        };
        return Err(EvalError::eval(format!(
            "{} expects {} argument(s), got {}", name, expected, args.len()
        )));
    }
    Ok(())
}

fn text(v: &Value) -> String {
    v.to_string()
}

fn op_upper(args: &[Value]) -> Result<Value, EvalError> {
    arity("upper", args, 1, 1)?;
    Ok(Value::Str(text(&args[0]).to_uppercase()))
}

fn op_lower(args: &[Value]) -> Result<Value, EvalError> {
    arity("lower", args, 1, 1)?;
    Ok(Value::Str(text(&args[0]).to_lowercase()))
}

fn op_trim(args: &[Value]) -> Result<Value, EvalError> {
    arity("trim", args, 1, 1)?;
    Ok(Value::Str(text(&args[0]).trim().to_string()))
}

fn op_concat(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Str(args.iter().map(text).collect()))
}

fn op_replace_all(args: &[Value]) -> Result<Value, EvalError> {
    arity("replaceAll", args, 3, 3)?;
    let from = text(&args[1]);
    if from.is_empty() {
        return Ok(args[0].clone());
    }
    Ok(Value::Str(text(&args[0]).replace(&from, &text(&args[2]))))
}

fn op_starts_with(args: &[Value]) -> Result<Value, EvalError> {
    arity("startsWith", args, 2, 2)?;
    Ok(Value::Bool(text(&args[0]).starts_with(&text(&args[1]))))
}

fn op_ends_with(args: &[Value]) -> Result<Value, EvalError> {
    arity("endsWith", args, 2, 2)?;
    Ok(Value::Bool(text(&args[0]).ends_with(&text(&args[1]))))
}

fn op_split(args: &[Value]) -> Result<Value, EvalError> {
    arity("split", args, 2, 2)?;
    let s = text(&args[0]);
    let sep = text(&args[1]);
    let items = if sep.is_empty() {
        s.chars().map(String::from).collect()
    } else {
        s.split(sep.as_str()).map(String::from).collect()
    };
    Ok(Value::List(items))
}

fn op_join(args: &[Value]) -> Result<Value, EvalError> {
    arity("join", args, 1, 2)?;
    let sep = args.get(1).map(text).unwrap_or_else(|| ",".to_string());
    match &args[0] {
        Value::List(items) => Ok(Value::Str(items.join(&sep))),
        other => Ok(Value::Str(text(other))),
    }
}

/// Elements of a list, or the characters of anything else.
fn items(v: &Value) -> Vec<String> {
    match v {
        Value::List(items) => items.clone(),
        other => text(other).chars().map(String::from).collect(),
    }
}

fn op_first(args: &[Value]) -> Result<Value, EvalError> {
    arity("first", args, 1, 1)?;
    Ok(Value::Str(items(&args[0]).into_iter().next().unwrap_or_default()))
}

fn op_last(args: &[Value]) -> Result<Value, EvalError> {
    arity("last", args, 1, 1)?;
    Ok(Value::Str(items(&args[0]).pop().unwrap_or_default()))
}

/// `at(list, i)`; negative indices count from the end.
fn op_at(args: &[Value]) -> Result<Value, EvalError> {
    arity("at", args, 2, 2)?;
    let all = items(&args[0]);
    let idx = args[1].to_number();
    if !idx.is_finite() {
        return Ok(Value::Str(String::new()));
    }
    let idx = idx.trunc() as i64;
    let pos = if idx < 0 { all.len() as i64 + idx } else { idx };
    if pos < 0 {
        return Ok(Value::Str(String::new()));
    }
    Ok(Value::Str(all.get(pos as usize).cloned().unwrap_or_default()))
}

fn op_count(args: &[Value]) -> Result<Value, EvalError> {
    arity("count", args, 1, 1)?;
    Ok(Value::Num(items(&args[0]).len() as f64))
}

fn op_round(args: &[Value]) -> Result<Value, EvalError> {
    arity("round", args, 1, 1)?;
    // halves round toward +infinity
    Ok(Value::Num((args[0].to_number() + 0.5).floor()))
}

fn op_floor(args: &[Value]) -> Result<Value, EvalError> {
    arity("floor", args, 1, 1)?;
    Ok(Value::Num(args[0].to_number().floor()))
}

fn op_ceil(args: &[Value]) -> Result<Value, EvalError> {
    arity("ceil", args, 1, 1)?;
    Ok(Value::Num(args[0].to_number().ceil()))
}

fn op_abs(args: &[Value]) -> Result<Value, EvalError> {
    arity("abs", args, 1, 1)?;
    Ok(Value::Num(args[0].to_number().abs()))
}

fn fold_numbers(name: &str, args: &[Value], pick: fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    arity(name, args, 1, usize::MAX)?;
    let mut acc = args[0].to_number();
    for v in &args[1..] {
        let n = v.to_number();
        if n.is_nan() || acc.is_nan() {
            return Ok(Value::Num(f64::NAN));
        }
        acc = pick(acc, n);
    }
    Ok(Value::Num(acc))
}

fn op_min(args: &[Value]) -> Result<Value, EvalError> {
    fold_numbers("min", args, f64::min)
}

fn op_max(args: &[Value]) -> Result<Value, EvalError> {
    fold_numbers("max", args, f64::max)
}

fn op_today(args: &[Value]) -> Result<Value, EvalError> {
    arity("today", args, 0, 0)?;
    Ok(Value::Str(chrono::Local::now().format("%Y-%m-%d").to_string()))
}

/// `formatDate(fmt)`: current local time through a strftime format.
fn op_format_date(args: &[Value]) -> Result<Value, EvalError> {
    arity("formatDate", args, 1, 1)?;
    let fmt = text(&args[0]);
    // chrono reports bad specifiers through fmt::Error rather than a Result
    let formatted = chrono::Local::now().format(&fmt);
    let mut buf = String::with_capacity(fmt.len() + 16);
    if write!(buf, "{}", formatted).is_err() {
        return Err(EvalError::eval(format!("invalid date format '{}'", fmt)));
    }
    Ok(Value::Str(buf))
}
