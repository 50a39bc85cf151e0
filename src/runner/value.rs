use std::collections::HashMap;
use std::fmt;

use crate::context::PageVars;
use crate::error::EvalError;
use super::ops::OPERATIONS;

/// Result of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Length in characters (strings) or elements (lists).
    pub fn length(&self) -> Result<usize, EvalError> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.len()),
            other => Err(EvalError::eval(format!("{} has no length", other.kind()))),
        }
    }

    /// Numeric view: strings that do not parse become NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() { 0.0 } else { t.parse().unwrap_or(f64::NAN) }
            }
            Value::List(_) => f64::NAN,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Num(n) => f.write_str(&format_number(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Render a number the way script output shows it: `7`, `2.5`, `Infinity`,
/// with exponent form (`1e+21`, `1e-7`) outside [1e-6, 1e21).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }
    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

/// An allow-listed operation: a pure function over evaluated arguments.
pub type Operation = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Op(Operation),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Op(_) => f.write_str("Op(..)"),
        }
    }
}

/// Names visible to a script: page values plus the operation table.
/// Built fresh for every evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    bindings: HashMap<String, Binding>,
}

impl EvaluationContext {
    /// A context with no names at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the allow-listed operations.
    pub fn with_operations() -> Self {
        let mut ctx = Self::new();
        for &(name, op) in OPERATIONS {
            ctx.bindings.insert(name.to_string(), Binding::Op(op));
        }
        ctx
    }

    /// Operations plus `title`, `url`, `domain`, `path`, `selectedText`
    /// and today's `date`.
    pub fn for_page(vars: &PageVars) -> Self {
        let mut ctx = Self::with_operations();
        ctx.set("title", Value::str(&vars.title));
        ctx.set("url", Value::str(&vars.url));
        ctx.set("domain", Value::str(&vars.domain));
        ctx.set("path", Value::str(&vars.path));
        ctx.set("selectedText", Value::str(&vars.selected_text));
        ctx.set("date", Value::Str(chrono::Local::now().format("%Y-%m-%d").to_string()));
        ctx
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), Binding::Value(value));
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn operation(&self, name: &str) -> Option<Operation> {
        match self.bindings.get(name) {
            Some(Binding::Op(op)) => Some(*op),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for EvaluationContext {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut ctx = Self::with_operations();
        for (k, v) in pairs {
            ctx.set(k, Value::str(v));
        }
        ctx
    }
}
