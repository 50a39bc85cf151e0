// runner: restricted expression evaluator for the `{js}` placeholder
//
// Source is first checked against a deny-list (see guard.rs), then matched
// against an ordered table of grammar rules; the first rule whose matcher
// accepts the source decides how it is evaluated:
//
//   ternary     if (<cond>) ? <then> : <else>
//   length      <expr>.length <op> <int>        op: > < >= <= === !==
//   substring   <expr>.substring(<start>,<end>)
//   identifier  a name bound in the context
//   call        <op>(<args>) / <expr>.<op>(<args>) for allow-listed ops
//   string      '...' or "..."
//   arithmetic  digits . + - * / ( )
//
// Nothing matching means the trimmed source is returned as text.

pub mod arith;
pub mod guard;
pub mod ops;
pub mod value;

use std::sync::LazyLock;

use regex::Regex;

use crate::config::EngineConfig;
use crate::error::EvalError;
use crate::util::{find_branch_colon, find_matching_paren, find_top_level, split_top_level, trailing_group_open, unquote};

pub use value::{Binding, EvaluationContext, Operation, Value};

#[allow(clippy::expect_used)]
static LENGTH_CMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+?)\.length\s*(===|!==|>=|<=|>|<)\s*(\d{1,15})$")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static SUBSTRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+)\.substring\(\s*(\d{1,15})\s*(?:,\s*(\d{1,15})\s*)?\)$")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static INCLUDES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+)\.includes\((.+)\)$").expect("constant regex pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CmpOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            ">" => CmpOp::Gt,
            "<" => CmpOp::Lt,
            ">=" => CmpOp::Ge,
            "<=" => CmpOp::Le,
            "===" => CmpOp::Eq,
            "!==" => CmpOp::Ne,
            _ => return None,
        })
    }

    fn holds(self, lhs: usize, rhs: usize) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

/// A source string recognised by one of the grammar rules.
#[derive(Debug, Clone, PartialEq)]
enum Shape<'a> {
    Ternary { cond: &'a str, then: &'a str, otherwise: &'a str },
    Length { target: &'a str, op: CmpOp, rhs: usize },
    Substring { target: &'a str, start: usize, end: Option<usize> },
    Identifier(&'a str),
    Call { name: &'a str, receiver: Option<&'a str>, args: Vec<&'a str> },
    Literal(String),
    Arithmetic(&'a str),
}

type Matcher = for<'a> fn(&'a str, &EvaluationContext) -> Option<Shape<'a>>;

/// Grammar rules in priority order.
const RULES: &[(&str, Matcher)] = &[
    ("ternary", match_ternary),
    ("length", match_length),
    ("substring", match_substring),
    ("identifier", match_identifier),
    ("call", match_call),
    ("string", match_string),
    ("arithmetic", match_arithmetic),
];

/// Rules whose shapes may stand as the target or needle of a condition.
const OPERAND_RULES: &[&str] = &["substring", "identifier", "call", "string", "arithmetic"];

/// A top-level `&&`/`||` or a leading `!`: logic the grammar has no rule for.
fn is_compound(src: &str) -> bool {
    src.starts_with('!') || find_top_level(src, b'&').is_some() || find_top_level(src, b'|').is_some()
}

/// True when `src` matches an operand rule rather than falling through as text.
fn is_operand(src: &str, ctx: &EvaluationContext) -> bool {
    let src = src.trim();
    !is_compound(src)
        && RULES
            .iter()
            .any(|&(rule, matcher)| OPERAND_RULES.contains(&rule) && matcher(src, ctx).is_some())
}

fn match_ternary<'a>(src: &'a str, _ctx: &EvaluationContext) -> Option<Shape<'a>> {
    let rest = src.strip_prefix("if")?.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let offset = src.len() - rest.len();
    let close = find_matching_paren(src, offset)?;
    let cond = &src[offset + 1..close];
    let branches = src[close + 1..].trim_start().strip_prefix('?')?;
    let colon = find_branch_colon(branches)?;
    Some(Shape::Ternary {
        cond: cond.trim(),
        then: branches[..colon].trim(),
        otherwise: branches[colon + 1..].trim(),
    })
}

fn match_length<'a>(src: &'a str, ctx: &EvaluationContext) -> Option<Shape<'a>> {
    let caps = LENGTH_CMP.captures(src)?;
    let target = caps.get(1)?.as_str().trim();
    if !is_operand(target, ctx) {
        return None;
    }
    let op = CmpOp::parse(caps.get(2)?.as_str())?;
    let rhs = caps.get(3)?.as_str().parse().ok()?;
    Some(Shape::Length { target, op, rhs })
}

fn match_substring<'a>(src: &'a str, _ctx: &EvaluationContext) -> Option<Shape<'a>> {
    let caps = SUBSTRING.captures(src)?;
    let target = caps.get(1)?.as_str().trim();
    let start = caps.get(2)?.as_str().parse().ok()?;
    let end = match caps.get(3) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    Some(Shape::Substring { target, start, end })
}

fn match_identifier<'a>(src: &'a str, ctx: &EvaluationContext) -> Option<Shape<'a>> {
    ctx.contains(src).then_some(Shape::Identifier(src))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn match_call<'a>(src: &'a str, ctx: &EvaluationContext) -> Option<Shape<'a>> {
    let open = trailing_group_open(src)?;
    let head = &src[..open];
    let (receiver, name) = match head.rfind('.') {
        Some(dot) => (Some(head[..dot].trim()), head[dot + 1..].trim()),
        None => (None, head.trim()),
    };
    if !is_ident(name) || ctx.operation(name).is_none() {
        return None;
    }
    if receiver.is_some_and(str::is_empty) {
        return None;
    }
    let inner = src[open + 1..src.len() - 1].trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, b',').into_iter().map(str::trim).collect()
    };
    Some(Shape::Call { name, receiver, args })
}

fn match_string<'a>(src: &'a str, _ctx: &EvaluationContext) -> Option<Shape<'a>> {
    unquote(src).map(Shape::Literal)
}

fn match_arithmetic<'a>(src: &'a str, _ctx: &EvaluationContext) -> Option<Shape<'a>> {
    arith::is_arithmetic(src).then_some(Shape::Arithmetic(src))
}

/// Evaluator for one script run.
pub struct Evaluator<'c> {
    ctx: &'c EvaluationContext,
    max_depth: usize,
}

impl<'c> Evaluator<'c> {
    pub fn new(ctx: &'c EvaluationContext, config: &EngineConfig) -> Self {
        Evaluator { ctx, max_depth: config.max_depth }
    }

    /// Match `src` against the rule table and evaluate the first hit.
    fn eval_at(&self, src: &str, depth: usize) -> Result<Value, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::eval(format!("expression nested deeper than {} levels", self.max_depth)));
        }
        let src = src.trim();
        for &(rule, matcher) in RULES {
            if let Some(shape) = matcher(src, self.ctx) {
                tracing::trace!(rule, src, "matched");
                return self.run(shape, depth);
            }
        }
        Ok(Value::str(src))
    }

    fn run(&self, shape: Shape<'_>, depth: usize) -> Result<Value, EvalError> {
        match shape {
            Shape::Ternary { cond, then, otherwise } => {
                let branch = if self.condition(cond, depth)? { then } else { otherwise };
                self.eval_at(branch, depth + 1)
            }
            Shape::Length { target, op, rhs } => {
                let len = self.eval_at(target, depth + 1)?.length()?;
                Ok(Value::Bool(op.holds(len, rhs)))
            }
            Shape::Substring { target, start, end } => {
                let value = self.eval_at(target, depth + 1)?;
                Ok(Value::Str(substring(&value.to_string(), start, end)))
            }
            Shape::Identifier(name) => match self.ctx.get(name) {
                Some(Binding::Value(v)) => Ok(v.clone()),
                Some(Binding::Op(_)) => Err(EvalError::eval(format!("'{}' is an operation and must be called", name))),
                None => Err(EvalError::eval(format!("unknown name '{}'", name))),
            },
            Shape::Call { name, receiver, args } => {
                let op = self.ctx.operation(name)
                    .ok_or_else(|| EvalError::eval(format!("unknown operation '{}'", name)))?;
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(r) = receiver {
                    values.push(self.eval_at(r, depth + 1)?);
                }
                for a in args {
                    values.push(self.eval_at(a, depth + 1)?);
                }
                op(&values)
            }
            Shape::Literal(s) => Ok(Value::Str(s)),
            Shape::Arithmetic(src) => arith::eval_arithmetic(src).map(Value::Num),
        }
    }

    /// Conditions: `<expr>.length <op> <int>` or `<expr>.includes(<x>)`.
    /// Anything else, including `&&`, `||` and `!` forms, is false.
    fn condition(&self, cond: &str, depth: usize) -> Result<bool, EvalError> {
        if is_compound(cond) {
            tracing::debug!(cond, "unsupported condition form");
            return Ok(false);
        }
        if let Some(Shape::Length { target, op, rhs }) = match_length(cond, self.ctx) {
            let len = self.eval_at(target, depth + 1)?.length()?;
            return Ok(op.holds(len, rhs));
        }
        if let Some(caps) = INCLUDES.captures(cond) {
            let (Some(target), Some(needle)) = (caps.get(1), caps.get(2)) else { return Ok(false) };
            if !is_operand(target.as_str(), self.ctx) || !is_operand(needle.as_str(), self.ctx) {
                return Ok(false);
            }
            let haystack = self.eval_at(target.as_str(), depth + 1)?;
            let needle = self.eval_at(needle.as_str(), depth + 1)?.to_string();
            return Ok(match haystack {
                Value::List(items) => items.iter().any(|i| *i == needle),
                other => other.to_string().contains(&needle),
            });
        }
        Ok(false)
    }
}

/// Character-indexed substring: end-exclusive, out-of-range indices clamp,
/// and the bounds swap when start > end.
fn substring(s: &str, start: usize, end: Option<usize>) -> String {
    let len = s.chars().count();
    let a = start.min(len);
    let b = end.unwrap_or(len).min(len);
    let (from, to) = if a <= b { (a, b) } else { (b, a) };
    s.chars().skip(from).take(to - from).collect()
}

/// Validate and evaluate `source` with default limits.
pub fn evaluate(source: &str, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    evaluate_with(source, ctx, &EngineConfig::default())
}

/// Validate and evaluate `source`. The deny-list check runs first; a
/// rejected source is never evaluated.
pub fn evaluate_with(source: &str, ctx: &EvaluationContext, config: &EngineConfig) -> Result<Value, EvalError> {
    if let Err(e) = guard::check_source(source, &config.extra_denied_words) {
        tracing::warn!(error = %e, "script rejected");
        return Err(e);
    }
    Evaluator::new(ctx, config).eval_at(source, 0)
}
