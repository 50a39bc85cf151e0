// Infix arithmetic over + - * / and parentheses, evaluated with an explicit
// value stack and operator stack (shunting-yard).

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Open,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div => 2,
            Op::Neg => 3,
            Op::Open => 0,
        }
    }
}

/// Does `src` consist only of arithmetic characters (and at least one digit)?
pub fn is_arithmetic(src: &str) -> bool {
    src.bytes().any(|b| b.is_ascii_digit())
        && src.bytes().all(|b| {
            b.is_ascii_digit() || b.is_ascii_whitespace()
                || matches!(b, b'.' | b'+' | b'-' | b'*' | b'/' | b'(' | b')')
        })
}

fn apply(values: &mut Vec<f64>, op: Op) -> Result<(), EvalError> {
    let malformed = || EvalError::eval("malformed arithmetic expression");
    if op == Op::Neg {
        let v = values.pop().ok_or_else(malformed)?;
        values.push(-v);
        return Ok(());
    }
    let rhs = values.pop().ok_or_else(malformed)?;
    let lhs = values.pop().ok_or_else(malformed)?;
    values.push(match op {
        Op::Add => lhs + rhs,
        Op::Sub => lhs - rhs,
        Op::Mul => lhs * rhs,
        // non-finite results (x/0) are returned as-is
        Op::Div => lhs / rhs,
        Op::Neg | Op::Open => return Err(malformed()),
    });
    Ok(())
}

/// Evaluate an arithmetic expression. `*` and `/` bind tighter than `+`
/// and `-`; a leading `-` or `+` is unary.
pub fn eval_arithmetic(src: &str) -> Result<f64, EvalError> {
    let bytes = src.as_bytes();
    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    // true when the next token must be a number, `(` or a unary sign
    let mut expect_operand = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b.is_ascii_digit() || b == b'.' {
            if !expect_operand {
                return Err(EvalError::eval(format!("unexpected number at offset {}", i)));
            }
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let lit = &src[start..i];
            let n: f64 = lit.parse().map_err(|_| EvalError::eval(format!("invalid number '{}'", lit)))?;
            values.push(n);
            expect_operand = false;
            continue;
        }
        match b {
            b'(' => {
                if !expect_operand {
                    return Err(EvalError::eval(format!("unexpected '(' at offset {}", i)));
                }
                ops.push(Op::Open);
            }
            b')' => {
                if expect_operand {
                    return Err(EvalError::eval(format!("unexpected ')' at offset {}", i)));
                }
                loop {
                    match ops.pop() {
                        Some(Op::Open) => break,
                        Some(op) => apply(&mut values, op)?,
                        None => return Err(EvalError::eval("unbalanced parentheses")),
                    }
                }
            }
            b'+' | b'-' if expect_operand => {
                if b == b'-' {
                    ops.push(Op::Neg);
                }
            }
            b'+' | b'-' | b'*' | b'/' => {
                if expect_operand {
                    return Err(EvalError::eval(format!("unexpected '{}' at offset {}", b as char, i)));
                }
                let op = match b {
                    b'+' => Op::Add,
                    b'-' => Op::Sub,
                    b'*' => Op::Mul,
                    _ => Op::Div,
                };
                while let Some(&top) = ops.last() {
                    if top != Op::Open && top.precedence() >= op.precedence() {
                        ops.pop();
                        apply(&mut values, top)?;
                    } else {
                        break;
                    }
                }
                ops.push(op);
                expect_operand = true;
            }
            other => {
                return Err(EvalError::eval(format!("unexpected character '{}'", other as char)));
            }
        }
        i += 1;
    }

    if expect_operand {
        return Err(EvalError::eval("arithmetic expression ends early"));
    }
    while let Some(op) = ops.pop() {
        if op == Op::Open {
            return Err(EvalError::eval("unbalanced parentheses"));
        }
        apply(&mut values, op)?;
    }
    match values.as_slice() {
        [v] => Ok(*v),
        _ => Err(EvalError::eval("malformed arithmetic expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> f64 {
        eval_arithmetic(src).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("10 - 4 / 2"), 8.0);
        assert_eq!(eval("2 * 3 + 4 * 5"), 26.0);
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(eval("10 - 3 - 2"), 5.0);
        assert_eq!(eval("16 / 4 / 2"), 2.0);
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("((2))"), 2.0);
        assert_eq!(eval("2 * (3 + (4 - 1)) / 3"), 4.0);
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("-3 + 5"), 2.0);
        assert_eq!(eval("2 * -3"), -6.0);
        assert_eq!(eval("-(1 + 1)"), -2.0);
        assert_eq!(eval("--4"), 4.0);
        assert_eq!(eval("+4"), 4.0);
    }

    #[test]
    fn test_decimals() {
        assert_eq!(eval("1.5 * 2"), 3.0);
        assert_eq!(eval(".5 + .5"), 1.0);
    }

    #[test]
    fn test_division_by_zero_propagates() {
        assert_eq!(eval("1 / 0"), f64::INFINITY);
        assert_eq!(eval("-1 / 0"), f64::NEG_INFINITY);
        assert!(eval("0 / 0").is_nan());
    }

    #[test]
    fn test_errors() {
        for src in ["(1 + 2", "1 + 2)", "1 +", "* 2", "1 2", "1.2.3", "()", "2 (3)"] {
            assert!(eval_arithmetic(src).is_err(), "{src}");
        }
    }

    #[test]
    fn test_is_arithmetic() {
        assert!(is_arithmetic("1 + 2 * 3"));
        assert!(is_arithmetic("(4)/2"));
        assert!(!is_arithmetic("title + 1"));
        assert!(!is_arithmetic("()"));
        assert!(!is_arithmetic(""));
    }

    #[test]
    fn test_deep_nesting_is_iterative() {
        let src = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        assert_eq!(eval(&src), 1.0);
    }
}
