//! Script evaluation: one value per call, against the current row.

use std::collections::HashMap;

use rand::Rng;

use crate::types::{BinOp, Expr, Program, ScriptError, UnOp, Value};

/// Everything a script can see while evaluating.
pub struct EvalContext<'a> {
    /// The current row, keyed by column name. `None` values are SQL NULL
    /// (columns not yet filled by an earlier generator).
    pub columns: &'a HashMap<String, Option<String>>,

    /// Host hook for `fake('method')`; returns `None` for unknown methods.
    pub fake: &'a mut dyn FnMut(&str) -> Option<Value>,
}

impl Program {
    /// Evaluates the compiled script against one row.
    pub fn eval(&self, ctx: &mut EvalContext<'_>) -> Result<Value, ScriptError> {
        eval_expr(&self.root, ctx)
    }
}

fn eval_expr(expr: &Expr, ctx: &mut EvalContext<'_>) -> Result<Value, ScriptError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Ident(name) => match name.as_str() {
            "columns" => Err(ScriptError::Type(
                "'columns' must be indexed, e.g. columns[\"name\"]".into(),
            )),
            other => Err(ScriptError::UnknownIdentifier(other.to_string())),
        },

        Expr::Index(base, index) => {
            let Expr::Ident(name) = base.as_ref() else {
                return Err(ScriptError::Type("only 'columns' can be indexed".into()));
            };
            if name != "columns" {
                return Err(ScriptError::Type("only 'columns' can be indexed".into()));
            }
            let key = match eval_expr(index, ctx)? {
                Value::Str(s) => s,
                other => {
                    return Err(ScriptError::Type(format!(
                        "column index must be a string, got {}",
                        other.type_name()
                    )));
                }
            };
            Ok(match ctx.columns.get(&key) {
                Some(Some(text)) => Value::Str(text.clone()),
                _ => Value::Null,
            })
        }

        Expr::Unary(op, inner) => {
            let value = eval_expr(inner, ctx)?;
            match op {
                UnOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnOp::Neg => match value {
                    Value::Int(n) => Ok(Value::Int(-n)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(ScriptError::Type(format!(
                        "cannot negate {}",
                        other.type_name()
                    ))),
                },
            }
        }

        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit logic before evaluating the right side.
            match op {
                BinOp::And => {
                    let left = eval_expr(lhs, ctx)?;
                    if !left.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    let right = eval_expr(rhs, ctx)?;
                    return Ok(Value::Bool(right.is_truthy()));
                }
                BinOp::Or => {
                    let left = eval_expr(lhs, ctx)?;
                    if left.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    let right = eval_expr(rhs, ctx)?;
                    return Ok(Value::Bool(right.is_truthy()));
                }
                _ => {}
            }
            let left = eval_expr(lhs, ctx)?;
            let right = eval_expr(rhs, ctx)?;
            binary(*op, left, right)
        }

        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, ctx)?);
            }
            call(name, values, ctx)
        }
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> Result<Value, ScriptError> {
    use BinOp::*;
    match op {
        Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                if matches!(left, Value::Null) || matches!(right, Value::Null) {
                    return Err(ScriptError::Type("cannot concatenate null".into()));
                }
                Ok(Value::Str(format!("{left}{right}")))
            }
            _ => numeric_op(op, left, right),
        },
        Sub | Mul | Div | Rem => {
            if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
                match op {
                    Sub => return Ok(Value::Int(a - b)),
                    Mul => return Ok(Value::Int(a * b)),
                    Rem => {
                        if *b == 0 {
                            return Err(ScriptError::DivisionByZero);
                        }
                        return Ok(Value::Int(a % b));
                    }
                    // Integer division still yields a float.
                    _ => {}
                }
            }
            numeric_op(op, left, right)
        }
        Eq => Ok(Value::Bool(values_equal(&left, &right))),
        Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        Lt | Le | Gt | Ge => compare(op, left, right),
        And | Or => unreachable!("logic ops are short-circuited by the caller"),
    }
}

fn numeric_op(op: BinOp, left: Value, right: Value) -> Result<Value, ScriptError> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(ScriptError::Type(format!(
            "cannot apply arithmetic to {} and {}",
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(ScriptError::DivisionByZero);
            }
            a / b
        }
        BinOp::Rem => {
            if b == 0.0 {
                return Err(ScriptError::DivisionByZero);
            }
            a % b
        }
        _ => unreachable!("non-arithmetic op in numeric_op"),
    };
    Ok(Value::Float(result))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(op: BinOp, left: Value, right: Value) -> Result<Value, ScriptError> {
    let ordering = match (&left, &right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(ScriptError::Type(format!(
                    "cannot compare {} and {}",
                    left.type_name(),
                    right.type_name()
                )));
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => unreachable!("non-comparison op in compare"),
    }))
}

// ---------------------------------------------------------------------------
// Builtin functions
// ---------------------------------------------------------------------------

fn arity(function: &str, expected: &str, got: usize) -> ScriptError {
    ScriptError::Arity {
        function: function.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn int_arg(function: &str, value: &Value) -> Result<i64, ScriptError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(ScriptError::Type(format!(
            "{function}() expects an integer, got {}",
            other.type_name()
        ))),
    }
}

fn num_arg(function: &str, value: &Value) -> Result<f64, ScriptError> {
    value.as_number().ok_or_else(|| {
        ScriptError::Type(format!(
            "{function}() expects a number, got {}",
            value.type_name()
        ))
    })
}

fn call(
    name: &str,
    mut args: Vec<Value>,
    ctx: &mut EvalContext<'_>,
) -> Result<Value, ScriptError> {
    let mut rng = rand::rng();
    match name {
        "randint" => {
            if args.len() != 2 {
                return Err(arity(name, "2", args.len()));
            }
            let lo = int_arg(name, &args[0])?;
            let hi = int_arg(name, &args[1])?;
            if lo > hi {
                return Err(ScriptError::Type(format!(
                    "randint() range is empty: {lo} > {hi}"
                )));
            }
            Ok(Value::Int(rng.random_range(lo..=hi)))
        }
        "uniform" => {
            if args.len() != 2 {
                return Err(arity(name, "2", args.len()));
            }
            let lo = num_arg(name, &args[0])?;
            let hi = num_arg(name, &args[1])?;
            if lo > hi {
                return Err(ScriptError::Type(format!(
                    "uniform() range is empty: {lo} > {hi}"
                )));
            }
            Ok(Value::Float(rng.random_range(lo..=hi)))
        }
        "choice" => {
            if args.is_empty() {
                return Err(arity(name, "1 or more", 0));
            }
            let idx = rng.random_range(0..args.len());
            Ok(args.swap_remove(idx))
        }
        "fake" => {
            if args.len() != 1 {
                return Err(arity(name, "1", args.len()));
            }
            let Value::Str(method) = &args[0] else {
                return Err(ScriptError::Type(
                    "fake() expects a method name string".into(),
                ));
            };
            (ctx.fake)(method).ok_or_else(|| ScriptError::UnknownMethod(method.clone()))
        }
        "concat" => {
            let mut out = String::new();
            for value in &args {
                if !matches!(value, Value::Null) {
                    out.push_str(&value.to_string());
                }
            }
            Ok(Value::Str(out))
        }
        "upper" | "lower" => {
            if args.len() != 1 {
                return Err(arity(name, "1", args.len()));
            }
            let text = args[0].to_string();
            Ok(Value::Str(if name == "upper" {
                text.to_uppercase()
            } else {
                text.to_lowercase()
            }))
        }
        "len" => {
            if args.len() != 1 {
                return Err(arity(name, "1", args.len()));
            }
            Ok(Value::Int(args[0].to_string().chars().count() as i64))
        }
        "round" => {
            if args.is_empty() || args.len() > 2 {
                return Err(arity(name, "1 or 2", args.len()));
            }
            let x = num_arg(name, &args[0])?;
            let digits = if args.len() == 2 {
                int_arg(name, &args[1])?
            } else {
                0
            };
            let factor = 10f64.powi(digits as i32);
            let rounded = (x * factor).round() / factor;
            if digits <= 0 {
                Ok(Value::Int(rounded as i64))
            } else {
                Ok(Value::Float(rounded))
            }
        }
        "min" | "max" => {
            if args.len() != 2 {
                return Err(arity(name, "2", args.len()));
            }
            let a = num_arg(name, &args[0])?;
            let b = num_arg(name, &args[1])?;
            let pick_first = if name == "min" { a <= b } else { a >= b };
            Ok(args.swap_remove(if pick_first { 0 } else { 1 }))
        }
        "if" => {
            if args.len() != 3 {
                return Err(arity(name, "3", args.len()));
            }
            let picked = if args[0].is_truthy() { 1 } else { 2 };
            Ok(args.swap_remove(picked))
        }
        "number" => {
            if args.len() != 1 {
                return Err(arity(name, "1", args.len()));
            }
            match &args[0] {
                Value::Int(_) | Value::Float(_) => Ok(args.swap_remove(0)),
                Value::Str(s) => {
                    let trimmed = s.trim();
                    if let Ok(n) = trimmed.parse::<i64>() {
                        Ok(Value::Int(n))
                    } else if let Ok(f) = trimmed.parse::<f64>() {
                        Ok(Value::Float(f))
                    } else {
                        Err(ScriptError::Type(format!("'{s}' is not a number")))
                    }
                }
                other => Err(ScriptError::Type(format!(
                    "number() cannot convert {}",
                    other.type_name()
                ))),
            }
        }
        "string" => {
            if args.len() != 1 {
                return Err(arity(name, "1", args.len()));
            }
            Ok(Value::Str(args[0].to_string()))
        }
        other => Err(ScriptError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str, columns: &[(&str, Option<&str>)]) -> Result<Value, ScriptError> {
        let program = parse(source)?;
        let columns: HashMap<String, Option<String>> = columns
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect();
        let mut fake = |method: &str| match method {
            "first_name" => Some(Value::Str("Ada".into())),
            _ => None,
        };
        let mut ctx = EvalContext {
            columns: &columns,
            fake: &mut fake,
        };
        program.eval(&mut ctx)
    }

    #[test]
    fn randint_stays_in_range() {
        for _ in 0..50 {
            match run("randint(30000, 60000)", &[]).unwrap() {
                Value::Int(n) => assert!((30000..=60000).contains(&n)),
                other => panic!("expected int, got {other:?}"),
            }
        }
    }

    #[test]
    fn reads_prior_columns() {
        let result = run(
            "number(columns['salary']) * 2",
            &[("salary", Some("21000"))],
        )
        .unwrap();
        assert_eq!(result, Value::Float(42000.0));
    }

    #[test]
    fn unfilled_column_is_null() {
        assert_eq!(run("columns['missing']", &[]).unwrap(), Value::Null);
        assert_eq!(
            run("columns['dept']", &[("dept", None)]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn fake_delegates_to_host() {
        assert_eq!(
            run("fake('first_name')", &[]).unwrap(),
            Value::Str("Ada".into())
        );
        let err = run("fake('no_such_method')", &[]).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownMethod(_)));
    }

    #[test]
    fn string_concat_and_helpers() {
        assert_eq!(
            run("upper('cs' + '-' + string(42))", &[]).unwrap(),
            Value::Str("CS-42".into())
        );
        assert_eq!(run("len('hello')", &[]).unwrap(), Value::Int(5));
        assert_eq!(
            run("concat('a', null, 'b')", &[]).unwrap(),
            Value::Str("ab".into())
        );
    }

    #[test]
    fn conditionals_and_comparisons() {
        assert_eq!(
            run("if(2 > 1, 'yes', 'no')", &[]).unwrap(),
            Value::Str("yes".into())
        );
        assert_eq!(run("1 == 1.0", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run("'a' != 'b'", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn choice_picks_an_argument() {
        for _ in 0..20 {
            let value = run("choice('CS', 'MECH', 'CIVIL', 'IT')", &[]).unwrap();
            let Value::Str(s) = value else {
                panic!("expected string");
            };
            assert!(["CS", "MECH", "CIVIL", "IT"].contains(&s.as_str()));
        }
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(
            run("1 / 0", &[]).unwrap_err(),
            ScriptError::DivisionByZero
        ));
    }

    #[test]
    fn rounding() {
        assert_eq!(run("round(2.7)", &[]).unwrap(), Value::Int(3));
        assert_eq!(run("round(2.344, 2)", &[]).unwrap(), Value::Float(2.34));
    }

    #[test]
    fn unknown_function_and_identifier() {
        assert!(matches!(
            run("nope(1)", &[]).unwrap_err(),
            ScriptError::UnknownFunction(_)
        ));
        assert!(matches!(
            run("nope", &[]).unwrap_err(),
            ScriptError::UnknownIdentifier(_)
        ));
    }
}
