use crate::ast::{Expr, InterpolationSegment, Stmt};
use crate::builtins;
use crate::error::{Result, ScriptError};
use crate::value::{Scope, Value, ValueExt};
use std::fmt::Write;

/// Evaluates an expression to a value.
///
/// # Errors
///
/// Returns an error if the expression cannot be evaluated (e.g., type mismatch, division by zero).
pub fn eval_expr(expr: &Expr, scope: &mut dyn Scope) -> Result<Value> {
    match expr {
        Expr::Const(v) => Ok(v.clone()),

        Expr::Load(name) => match scope.resolve(name) {
            Err(ScriptError::Name(missing)) => {
                builtins::constant(name).ok_or(ScriptError::Name(missing))
            }
            other => other,
        },

        Expr::List(items) => items
            .iter()
            .map(|item| eval_expr(item, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),

        Expr::Index(target, index) => {
            let target = eval_expr(target, scope)?;
            let index = eval_expr(index, scope)?;
            index_value(&target, &index)
        }

        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, scope))
                .collect::<Result<Vec<_>>>()?;
            match builtins::call(name, &args) {
                Some(result) => result,
                None => scope.call(name, &args),
            }
        }

        Expr::Add(a, b) => {
            let left = eval_expr(a, scope)?;
            let right = eval_expr(b, scope)?;
            match (left, right) {
                (Value::String(l), r) => Ok(Value::String(format!("{l}{r}"))),
                (Value::Number(l), r) => Ok(Value::Number(l + r.to_number()?)),
                (Value::List(mut l), Value::List(r)) => {
                    l.extend(r);
                    Ok(Value::List(l))
                }
                (Value::Boolean(_), _) => Err(ScriptError::type_error(
                    "Cannot use + with boolean on left side",
                )),
                (l, _) => Err(ScriptError::type_error(format!(
                    "Cannot use + with {}",
                    l.get_type().as_str()
                ))),
            }
        }

        Expr::Sub(a, b) => Ok(Value::Number(
            eval_expr(a, scope)?.to_number()? - eval_expr(b, scope)?.to_number()?,
        )),

        Expr::Mul(a, b) => Ok(Value::Number(
            eval_expr(a, scope)?.to_number()? * eval_expr(b, scope)?.to_number()?,
        )),

        Expr::Div(a, b) => {
            let lhs = eval_expr(a, scope)?.to_number()?;
            let rhs = eval_expr(b, scope)?.to_number()?;
            if rhs.abs() < f64::EPSILON {
                return Err(ScriptError::ZeroDivision);
            }
            Ok(Value::Number(lhs / rhs))
        }

        Expr::Mod(a, b) => {
            let lhs = eval_expr(a, scope)?.to_number()?;
            let rhs = eval_expr(b, scope)?.to_number()?;
            if rhs.abs() < f64::EPSILON {
                return Err(ScriptError::ZeroDivision);
            }
            Ok(Value::Number(lhs % rhs))
        }

        Expr::Neg(e) => Ok(Value::Number(-eval_expr(e, scope)?.to_number()?)),

        Expr::Eq(a, b) => {
            let lhs = eval_expr(a, scope)?;
            let rhs = eval_expr(b, scope)?;
            Ok(Value::Boolean(values_equal(&lhs, &rhs, "==")?))
        }

        Expr::Ne(a, b) => {
            let lhs = eval_expr(a, scope)?;
            let rhs = eval_expr(b, scope)?;
            Ok(Value::Boolean(!values_equal(&lhs, &rhs, "!=")?))
        }

        Expr::Gt(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_number()? > eval_expr(b, scope)?.to_number()?,
        )),

        Expr::Ge(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_number()? >= eval_expr(b, scope)?.to_number()?,
        )),

        Expr::Lt(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_number()? < eval_expr(b, scope)?.to_number()?,
        )),

        Expr::Le(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_number()? <= eval_expr(b, scope)?.to_number()?,
        )),

        Expr::And(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_bool()? && eval_expr(b, scope)?.to_bool()?,
        )),

        Expr::Or(a, b) => Ok(Value::Boolean(
            eval_expr(a, scope)?.to_bool()? || eval_expr(b, scope)?.to_bool()?,
        )),

        Expr::Not(e) => Ok(Value::Boolean(!eval_expr(e, scope)?.to_bool()?)),

        Expr::InterpolatedString(segments) => {
            let mut result = String::new();
            for segment in segments {
                match segment {
                    InterpolationSegment::Literal(s) => result.push_str(s),
                    InterpolationSegment::Expression(expr) => {
                        let val = eval_expr(expr, scope)?;
                        let _ = write!(&mut result, "{val}");
                    }
                }
            }
            Ok(Value::String(result))
        }
    }
}

/// Equality as the `==` operator sees it: `None` compares with anything, other
/// values only with their own type.
///
/// # Errors
///
/// Returns a type error when two non-`None` values of different types are compared.
pub fn values_equal(lhs: &Value, rhs: &Value, op: &str) -> Result<bool> {
    if lhs.is_none() || rhs.is_none() {
        return Ok(lhs == rhs);
    }
    if std::mem::discriminant(lhs) != std::mem::discriminant(rhs) {
        return Err(ScriptError::type_error(format!("Type mismatch in '{op}'")));
    }
    Ok(lhs == rhs)
}

fn index_value(target: &Value, index: &Value) -> Result<Value> {
    let raw = index.to_number()?;
    if raw.fract() != 0.0 {
        return Err(ScriptError::type_error("Index must be a whole number"));
    }
    #[allow(clippy::cast_possible_truncation)]
    let index = raw as i64;

    let resolve = |len: usize| -> Result<usize> {
        let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
        let position = if index < 0 { signed_len + index } else { index };
        usize::try_from(position)
            .ok()
            .filter(|p| *p < len)
            .ok_or(ScriptError::Index { index, len })
    };

    match target {
        Value::List(items) => Ok(items[resolve(items.len())?].clone()),
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::String(chars[resolve(chars.len())?].to_string()))
        }
        other => Err(ScriptError::type_error(format!(
            "{} is not indexable",
            other.get_type().as_str()
        ))),
    }
}

/// Runs a parsed script against the scope. Assignments persist in the scope.
///
/// # Errors
///
/// Returns the first error raised by any statement, or `Interrupted` if the
/// scope reports an interruption while a loop is spinning.
pub fn exec_script(statements: &[Stmt], scope: &mut dyn Scope) -> Result<()> {
    for statement in statements {
        exec_stmt(statement, scope)?;
    }
    Ok(())
}

fn exec_stmt(statement: &Stmt, scope: &mut dyn Scope) -> Result<()> {
    match statement {
        Stmt::Assign(name, expr) => {
            let value = eval_expr(expr, scope)?;
            scope.assign(name, value)
        }
        Stmt::Expr(expr) => eval_expr(expr, scope).map(|_| ()),
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval_expr(condition, scope)?.to_bool()? {
                exec_script(then_branch, scope)
            } else {
                exec_script(else_branch, scope)
            }
        }
        Stmt::While { condition, body } => {
            loop {
                if scope.interrupted() {
                    return Err(ScriptError::Interrupted);
                }
                if !eval_expr(condition, scope)?.to_bool()? {
                    break;
                }
                exec_script(body, scope)?;
            }
            Ok(())
        }
    }
}
