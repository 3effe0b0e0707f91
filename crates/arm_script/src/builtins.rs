//! The fixed library every script can see: math, a few safe conversions and
//! container helpers. Nothing here touches the outside world.

use crate::error::{Result, ScriptError};
use crate::value::{Value, ValueExt};

pub const FUNCTIONS: &[&str] = &[
    "abs", "min", "max", "round", "floor", "ceil", "sqrt", "pow", "sin", "cos", "tan", "atan2",
    "degrees", "radians", "len", "str", "int", "float", "bool", "list", "range", "sum",
];

const MAX_RANGE_LEN: usize = 100_000;

#[must_use]
pub fn constant(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Number(std::f64::consts::PI)),
        "e" => Some(Value::Number(std::f64::consts::E)),
        _ => None,
    }
}

#[must_use]
pub fn is_builtin(name: &str) -> bool {
    FUNCTIONS.contains(&name)
}

/// Calls a builtin by name. `None` means the name is not a builtin and the
/// caller should look elsewhere.
#[must_use]
pub fn call(name: &str, args: &[Value]) -> Option<Result<Value>> {
    if !is_builtin(name) {
        return None;
    }
    Some(dispatch(name, args))
}

fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "abs" => unary_math(name, args, f64::abs),
        "floor" => unary_math(name, args, f64::floor),
        "ceil" => unary_math(name, args, f64::ceil),
        "sin" => unary_math(name, args, f64::sin),
        "cos" => unary_math(name, args, f64::cos),
        "tan" => unary_math(name, args, f64::tan),
        "degrees" => unary_math(name, args, f64::to_degrees),
        "radians" => unary_math(name, args, f64::to_radians),
        "sqrt" => {
            let n = number_arg(name, args, 0)?;
            if n < 0.0 {
                return Err(ScriptError::Value("math domain error".to_string()));
            }
            expect_arity(name, args, 1)?;
            Ok(Value::Number(n.sqrt()))
        }
        "pow" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Number(
                number_arg(name, args, 0)?.powf(number_arg(name, args, 1)?),
            ))
        }
        "atan2" => {
            expect_arity(name, args, 2)?;
            Ok(Value::Number(
                number_arg(name, args, 0)?.atan2(number_arg(name, args, 1)?),
            ))
        }
        "round" => round(args),
        "min" | "max" => extremum(name, args),
        "len" => {
            expect_arity(name, args, 1)?;
            let len = match &args[0] {
                Value::List(items) => items.len(),
                Value::String(s) => s.chars().count(),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "object of type {} has no len()",
                        other.get_type().as_str()
                    )));
                }
            };
            Ok(Value::Number(count_to_f64(len)))
        }
        "str" => {
            expect_arity(name, args, 1)?;
            Ok(Value::String(args[0].to_string()))
        }
        "int" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Number(to_float(&args[0])?.trunc()))
        }
        "float" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Number(to_float(&args[0])?))
        }
        "bool" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Boolean(truthy(&args[0])))
        }
        "list" => match args {
            [] => Ok(Value::List(Vec::new())),
            [Value::List(items)] => Ok(Value::List(items.clone())),
            [Value::String(s)] => Ok(Value::List(
                s.chars().map(|c| Value::String(c.to_string())).collect(),
            )),
            _ => Err(ScriptError::type_error("list() takes a list or a string")),
        },
        "range" => range(args),
        "sum" => {
            expect_arity(name, args, 1)?;
            let Value::List(items) = &args[0] else {
                return Err(ScriptError::type_error("sum() takes a list"));
            };
            let mut total = 0.0;
            for item in items {
                total += item.to_number()?;
            }
            Ok(Value::Number(total))
        }
        _ => Err(ScriptError::Name(name.to_string())),
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ScriptError::type_error(format!(
            "{name}() takes {expected} argument(s) ({} given)",
            args.len()
        )))
    }
}

fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args.get(index)
        .ok_or_else(|| ScriptError::type_error(format!("{name}() is missing an argument")))?
        .to_number()
}

fn unary_math(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    expect_arity(name, args, 1)?;
    Ok(Value::Number(f(number_arg(name, args, 0)?)))
}

fn round(args: &[Value]) -> Result<Value> {
    match args {
        [value] => Ok(Value::Number(value.to_number()?.round())),
        [value, digits] => {
            let factor = 10f64.powf(digits.to_number()?.trunc());
            Ok(Value::Number((value.to_number()? * factor).round() / factor))
        }
        _ => Err(ScriptError::type_error("round() takes 1 or 2 arguments")),
    }
}

fn extremum(name: &str, args: &[Value]) -> Result<Value> {
    let numbers: Vec<f64> = match args {
        [Value::List(items)] => items
            .iter()
            .map(ValueExt::to_number)
            .collect::<Result<_>>()?,
        _ => args
            .iter()
            .map(ValueExt::to_number)
            .collect::<Result<_>>()?,
    };

    let pick = if name == "min" { f64::min } else { f64::max };
    numbers
        .into_iter()
        .reduce(pick)
        .map(Value::Number)
        .ok_or_else(|| ScriptError::Value(format!("{name}() arg is an empty sequence")))
}

fn range(args: &[Value]) -> Result<Value> {
    let (start, stop, step) = match args {
        [stop] => (0.0, stop.to_number()?, 1.0),
        [start, stop] => (start.to_number()?, stop.to_number()?, 1.0),
        [start, stop, step] => (start.to_number()?, stop.to_number()?, step.to_number()?),
        _ => return Err(ScriptError::type_error("range() takes 1 to 3 arguments")),
    };

    if step == 0.0 {
        return Err(ScriptError::Value("range() step must not be zero".to_string()));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0.0 && current < stop) || (step < 0.0 && current > stop) {
        if items.len() >= MAX_RANGE_LEN {
            return Err(ScriptError::Value(format!(
                "range() is limited to {MAX_RANGE_LEN} items"
            )));
        }
        items.push(Value::Number(current));
        current += step;
    }
    Ok(Value::List(items))
}

fn to_float(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScriptError::Value(format!("could not convert string to number: {s}"))),
        other => other.to_number(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::None => false,
    }
}

#[allow(clippy::cast_precision_loss)]
const fn count_to_f64(count: usize) -> f64 {
    count as f64
}
