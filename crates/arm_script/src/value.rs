use crate::error::{Result, ScriptError};
use crate::variable_type::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    List(Vec<Value>),
    None,
}

pub trait ValueExt {
    /// # Errors
    ///
    /// Returns a type error for anything but a boolean.
    fn to_bool(&self) -> Result<bool>;

    /// # Errors
    ///
    /// Returns a type error for anything but a number or boolean.
    fn to_number(&self) -> Result<f64>;
}

impl ValueExt for Value {
    fn to_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(ScriptError::type_error(format!(
                "Expected boolean, got {}",
                other.get_type().as_str()
            ))),
        }
    }

    fn to_number(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(ScriptError::type_error(format!(
                "Expected number, got {}",
                other.get_type().as_str()
            ))),
        }
    }
}

impl Value {
    #[must_use]
    pub const fn get_type(&self) -> VariableType {
        match self {
            Self::String(_) => VariableType::String,
            Self::Boolean(_) => VariableType::Boolean,
            Self::Number(_) => VariableType::Number,
            Self::List(_) => VariableType::List,
            Self::None => VariableType::None,
        }
    }

    #[must_use]
    pub fn infer_type_from_string(s: &str) -> VariableType {
        if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
            VariableType::Boolean
        } else if s.parse::<f64>().is_ok() {
            VariableType::Number
        } else {
            VariableType::String
        }
    }

    /// Converts a string to a Value of the specified type.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as the specified type.
    pub fn from_string(s: &str, var_type: &VariableType) -> Result<Self> {
        match var_type {
            VariableType::String => Ok(Self::String(s.to_string())),
            VariableType::Boolean => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Self::Boolean(true)),
                "false" | "0" | "no" => Ok(Self::Boolean(false)),
                _ => Err(ScriptError::Value(format!("Invalid boolean value: {s}"))),
            },
            VariableType::Number => s
                .parse::<f64>()
                .map(Self::Number)
                .map_err(|_| ScriptError::Value(format!("Invalid number value: {s}"))),
            VariableType::List | VariableType::None => Err(ScriptError::Value(format!(
                "Cannot parse {} from text",
                var_type.as_str()
            ))),
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if let Self::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        if let Self::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                write!(f, "]")
            }
            Self::None => write!(f, "None"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// The host side of an evaluation: where names live and where calls that are not
/// pure builtins end up.
pub trait Scope {
    /// Resolves a variable by name.
    ///
    /// # Errors
    ///
    /// Returns a name error if the variable is not bound.
    fn resolve(&self, name: &str) -> Result<Value>;

    /// Binds or rebinds a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses the binding.
    fn assign(&mut self, name: &str, value: Value) -> Result<()>;

    /// Calls a host function, e.g. `robot.coords`.
    ///
    /// # Errors
    ///
    /// Returns a name error for unknown functions, or whatever the function fails with.
    fn call(&mut self, name: &str, _args: &[Value]) -> Result<Value> {
        Err(ScriptError::Name(name.to_string()))
    }

    /// Polled by loops so a long-running script can be aborted from outside.
    fn interrupted(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_whole_and_fractional_numbers() {
        assert_eq!(Value::Number(42.0).to_string(), "42");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
    }

    #[test]
    fn test_display_list_quotes_nested_strings() {
        let list = Value::List(vec![Value::Number(1.0), Value::from("a"), Value::None]);
        assert_eq!(list.to_string(), "[1, \"a\", None]");
    }

    #[test]
    fn test_infer_and_parse_from_string() {
        for (text, expected) in [
            ("TRUE", Value::Boolean(true)),
            ("12.5", Value::Number(12.5)),
            ("gripper", Value::from("gripper")),
        ] {
            let var_type = Value::infer_type_from_string(text);
            assert_eq!(Value::from_string(text, &var_type).unwrap(), expected);
        }
    }

    #[test]
    fn test_string_is_not_a_number() {
        assert!(Value::from("5").to_number().is_err());
        assert_eq!(Value::Boolean(true).to_number().unwrap(), 1.0);
    }
}
