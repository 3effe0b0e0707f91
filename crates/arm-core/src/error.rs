use std::fmt;

use arm_script::ScriptError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::CapabilityError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No program has been built")]
    NotBuilt,

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Invalid program file: {0}")]
    InvalidProgram(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Engine worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A runtime error raised by a command. `kind` is the error class name that
/// ends up as the key in the error bag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn recursion(depth: usize) -> Self {
        Self::new(
            "RecursionError",
            format!("maximum program call depth of {depth} exceeded"),
        )
    }

    #[must_use]
    pub fn is_interruption(&self) -> bool {
        self.kind == "Interrupted"
    }
}

impl From<ScriptError> for Fault {
    fn from(error: ScriptError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

impl From<CapabilityError> for Fault {
    fn from(error: CapabilityError) -> Self {
        Self::new("CapabilityError", error.to_string())
    }
}

/// Errors collected during build and run: message or error kind mapped to the
/// type names of the commands and events that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorBag(IndexMap<String, Vec<String>>);

impl ErrorBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, type_name: impl Into<String>) {
        let type_name = type_name.into();
        let names = self.0.entry(key.into()).or_default();
        if !names.contains(&type_name) {
            names.push(type_name);
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (key, names) in other.iter() {
            for name in names {
                self.add(key, name.as_str());
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(key, names)| (key.as_str(), names.as_slice()))
    }

    /// Empties the bag and returns what it held.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

impl fmt::Display for ErrorBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, names)) in self.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{key}: {}", names.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        assert_eq!(EngineError::NotBuilt.to_string(), "No program has been built");
        assert_eq!(
            EngineError::InvalidConfig("tickRateHz must be positive".to_string()).to_string(),
            "Invalid configuration: tickRateHz must be positive"
        );
    }

    #[test]
    fn test_fault_from_script_error() {
        let fault = Fault::from(ScriptError::ZeroDivision);
        assert_eq!(fault.kind, "ZeroDivisionError");
        assert_eq!(fault.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_fault_from_capability_error() {
        let fault = Fault::from(CapabilityError::RobotDisconnected);
        assert_eq!(fault.kind, "CapabilityError");
        assert_eq!(fault.message, "Robot is not connected");
    }

    #[test]
    fn test_bag_deduplicates_type_names() {
        let mut bag = ErrorBag::new();
        bag.add("Robot is not connected", "MoveXYZ");
        bag.add("Robot is not connected", "Gripper");
        bag.add("Robot is not connected", "MoveXYZ");

        assert_eq!(bag.len(), 1);
        assert_eq!(
            bag.get("Robot is not connected").unwrap(),
            ["MoveXYZ".to_string(), "Gripper".to_string()]
        );
    }

    #[test]
    fn test_bag_merge_and_take() {
        let mut first = ErrorBag::new();
        first.add("NameError", "SetVariable");
        let mut second = ErrorBag::new();
        second.add("NameError", "TestVariable");
        second.add("Unbalanced blocks", "Step");

        first.merge(&second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.get("NameError").unwrap().len(), 2);

        let taken = first.take();
        assert!(first.is_empty());
        assert_eq!(
            taken.to_string(),
            "NameError: SetVariable, TestVariable\nUnbalanced blocks: Step"
        );
    }

    #[test]
    fn test_bag_serializes_as_map() {
        let mut bag = ErrorBag::new();
        bag.add("ZeroDivisionError", "SetVariable");
        let json = serde_json::to_string(&bag).unwrap();
        assert_eq!(json, r#"{"ZeroDivisionError":["SetVariable"]}"#);
    }
}
