use std::time::Duration;

use arm_script::{ScriptError, Value, builtins};
use indexmap::IndexMap;

use crate::capabilities::Environment;
use crate::config::EngineConfig;
use crate::stop_control::StopControl;

const KEYWORDS: &[&str] = &[
    "true", "True", "false", "False", "none", "None", "and", "AND", "or", "OR", "not", "NOT", "if",
    "else", "while",
];

pub const CAPABILITY_ROOTS: &[&str] = &["robot", "vision", "resources", "settings"];

/// The variable table of one run, plus the capability handles scripts can
/// reach through `robot.*`, `vision.*`, `resources.*` and `settings.*`.
#[derive(Debug)]
pub struct Namespace {
    values: IndexMap<String, Value>,
    env: Environment,
    stop: StopControl,
    poll: Duration,
    frame_timeout: Duration,
}

impl Namespace {
    #[must_use]
    pub fn new(env: Environment, stop: StopControl, config: &EngineConfig) -> Self {
        Self {
            values: IndexMap::new(),
            env,
            stop,
            poll: config.poll_interval(),
            frame_timeout: config.frame_timeout(),
        }
    }

    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !KEYWORDS.contains(&name)
    }

    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        CAPABILITY_ROOTS.contains(&name)
            || builtins::is_builtin(name)
            || builtins::constant(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        if !Self::is_valid_name(name) {
            return Err(ScriptError::Value(format!("invalid variable name '{name}'")));
        }
        if Self::is_reserved(name) {
            return Err(ScriptError::Value(format!("cannot rebind builtin '{name}'")));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.values.clone()
    }

    pub const fn env(&self) -> &Environment {
        &self.env
    }

    pub const fn stop(&self) -> &StopControl {
        &self.stop
    }

    pub(crate) const fn poll(&self) -> Duration {
        self.poll
    }

    pub(crate) const fn frame_timeout(&self) -> Duration {
        self.frame_timeout
    }

    pub fn evaluate_expression(&mut self, expression: &str) -> Result<Value, ScriptError> {
        arm_script::evaluate(expression, self)
    }

    pub fn evaluate_script(&mut self, code: &str) -> Result<(), ScriptError> {
        arm_script::execute(code, self)
    }

    pub fn render(&mut self, template: &str) -> Result<String, ScriptError> {
        arm_script::render(template, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace() -> Namespace {
        Namespace::new(
            Environment::new(),
            StopControl::new(),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_name_validation() {
        assert!(Namespace::is_valid_name("count"));
        assert!(Namespace::is_valid_name("_tmp2"));
        assert!(!Namespace::is_valid_name("2x"));
        assert!(!Namespace::is_valid_name("a-b"));
        assert!(!Namespace::is_valid_name("while"));
        assert!(!Namespace::is_valid_name(""));
    }

    #[test]
    fn test_builtins_cannot_be_rebound() {
        let mut ns = namespace();
        assert!(ns.set("robot", Value::Number(1.0)).is_err());
        assert!(ns.set("abs", Value::Number(1.0)).is_err());
        assert!(ns.set("pi", Value::Number(3.0)).is_err());
        assert!(ns.is_empty());
    }

    #[test]
    fn test_script_and_expression_share_table() {
        let mut ns = namespace();
        ns.evaluate_script("x = 2\ny = x * 3").unwrap();
        assert_eq!(ns.evaluate_expression("x + y").unwrap(), Value::Number(8.0));
        assert_eq!(ns.render("y={y}").unwrap(), "y=6");
        assert_eq!(
            ns.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            ["x", "y"]
        );
    }

    #[test]
    fn test_undefined_name_is_name_error() {
        let mut ns = namespace();
        let err = ns.evaluate_expression("missing + 1").unwrap_err();
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn test_script_loop_stops_on_cancel() {
        let mut ns = namespace();
        ns.stop().request_stop();
        let err = ns.evaluate_script("while true { x = 1 }").unwrap_err();
        assert_eq!(err, ScriptError::Interrupted);
    }
}
