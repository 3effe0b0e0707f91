use arm_script::{Result, Scope, ScriptError, Value};

use crate::bindings;
use crate::namespace::Namespace;

impl Scope for Namespace {
    fn resolve(&self, name: &str) -> Result<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ScriptError::Name(name.to_string()))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        self.set(name, value)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        bindings::call(self, name, args)
    }

    fn interrupted(&self) -> bool {
        self.stop().is_stopped()
    }
}
