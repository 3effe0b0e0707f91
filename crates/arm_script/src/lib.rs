mod ast;
pub mod builtins;
mod error;
mod evaluator;
mod lexer;
mod parser;
mod token;
mod value;
mod variable_type;

pub use ast::{Expr, Script, Stmt};
pub use error::{Result, ScriptError};
pub use evaluator::{eval_expr, exec_script, values_equal};
pub use lexer::Lexer;
pub use parser::{parse_expr, parse_script, parse_template};
pub use token::Token;
pub use value::{Scope, Value, ValueExt};
pub use variable_type::VariableType;

/// Parses and evaluates an expression in one go.
///
/// # Errors
///
/// Returns a syntax error for malformed input, or the evaluation error.
pub fn evaluate(source: &str, scope: &mut dyn Scope) -> Result<Value> {
    let expr = parse_expr(source)?;
    eval_expr(&expr, scope)
}

/// Parses and executes a script in one go.
///
/// # Errors
///
/// Returns a syntax error for malformed input, or the first runtime error.
pub fn execute(source: &str, scope: &mut dyn Scope) -> Result<()> {
    let script = parse_script(source)?;
    exec_script(&script, scope)
}

/// Renders a text template against the scope.
///
/// # Errors
///
/// Returns a syntax error for a malformed placeholder, or the evaluation error.
pub fn render(template: &str, scope: &mut dyn Scope) -> Result<String> {
    let expr = parse_template(template)?;
    eval_expr(&expr, scope).map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockScope {
        vars: HashMap<String, Value>,
        calls: Vec<(String, Vec<Value>)>,
        interrupt_after: Option<usize>,
        polls: Cell<usize>,
    }

    impl MockScope {
        fn with(vars: &[(&str, Value)]) -> Self {
            Self {
                vars: vars
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl Scope for MockScope {
        fn resolve(&self, name: &str) -> Result<Value> {
            self.vars
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::Name(name.to_string()))
        }

        fn assign(&mut self, name: &str, value: Value) -> Result<()> {
            self.vars.insert(name.to_string(), value);
            Ok(())
        }

        fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
            if name == "robot.coords" {
                self.calls.push((name.to_string(), args.to_vec()));
                return Ok(Value::List(vec![
                    Value::Number(100.0),
                    Value::Number(-50.0),
                    Value::Number(20.0),
                ]));
            }
            Err(ScriptError::Name(name.to_string()))
        }

        fn interrupted(&self) -> bool {
            let polls = self.polls.get() + 1;
            self.polls.set(polls);
            self.interrupt_after.is_some_and(|limit| polls > limit)
        }
    }

    fn eval(source: &str, scope: &mut MockScope) -> Result<Value> {
        evaluate(source, scope)
    }

    #[test]
    fn test_arithmetic() {
        let mut scope = MockScope::default();

        for (expression, expected) in [
            ("2 + 3", 5.0),
            ("10 - 4", 6.0),
            ("3 * 4", 12.0),
            ("15 / 3", 5.0),
            ("10 % 3", 1.0),
            ("(2 + 3) * 4", 20.0),
            ("2 + (3 * 4)", 14.0),
        ] {
            assert_eq!(
                eval(expression, &mut scope).unwrap(),
                Value::Number(expected)
            );
        }
    }

    #[test]
    fn test_comparison() {
        let mut scope = MockScope::default();

        for (expr_str, expected) in [
            ("5 > 3", true),
            ("5 < 3", false),
            ("5 >= 5", true),
            ("5 <= 4", false),
            ("5 == 5", true),
            ("5 != 3", true),
        ] {
            assert_eq!(
                eval(expr_str, &mut scope).unwrap(),
                Value::Boolean(expected)
            );
        }
    }

    #[test]
    fn test_boolean_spellings() {
        let mut scope = MockScope::default();

        for (expr_str, expected) in [
            ("true && true", true),
            ("true && false", false),
            ("true || false", true),
            ("!true", false),
            ("true AND true", true),
            ("true OR false", true),
            ("NOT false", true),
            ("True and not False", true),
            ("false or false", false),
        ] {
            assert_eq!(
                eval(expr_str, &mut scope).unwrap(),
                Value::Boolean(expected)
            );
        }
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let mut scope = MockScope::default();
        assert_eq!(
            eval("false and missing", &mut scope).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval("true or missing", &mut scope).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_variables_with_and_without_sigil() {
        let mut scope = MockScope::with(&[("x", Value::Number(10.0)), ("y", Value::Number(5.0))]);

        assert_eq!(eval("@x + @y", &mut scope).unwrap(), Value::Number(15.0));
        assert_eq!(eval("x + y", &mut scope).unwrap(), Value::Number(15.0));
        assert_eq!(
            eval("(x + y) * 2 > 20", &mut scope).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_errors() {
        let mut scope = MockScope::default();

        assert!(parse_expr("").is_err());
        assert!(parse_expr("2 +").is_err());
        assert!(parse_expr("(2 + 3").is_err());
        assert!(parse_expr("2 + 3)").is_err());

        let err = eval("10 / 0", &mut scope).unwrap_err();
        assert_eq!(err.kind(), "ZeroDivisionError");

        let err = eval("undefined", &mut scope).unwrap_err();
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn test_bare_logical_keywords_rejected() {
        for expr_str in ["and", "or", "not"] {
            assert!(parse_expr(expr_str).is_err());
        }
    }

    #[test]
    fn test_string_literals_single_quotes_rejected() {
        assert!(parse_expr("'hello'").is_err());
    }

    #[test]
    fn test_string_number_equality_rejected() {
        let mut scope = MockScope::default();
        assert!(eval("\"1\" == 1", &mut scope).is_err());
        assert!(eval("1 != \"1\"", &mut scope).is_err());
    }

    #[test]
    fn test_none_compares_with_anything() {
        let mut scope = MockScope::with(&[("target", Value::None)]);
        assert_eq!(
            eval("target == None", &mut scope).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval("target != 3", &mut scope).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_string_in_boolean_context_rejected() {
        let mut scope = MockScope::default();
        assert!(eval("!\"true\"", &mut scope).is_err());
        assert!(eval("\"true\" && true", &mut scope).is_err());
    }

    #[test]
    fn test_string_concatenation() {
        let mut scope = MockScope::with(&[("count", Value::Number(5.0))]);

        assert_eq!(
            eval("\"hello\" + \" world\"", &mut scope).unwrap(),
            Value::from("hello world")
        );
        assert_eq!(
            eval("\"items: \" + count", &mut scope).unwrap(),
            Value::from("items: 5")
        );
        assert_eq!(
            eval("\"flag: \" + true", &mut scope).unwrap(),
            Value::from("flag: true")
        );
        assert!(eval("5 + \"hello\"", &mut scope).is_err());
        assert!(eval("true + 5", &mut scope).is_err());
    }

    #[test]
    fn test_lists_and_indexing() {
        let mut scope = MockScope::default();
        assert_eq!(
            eval("[1, 2, 3][-1]", &mut scope).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            eval("len([1, 2] + [3])", &mut scope).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(eval("\"abc\"[1]", &mut scope).unwrap(), Value::from("b"));

        let err = eval("[1, 2][5]", &mut scope).unwrap_err();
        assert_eq!(err.kind(), "IndexError");
    }

    #[test]
    fn test_interpolation() {
        let mut scope = MockScope::with(&[
            ("name", Value::from("Alice")),
            ("x", Value::Number(5.0)),
            ("y", Value::Number(3.0)),
        ]);

        for (source, expected) in [
            ("\"Hello {name}\"", "Hello Alice"),
            ("\"Sum: {x + y}\"", "Sum: 8"),
            ("\"Result: { (x + y) * 2 }\"", "Result: 16"),
            ("\"{x}-{y}\"", "5-3"),
            ("\"Use {{}} for braces\"", "Use {} for braces"),
            ("\"Plain string\"", "Plain string"),
        ] {
            assert_eq!(eval(source, &mut scope).unwrap(), Value::from(expected));
        }

        assert!(parse_expr("\"Hello {x\"").is_err());
        assert!(parse_expr("\"Hello {}\"").is_err());
        assert!(eval("\"Hello {missing}\"", &mut scope).is_err());
    }

    #[test]
    fn test_render_template() {
        let mut scope = MockScope::with(&[("x", Value::Number(2.0))]);
        assert_eq!(
            render("x is {x}, doubled {x * 2}", &mut scope).unwrap(),
            "x is 2, doubled 4"
        );
    }

    #[test]
    fn test_builtins_and_constants() {
        let mut scope = MockScope::default();
        assert_eq!(
            eval("round(degrees(pi))", &mut scope).unwrap(),
            Value::Number(180.0)
        );
        assert_eq!(eval("abs(-4)", &mut scope).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_host_calls() {
        let mut scope = MockScope::default();
        assert_eq!(
            eval("robot.coords()[0]", &mut scope).unwrap(),
            Value::Number(100.0)
        );
        assert_eq!(scope.calls.len(), 1);

        let err = eval("os.system(\"ls\")", &mut scope).unwrap_err();
        assert_eq!(err.kind(), "NameError");
    }

    #[test]
    fn test_script_assignments_persist() {
        let mut scope = MockScope::default();
        execute("x = 1\ny = x + 1; z = [x, y]", &mut scope).unwrap();
        assert_eq!(scope.vars["y"], Value::Number(2.0));
        assert_eq!(
            scope.vars["z"],
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_script_control_flow() {
        let mut scope = MockScope::default();
        execute(
            "total = 0\ni = 0\nwhile i < 5 {\n  if i % 2 == 0 { total = total + i } else { total = total - 1 }\n  i = i + 1\n}",
            &mut scope,
        )
        .unwrap();
        assert_eq!(scope.vars["total"], Value::Number(4.0));
    }

    #[test]
    fn test_while_loop_observes_interruption() {
        let mut scope = MockScope {
            interrupt_after: Some(10),
            ..MockScope::default()
        };
        let err = execute("while true { x = 1 }", &mut scope).unwrap_err();
        assert_eq!(err, ScriptError::Interrupted);
    }

    #[test]
    fn test_script_error_stops_execution() {
        let mut scope = MockScope::default();
        let err = execute("a = 1\nb = a / 0\nc = 3", &mut scope).unwrap_err();
        assert_eq!(err.kind(), "ZeroDivisionError");
        assert!(scope.vars.contains_key("a"));
        assert!(!scope.vars.contains_key("c"));
    }
}
