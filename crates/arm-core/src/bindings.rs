//! Capability functions exposed to scripts as dotted calls.

use arm_script::{Result, ScriptError, Value, ValueExt};

use crate::capabilities::{CapabilityError, Coords};
use crate::namespace::Namespace;
use crate::utils::{WaitOutcome, wait_until};

impl From<CapabilityError> for ScriptError {
    fn from(error: CapabilityError) -> Self {
        Self::Capability(error.to_string())
    }
}

pub fn call(ns: &Namespace, name: &str, args: &[Value]) -> Result<Value> {
    let env = ns.env();
    match name {
        "robot.connected" => {
            arity(name, args, 0)?;
            Ok(Value::Boolean(env.robot().is_ok()))
        }
        "robot.coords" => {
            arity(name, args, 0)?;
            let Coords { x, y, z } = env.robot()?.coords();
            Ok(numbers(&[x, y, z]))
        }
        "robot.move_to" => {
            arity(name, args, 3)?;
            let target = Coords::new(
                args[0].to_number()?,
                args[1].to_number()?,
                args[2].to_number()?,
            );
            env.robot()?.set_coords(target)?;
            Ok(Value::None)
        }
        "robot.wrist" => {
            arity(name, args, 0)?;
            Ok(Value::Number(env.robot()?.wrist()))
        }
        "robot.set_wrist" => {
            arity(name, args, 1)?;
            env.robot()?.set_wrist(args[0].to_number()?)?;
            Ok(Value::None)
        }
        "robot.gripper" => match args {
            [] => Ok(Value::Boolean(env.robot()?.gripper_closed())),
            [closed] => {
                env.robot()?.set_gripper(closed.to_bool()?)?;
                Ok(Value::None)
            }
            _ => Err(ScriptError::type_error(
                "robot.gripper() takes 0 or 1 arguments",
            )),
        },
        "robot.buzzer" => {
            arity(name, args, 2)?;
            env.robot()?
                .buzz(args[0].to_number()?, args[1].to_number()?)?;
            Ok(Value::None)
        }
        "robot.is_moving" => {
            arity(name, args, 0)?;
            Ok(Value::Boolean(env.robot()?.is_moving()))
        }
        "robot.tip" => {
            arity(name, args, 0)?;
            Ok(Value::Boolean(env.robot()?.tip_pressed()))
        }
        "vision.connected" => {
            arity(name, args, 0)?;
            Ok(Value::Boolean(env.vision().is_ok()))
        }
        "vision.seen" => {
            let (object, max_age) = match args {
                [object] => (object, None),
                [object, max_age] => (object, Some(max_age.to_number()?)),
                _ => {
                    return Err(ScriptError::type_error(
                        "vision.seen() takes 1 or 2 arguments",
                    ));
                }
            };
            let recognition = env.vision()?.recognition(&text(object)?);
            Ok(Value::Boolean(recognition.is_some_and(|r| {
                max_age.is_none_or(|limit| r.age.as_secs_f64() <= limit)
            })))
        }
        "vision.center" => {
            arity(name, args, 1)?;
            Ok(env
                .vision()?
                .recognition(&text(&args[0])?)
                .map_or(Value::None, |r| numbers(&[r.center.0, r.center.1])))
        }
        "vision.frame" => {
            arity(name, args, 0)?;
            #[allow(clippy::cast_precision_loss)]
            let frame = env.vision()?.frame_count() as f64;
            Ok(Value::Number(frame))
        }
        "vision.wait_for_frame" => {
            arity(name, args, 0)?;
            let vision = env.vision()?;
            let start = vision.frame_count();
            let outcome = wait_until(ns.stop(), Some(ns.frame_timeout()), ns.poll(), || {
                vision.frame_count() > start
            });
            match outcome {
                WaitOutcome::Satisfied => Ok(Value::Boolean(true)),
                WaitOutcome::TimedOut => Ok(Value::Boolean(false)),
                WaitOutcome::Stopped => Err(ScriptError::Interrupted),
            }
        }
        "resources.exists" => {
            arity(name, args, 1)?;
            Ok(Value::Boolean(env.objects()?.exists(&text(&args[0])?)))
        }
        "resources.names" => {
            arity(name, args, 0)?;
            Ok(Value::List(
                env.objects()?
                    .names()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ))
        }
        "settings.get" => match args {
            [key] => Ok(env.setting(&text(key)?).map_or(Value::None, |v| json_to_value(&v))),
            [key, fallback] => Ok(env
                .setting(&text(key)?)
                .map_or_else(|| fallback.clone(), |v| json_to_value(&v))),
            _ => Err(ScriptError::type_error(
                "settings.get() takes 1 or 2 arguments",
            )),
        },
        _ => Err(ScriptError::Name(name.to_string())),
    }
}

/// Converts a settings value. Objects have no script counterpart and are
/// passed through as their JSON text.
#[must_use]
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => n.as_f64().map_or(Value::None, Value::Number),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(_) => Value::String(json.to_string()),
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ScriptError::type_error(format!(
            "{name}() takes {expected} argument(s) ({} given)",
            args.len()
        )))
    }
}

fn text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ScriptError::type_error(format!(
            "expected a String, got {}",
            other.get_type().as_str()
        ))),
    }
}

fn numbers(values: &[f64]) -> Value {
    Value::List(values.iter().copied().map(Value::Number).collect())
}
