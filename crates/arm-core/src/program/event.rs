use serde::{Deserialize, Serialize};

use crate::capabilities::Environment;
use crate::constants::{CommandDefaults, CompileMessages};
use crate::context::RunHandles;
use crate::program::command::Command;
use crate::validation::block_depths;

const fn default_max_age() -> f64 {
    CommandDefaults::OBJECT_MAX_AGE_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters")]
pub enum EventKind {
    /// Fires once, on the first tick of a run.
    Init {},
    /// Fires on every tick.
    Step {},
    /// Fires once per press of `key`.
    Keypress { key: String },
    /// Fires when the tip switch goes from released to pressed.
    Tip {},
    /// Fires when the robot starts (`moving: true`) or stops moving.
    Motion { moving: bool },
    /// Fires on every tick while `object` was recognized within `max_age` seconds.
    RecognizeObject {
        object: String,
        #[serde(rename = "maxAge", default = "default_max_age")]
        max_age: f64,
    },
}

impl EventKind {
    pub const TYPE_NAMES: &'static [&'static str] =
        &["Init", "Step", "Keypress", "Tip", "Motion", "RecognizeObject"];

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Init {} => "Init",
            Self::Step {} => "Step",
            Self::Keypress { .. } => "Keypress",
            Self::Tip {} => "Tip",
            Self::Motion { .. } => "Motion",
            Self::RecognizeObject { .. } => "RecognizeObject",
        }
    }

    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self, Self::Init {})
    }

    fn requirements(&self, env: &Environment) -> Vec<String> {
        match self {
            Self::Tip {} | Self::Motion { .. } => {
                env.robot().err().map(|err| err.to_string()).into_iter().collect()
            }
            Self::RecognizeObject { object, .. } => {
                if let Err(err) = env.vision() {
                    return vec![err.to_string()];
                }
                match env.objects() {
                    Ok(objects) if objects.is_trackable(object) => Vec::new(),
                    Ok(_) => vec![format!("Resource not found: {object}")],
                    Err(err) => vec![err.to_string()],
                }
            }
            Self::Init {} | Self::Step {} | Self::Keypress { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Trigger {
    fired: bool,
    last_level: Option<bool>,
}

impl Trigger {
    const fn rising(&mut self, level: bool) -> bool {
        let previous = match self.last_level {
            Some(previous) => previous,
            None => false,
        };
        self.last_level = Some(level);
        level && !previous
    }

    /// True when the level changed to `wanted`. The first sample only primes.
    const fn changed_to(&mut self, level: bool, wanted: bool) -> bool {
        let changed = match self.last_level {
            Some(previous) => previous != level,
            None => false,
        };
        self.last_level = Some(level);
        changed && level == wanted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    commands: Vec<Command>,
    errors: Vec<String>,
    disabled: Option<String>,
    trigger: Trigger,
}

impl Event {
    #[must_use]
    pub fn new(kind: EventKind, commands: Vec<Command>, env: &Environment) -> Self {
        let errors = kind.requirements(env);
        Self {
            kind,
            commands,
            errors,
            disabled: None,
            trigger: Trigger::default(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &EventKind {
        &self.kind
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Why the event will never fire, if it was disabled at build time.
    #[must_use]
    pub fn disabled_reason(&self) -> Option<&str> {
        self.disabled.as_deref()
    }

    /// Sets each command's indent from the block structure, or disables the
    /// event when the blocks do not balance.
    pub(crate) fn assign_block_depths(&mut self) {
        match block_depths(&self.commands) {
            Ok(depths) => {
                for (command, depth) in self.commands.iter_mut().zip(depths) {
                    command.set_indent(depth);
                }
            }
            Err(err) => {
                log::warn!("{} event disabled: {err}", self.type_name());
                self.disable(CompileMessages::UNBALANCED_BLOCKS);
            }
        }
    }

    pub(crate) fn disable(&mut self, reason: &str) {
        self.disabled = Some(reason.to_string());
    }

    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.disabled.is_none() && self.errors.is_empty()
    }

    #[must_use]
    pub const fn has_fired(&self) -> bool {
        self.trigger.fired
    }

    pub(crate) fn reset_trigger(&mut self) {
        self.trigger = Trigger::default();
    }

    /// Samples the trigger condition. Edge-triggered kinds remember the last
    /// sample, so this must be called once per tick.
    pub fn is_active(&mut self, handles: &RunHandles) -> bool {
        if !self.is_runnable() {
            return false;
        }

        let env = &handles.env;
        let active = match &self.kind {
            EventKind::Init {} => !self.trigger.fired,
            EventKind::Step {} => true,
            EventKind::Keypress { key } => handles.keys.take(key),
            EventKind::Tip {} => {
                let pressed = env.robot().is_ok_and(|robot| robot.tip_pressed());
                self.trigger.rising(pressed)
            }
            EventKind::Motion { moving } => {
                let level = env.robot().is_ok_and(|robot| robot.is_moving());
                self.trigger.changed_to(level, *moving)
            }
            EventKind::RecognizeObject { object, max_age } => env
                .vision()
                .ok()
                .and_then(|vision| vision.recognition(object))
                .is_some_and(|r| r.age.as_secs_f64() <= *max_age),
        };

        if active {
            self.trigger.fired = true;
        }
        active
    }
}
