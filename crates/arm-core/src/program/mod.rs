pub mod command;
pub mod event;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::capabilities::Environment;
use crate::constants::CompileMessages;
use crate::error::{ErrorBag, Result};
use crate::log::Logger;

pub use command::{Axis, Command, CommandKind, Comparison, Expression};
pub use event::{Event, EventKind};

pub type Parameters = Map<String, JsonValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub command_list: Vec<CommandRecord>,
}

/// A saved program. Files may also hold a bare list of event records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl ProgramFile {
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Self>(json) {
            Ok(file) => Ok(file),
            Err(err) => serde_json::from_str::<Vec<EventRecord>>(json)
                .map(|events| Self {
                    name: String::new(),
                    events,
                })
                .map_err(|_| err.into()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut file = Self::from_json(&json)?;
        if file.name.is_empty() {
            file.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(kind: &str, parameters: &Parameters) -> serde_json::Result<T> {
    let mut tagged = Map::new();
    tagged.insert("type".to_string(), JsonValue::String(kind.to_string()));
    tagged.insert(
        "parameters".to_string(),
        JsonValue::Object(parameters.clone()),
    );
    serde_json::from_value(JsonValue::Object(tagged))
}

fn encode<T: Serialize>(value: &T) -> Result<(String, Parameters)> {
    let JsonValue::Object(mut tagged) = serde_json::to_value(value)? else {
        return Ok((String::new(), Parameters::new()));
    };
    let kind = match tagged.remove("type") {
        Some(JsonValue::String(kind)) => kind,
        _ => String::new(),
    };
    let parameters = match tagged.remove("parameters") {
        Some(JsonValue::Object(parameters)) => parameters,
        _ => Parameters::new(),
    };
    Ok((kind, parameters))
}

/// Built, validated events ready to be scheduled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    events: Vec<Event>,
}

impl Program {
    /// Builds a program from records. Problems are collected in the returned
    /// bag rather than aborting the build. Unknown or malformed commands stay in
    /// place as commands that always fail. Unknown events are left out, and
    /// events with unbalanced blocks or repeated kinds are disabled.
    #[must_use]
    pub fn build(records: &[EventRecord], env: &Environment) -> (Self, ErrorBag) {
        let mut errors = ErrorBag::new();
        let mut events: Vec<Event> = Vec::with_capacity(records.len());

        for record in records {
            let kind = if EventKind::TYPE_NAMES.contains(&record.kind.as_str()) {
                match decode::<EventKind>(&record.kind, &record.parameters) {
                    Ok(kind) => kind,
                    Err(err) => {
                        log::warn!("invalid parameters for event {}: {err}", record.kind);
                        errors.add(CompileMessages::INVALID_PARAMETERS, record.kind.as_str());
                        continue;
                    }
                }
            } else {
                log::warn!("unknown event type: {}", record.kind);
                errors.add(CompileMessages::UNKNOWN_EVENT, record.kind.as_str());
                continue;
            };

            let commands = build_commands(&record.command_list, env);
            let mut event = Event::new(kind, commands, env);
            event.assign_block_depths();

            for message in event.errors() {
                errors.add(message.as_str(), event.type_name());
            }
            for command in event.commands() {
                for message in command.errors() {
                    errors.add(message.as_str(), command.type_name());
                }
            }

            if events.iter().any(|existing| existing.kind() == event.kind()) {
                log::warn!("duplicate {} event disabled", event.type_name());
                errors.add(CompileMessages::DUPLICATE_EVENT, event.type_name());
                event.disable(CompileMessages::DUPLICATE_EVENT);
            } else if event.disabled_reason().is_some() {
                errors.add(CompileMessages::UNBALANCED_BLOCKS, event.type_name());
            }

            events.push(event);
        }

        (Self { events }, errors)
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True once nothing is left that could ever fire: every runnable event
    /// is one-shot and has already fired.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.events
            .iter()
            .filter(|event| event.is_runnable())
            .all(|event| event.kind().is_one_shot() && event.has_fired())
    }

    pub(crate) fn reset_triggers(&mut self) {
        for event in &mut self.events {
            event.reset_trigger();
        }
    }

    pub(crate) fn start_tracking(&self, env: &Environment, logger: &Logger) {
        let Ok(vision) = env.vision() else {
            return;
        };
        for event in self.events.iter().filter(|event| event.is_runnable()) {
            let EventKind::RecognizeObject { object, .. } = event.kind() else {
                continue;
            };
            if let Err(err) = vision.start_tracking(object) {
                logger.warn(event.type_name(), format!("Cannot track '{object}': {err}"));
            }
        }
    }

    /// Serializes the program back into records.
    pub fn to_records(&self) -> Result<Vec<EventRecord>> {
        self.events
            .iter()
            .map(|event| {
                let (kind, parameters) = encode(event.kind())?;
                let command_list = event
                    .commands()
                    .iter()
                    .map(|command| match command.kind() {
                        CommandKind::Invalid { record } => Ok(record.clone()),
                        kind => encode(kind)
                            .map(|(kind, parameters)| CommandRecord { kind, parameters }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(EventRecord {
                    kind,
                    parameters,
                    command_list,
                })
            })
            .collect()
    }
}

fn build_commands(records: &[CommandRecord], env: &Environment) -> Vec<Command> {
    records
        .iter()
        .map(|record| {
            if !CommandKind::TYPE_NAMES.contains(&record.kind.as_str()) {
                log::warn!("unknown command type: {}", record.kind);
                return Command::invalid(record.clone(), CompileMessages::UNKNOWN_COMMAND);
            }
            match decode::<CommandKind>(&record.kind, &record.parameters) {
                Ok(kind) => Command::new(kind, env),
                Err(err) => {
                    log::warn!("invalid parameters for command {}: {err}", record.kind);
                    Command::invalid(record.clone(), CompileMessages::INVALID_PARAMETERS)
                }
            }
        })
        .collect()
}
