use std::sync::atomic::{AtomicIsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::constants::CoreConstants;

/// Which event and command the worker is on. `-1` means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub event_index: isize,
    pub command_index: isize,
}

impl Status {
    pub const IDLE: Self = Self {
        event_index: CoreConstants::NOT_RUNNING,
        command_index: CoreConstants::NOT_RUNNING,
    };

    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::IDLE
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Position counters written by the worker and read by anyone.
#[derive(Debug)]
pub struct ExecutionState {
    event_index: AtomicIsize,
    command_index: AtomicIsize,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            event_index: AtomicIsize::new(CoreConstants::NOT_RUNNING),
            command_index: AtomicIsize::new(CoreConstants::NOT_RUNNING),
        }
    }

    pub fn set_event(&self, index: usize) {
        self.event_index.store(to_index(index), Ordering::Release);
        self.command_index
            .store(CoreConstants::NOT_RUNNING, Ordering::Release);
    }

    pub fn set_command(&self, index: usize) {
        self.command_index.store(to_index(index), Ordering::Release);
    }

    pub fn reset(&self) {
        self.event_index
            .store(CoreConstants::NOT_RUNNING, Ordering::Release);
        self.command_index
            .store(CoreConstants::NOT_RUNNING, Ordering::Release);
    }

    #[must_use]
    pub fn snapshot(&self) -> Status {
        Status {
            event_index: self.event_index.load(Ordering::Acquire),
            command_index: self.command_index.load(Ordering::Acquire),
        }
    }
}

fn to_index(index: usize) -> isize {
    isize::try_from(index).unwrap_or(isize::MAX)
}
