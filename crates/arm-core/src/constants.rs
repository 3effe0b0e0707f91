pub struct CoreConstants;

impl CoreConstants {
    pub const TICK_RATE_HZ: f64 = 30.0;
    pub const POLL_INTERVAL_MS: u64 = 50;
    pub const MAX_CALL_DEPTH: usize = 16;
    pub const FRAME_TIMEOUT_MS: u64 = 2000;

    pub const NOT_RUNNING: isize = -1;
    pub const RUN_ID_LENGTH: usize = 8;
    pub const ENGINE_THREAD_NAME: &'static str = "arm-engine";
    pub const SYSTEM_ACTIVITY: &'static str = "SYSTEM";
}

pub struct CommandDefaults;

impl CommandDefaults {
    pub const MOVE_WAIT: bool = true;
    pub const RECORDING_SPEED: f64 = 1.0;
    pub const OBJECT_MAX_AGE_SECS: f64 = 0.5;
    pub const FRAMES: u32 = 1;
}

pub struct CompileMessages;

impl CompileMessages {
    pub const UNKNOWN_COMMAND: &'static str = "Unknown command type";
    pub const UNKNOWN_EVENT: &'static str = "Unknown event type";
    pub const INVALID_PARAMETERS: &'static str = "Invalid parameters";
    pub const UNBALANCED_BLOCKS: &'static str = "Unbalanced blocks";
    pub const DUPLICATE_EVENT: &'static str = "Duplicate event";
    pub const INVALID_VARIABLE: &'static str = "Invalid variable name";
}
