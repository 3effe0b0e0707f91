use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("{0}")]
    Syntax(String),

    #[error("name '{0}' is not defined")]
    Name(String),

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Value(String),

    #[error("division by zero")]
    ZeroDivision,

    #[error("index {index} out of range for length {len}")]
    Index { index: i64, len: usize },

    #[error("{0}")]
    Capability(String),

    #[error("evaluation interrupted")]
    Interrupted,
}

impl ScriptError {
    /// Stable name of the error class, used as the key when a fault is reported.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "SyntaxError",
            Self::Name(_) => "NameError",
            Self::Type(_) => "TypeError",
            Self::Value(_) => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Index { .. } => "IndexError",
            Self::Capability(_) => "CapabilityError",
            Self::Interrupted => "Interrupted",
        }
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
