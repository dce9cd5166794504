use serde::Serialize;

/// Why a candidate credential was refused admission to the pool.
///
/// The leading word of each message (`empty`, `too short`, `wrong prefix`)
/// is stable so callers can match on it or show it verbatim.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FormatRejection {
    #[error("empty: credential must not be blank")]
    Empty,

    #[error("too short: expected at least {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("wrong prefix: credential should start with '{expected}'")]
    WrongPrefix { expected: String },
}

impl FormatRejection {
    /// Short machine-friendly reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooShort { .. } => "too short",
            Self::WrongPrefix { .. } => "wrong prefix",
        }
    }
}
