//! Domain error types.

use crate::domain::trade::TradeId;

/// A parse error with position information for the action script grammar.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for replaylab.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Rejected input: bad bracket ordering, non-positive quantity,
    /// out-of-range seek, non-monotonic bar series, zero speed/interval.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Closing an unknown or already-closed trade id. The ledger is unchanged.
    #[error("trade {id} not found among open trades")]
    TradeNotFound { id: TradeId },

    /// Playback attempted against a series with zero bars.
    #[error("bar series is empty")]
    EmptySeries,

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("store error: {reason}")]
    Store { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    ScriptParse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ReplayError> for std::process::ExitCode {
    fn from(err: &ReplayError) -> Self {
        let code: u8 = match err {
            ReplayError::Io(_) => 1,
            ReplayError::ConfigParse { .. }
            | ReplayError::ConfigMissing { .. }
            | ReplayError::ConfigInvalid { .. } => 2,
            ReplayError::Data { .. } | ReplayError::Store { .. } => 3,
            ReplayError::ScriptParse(_) => 4,
            ReplayError::Validation { .. }
            | ReplayError::TradeNotFound { .. }
            | ReplayError::EmptySeries => 5,
        };
        std::process::ExitCode::from(code)
    }
}
