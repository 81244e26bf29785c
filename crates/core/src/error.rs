//! Core Error Types
//!
//! Defines the error taxonomy shared across the SOP Pilot workspace. These
//! types are dependency-free (thiserror + std + serde_json) so the core crate
//! stays lightweight.
//!
//! The split matters to callers: `Validation` surfaces synchronously and never
//! reaches a transport; `StreamIncomplete` and `Cancelled` are terminal states
//! distinct from a degraded-but-usable result, which is reported through
//! `ReasoningResult::degraded` rather than through an error.

use thiserror::Error;

/// Error type for pipeline, chat, and transport operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input rejected before any call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// A reasoning stage's model call failed after its retry budget
    #[error("Stage '{stage}' failed after {attempts} attempt(s): {message}")]
    StageFailure {
        stage: String,
        attempts: u32,
        message: String,
    },

    /// Transport-level failure (connection, protocol, terminal error frame)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The stream closed before a terminal frame was observed
    #[error("Stream incomplete: {0}")]
    StreamIncomplete(String),

    /// The caller cancelled the run
    #[error("Run cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors (catalogue loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for pipeline errors
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a stage failure error
    pub fn stage_failure(stage: impl Into<String>, attempts: u32, msg: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            attempts,
            message: msg.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a stream-incomplete error
    pub fn stream_incomplete(msg: impl Into<String>) -> Self {
        Self::StreamIncomplete(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the error represents a closed-before-terminal stream
    pub fn is_stream_incomplete(&self) -> bool {
        matches!(self, Self::StreamIncomplete(_))
    }
}

/// Convert PipelineError to a string
impl From<PipelineError> for String {
    fn from(err: PipelineError) -> String {
        err.to_string()
    }
}
