//! Model Client Types
//!
//! Core types for language-model interactions: request/response shapes,
//! client configuration, and the error taxonomy the retry logic keys off.

use serde::{Deserialize, Serialize};

/// Configuration for a model client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name to request
    #[serde(default = "default_model")]
    pub model: String,
    /// API key, if the endpoint requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Base sampling temperature; stages override this per call
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// HTTP request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Plain-text content
    pub content: String,
}

impl Message {
    /// Create a message with an explicit role
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }
}

/// Per-request options overriding the client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestOptions {
    /// Temperature override for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Max-token override for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Pipeline stage tag, when the call belongs to a stage.
    /// Scripted clients key their canned output off this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// One completion request: the conversation plus per-call options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            options: RequestOptions::default(),
        }
    }

    /// Tag the request with the stage it serves.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.options.stage = Some(stage.into());
        self
    }

    /// Override the sampling temperature for this call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Response from a model client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Full text of the response
    pub content: String,
    /// The model that generated the response
    pub model: String,
    /// Token usage, when the endpoint reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Error types for model operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelError {
    /// Authentication failed (invalid API key)
    AuthenticationFailed { message: String },
    /// Rate limit exceeded
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    /// Model not found or not available
    ModelNotFound { model: String },
    /// Invalid request (bad parameters)
    InvalidRequest { message: String },
    /// Server error from the provider
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error
    NetworkError { message: String },
    /// Response parsing error
    ParseError { message: String },
    /// Call exceeded its deadline
    Timeout { message: String },
    /// Other error
    Other { message: String },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            ModelError::RateLimited { message, .. } => {
                write!(f, "Rate limited: {}", message)
            }
            ModelError::ModelNotFound { model } => {
                write!(f, "Model not found: {}", model)
            }
            ModelError::InvalidRequest { message } => {
                write!(f, "Invalid request: {}", message)
            }
            ModelError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            ModelError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            ModelError::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            ModelError::Timeout { message } => {
                write!(f, "Timeout: {}", message)
            }
            ModelError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for ModelError {}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;
