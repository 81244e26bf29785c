//! Model Client Trait
//!
//! Defines the common interface every model backend implements: the HTTP
//! client for a real endpoint and the scripted client for demo mode and the
//! simulated fallback.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{Completion, CompletionRequest, ModelError, ModelResult};

/// Trait that all model clients must implement.
///
/// Provides a unified interface for:
/// - Single-shot completions (complete)
/// - Streaming completions (stream_completion)
/// - Health checking
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the client name for identification.
    fn name(&self) -> &'static str;

    /// Returns the model being served.
    fn model(&self) -> &str;

    /// Run a request to completion and return the full response.
    async fn complete(&self, request: CompletionRequest) -> ModelResult<Completion>;

    /// Stream a completion, sending text chunks through `tx` as they arrive.
    ///
    /// Chunks are forwarded in arrival order; the final response is returned
    /// once the stream ends. A closed receiver is not an error: the client
    /// keeps consuming so the returned completion is still whole.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<String>,
    ) -> ModelResult<Completion>;

    /// Check whether the backing endpoint is reachable.
    ///
    /// Unreachable is an answer, not a failure: clients report it as
    /// `Ok(false)` so probing never errors the process.
    async fn health_check(&self) -> ModelResult<bool>;
}

/// Helper function to classify HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> ModelError {
    match status {
        401 => ModelError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => ModelError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => ModelError::ModelNotFound {
            model: body.to_string(),
        },
        429 => ModelError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => ModelError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => ModelError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => ModelError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
