//! SOP Pilot LLM
//!
//! Provides a unified interface for the model backends the reasoning
//! pipeline can run against:
//! - Any OpenAI-compatible HTTP endpoint (hosted or local)
//! - A scripted client for simulated runs and tests
//!
//! Also includes the shared request/response types and HTTP error mapping.

pub mod client;
pub mod http;
pub mod scripted;
pub mod types;

// Re-export main types
pub use client::{parse_http_error, ModelClient};
pub use http::HttpModelClient;
pub use scripted::ScriptedModelClient;
pub use types::*;
