//! SOP Pilot - Reasoning Engine Library
//!
//! Streaming, confidence-scored reasoning over work items, guided by each
//! solution's Standard Operating Procedures. It includes:
//! - The four-stage reasoning pipeline and its orchestrator
//! - A chat agent grounded in the analyzed item and its reasoning steps
//! - Dual-mode streaming transport (in-process and remote server)
//! - Solution adapters sharing the one pipeline across five verticals

pub mod adapters;
pub mod chat;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod transport;

// Re-export the caller-facing surface
pub use adapters::{solutions, FieldMap, SolutionAdapter};
pub use chat::ChatAgent;
pub use config::{EngineConfig, RemoteConfig, SolutionLabels, StagePolicy, TransportMode};
pub use engine::ReasoningEngine;
pub use pipeline::{Orchestrator, STRATEGY};
pub use transport::{
    build_transport, FrameStream, StreamRequest, StreamingTransport, TransportError,
};

// Re-export the types almost every caller touches
pub use sop_pilot_core::{
    ChatContext, ChatResponse, ChatTurn, DenialCode, Frame, ModelInfo, PipelineError,
    PipelineResult, Procedure, ProcedureCatalog, ProcedureDataProvider, ProcedureSource,
    ReasoningResult, ReasoningStep, Recommendation, RecommendedAction, Resolution, StageRole,
    WorkItem,
};
pub use sop_pilot_llm::{ModelClient, ModelConfig};
