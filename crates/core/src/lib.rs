//! SOP Pilot Core
//!
//! Shared data model, procedure-provider facade, and wire framing for the
//! SOP Pilot workspace. This crate has zero dependencies on runtime code
//! (async executors, HTTP clients, model providers, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Pipeline error taxonomy (`PipelineError`, `PipelineResult`)
//! - `item` - Normalized work item (`WorkItem`)
//! - `step` - Stage roles, steps, recommendation, and run results
//! - `procedure` - Procedure entries and the two-index catalogue
//! - `provider` - Read-only lookup facade (`ProcedureSource`)
//! - `chat` - Chat context, turns, and responses
//! - `streaming` - Wire frames and the incremental frame decoder
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/thiserror/chrono** - keeps build times minimal
//! 2. **Trait-based provider seam** - any vertical can supply a partial catalogue safely
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod chat;
pub mod error;
pub mod item;
pub mod procedure;
pub mod provider;
pub mod step;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{PipelineError, PipelineResult};

// ── Work Items ─────────────────────────────────────────────────────────
pub use item::WorkItem;

// ── Stages & Results ───────────────────────────────────────────────────
pub use step::{
    ModelInfo, ReasoningResult, ReasoningStep, Recommendation, RecommendedAction, Resolution,
    StageRole, DEFAULT_TIMELINE, ESCALATION_CONFIDENCE_THRESHOLD,
};

// ── Procedures & Providers ─────────────────────────────────────────────
pub use procedure::{DenialCode, Procedure, ProcedureCatalog};
pub use provider::{EmptyProcedureSource, ProcedureDataProvider, ProcedureSource};

// ── Chat ───────────────────────────────────────────────────────────────
pub use chat::{ChatContext, ChatResponse, ChatRole, ChatTurn};

// ── Wire Framing ───────────────────────────────────────────────────────
pub use streaming::{Frame, FrameDecoder, FrameError, DATA_PREFIX};
