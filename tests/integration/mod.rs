//! Integration Tests Module
//!
//! End-to-end tests for the reasoning engine: full pipeline runs, the remote
//! frame protocol and its failure modes, chat flows over both transports,
//! and the solution adapters that share one pipeline across verticals.

// Full pipeline runs: ordering, citation precedence, degradation, cancellation
mod pipeline_test;

// Remote transport: framing, stalls, early closes, simulated fallback
mod transport_test;

// Chat agent flows and validation fast-fail
mod chat_test;

// Solution adapter field mapping and cross-vertical equivalence
mod adapter_test;
