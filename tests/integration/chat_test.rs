//! Chat Agent Integration Tests
//!
//! Exercises the conversational surface end to end through the engine:
//! validation before any stream is opened, token streaming with procedure
//! citations, the simulated fallback, and cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use sop_pilot::{
    ChatContext, EngineConfig, Frame, PipelineError, Procedure, ProcedureCatalog,
    ProcedureDataProvider, ReasoningEngine, ReasoningStep, StageRole, StreamRequest,
    StreamingTransport, TransportError, TransportMode, WorkItem,
};
use sop_pilot::transport::FrameStream;
use sop_pilot_core::EmptyProcedureSource;

// ============================================================================
// Fixtures
// ============================================================================

/// Transport that counts open attempts and serves an immediately-closed
/// stream. Lets tests assert that validation short-circuits before any
/// transport work happens.
#[derive(Default)]
struct SpyTransport {
    opens: AtomicUsize,
}

#[async_trait]
impl StreamingTransport for SpyTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Direct
    }

    async fn open(
        &self,
        _request: StreamRequest,
        _cancel: CancellationToken,
    ) -> Result<FrameStream, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (_tx, rx) = mpsc::channel::<Frame>(1);
        Ok(ReceiverStream::new(rx))
    }
}

fn duplicate_catalog() -> ProcedureCatalog {
    let mut catalog = ProcedureCatalog::default();
    catalog.scenario_index.insert(
        "duplicate".to_string(),
        Procedure {
            title: "SOP 4.7 — Duplicate Submission Handling".to_string(),
            steps: vec!["Locate the original submission".to_string()],
            ..Default::default()
        },
    );
    catalog
}

fn duplicate_context() -> ChatContext {
    let mut item = WorkItem::new("CLM-2024-0187", "Pending Review");
    item.scenario = Some("duplicate".to_string());
    ChatContext::new(item).with_steps(vec![ReasoningStep::new(
        StageRole::Analysis,
        "Analyzing item metadata and codes",
        0.92,
    )])
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_blank_message_fails_before_any_stream_opens() {
    let spy = Arc::new(SpyTransport::default());
    let engine = ReasoningEngine::with_transport(
        spy.clone(),
        Arc::new(EmptyProcedureSource),
        EngineConfig::direct(),
    );

    let err = engine
        .send("   \t ", ChatContext::new(WorkItem::new("C-1", "Review")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(spy.opens.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Direct chat
// ============================================================================

#[tokio::test]
async fn test_direct_chat_streams_tokens_and_cites_scenario_procedure() {
    let provider = Arc::new(ProcedureDataProvider::new(duplicate_catalog()));
    let engine = ReasoningEngine::new(EngineConfig::direct(), provider).unwrap();

    let mut streamed = String::new();
    let response = engine
        .send_with("Why was this flagged?", duplicate_context(), |token| {
            streamed.push_str(token)
        })
        .await
        .unwrap();

    assert_eq!(streamed, response.text);
    assert!(response.text.contains("Why was this flagged?"));
    // The scenario procedure from the grounding prompt is the one cited.
    assert_eq!(response.referenced_procedures, vec!["SOP 4.7"]);
    assert_eq!(response.suggestions.len(), 3);
    assert_eq!(response.suggestions[0], "What SOPs apply to this item?");
    assert!(response.simulated);
}

// ============================================================================
// Fallback and cancellation
// ============================================================================

#[tokio::test]
async fn test_chat_falls_back_when_remote_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let engine = ReasoningEngine::new(
        EngineConfig::remote(base),
        Arc::new(ProcedureDataProvider::new(duplicate_catalog())),
    )
    .unwrap();

    let response = engine
        .send("What should I check first?", duplicate_context())
        .await
        .unwrap();

    assert!(response.simulated);
    assert!(!response.text.is_empty());
}

#[tokio::test]
async fn test_precancelled_chat_reports_cancelled() {
    let engine =
        ReasoningEngine::new(EngineConfig::direct(), Arc::new(EmptyProcedureSource)).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .send_controlled(
            "hello",
            ChatContext::new(WorkItem::new("C-1", "Review")),
            |_| {},
            cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}
