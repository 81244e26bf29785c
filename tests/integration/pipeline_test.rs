//! Reasoning Pipeline Integration Tests
//!
//! Full runs through the direct transport: stage ordering and confidence
//! bounds, procedure citation precedence (scenario over status), degraded
//! completion when the model keeps failing, and cancellation mid-run.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sop_pilot::transport::direct::DirectTransport;
use sop_pilot::{
    DenialCode, EngineConfig, PipelineError, Procedure, ProcedureCatalog, ProcedureDataProvider,
    ReasoningEngine, RecommendedAction, Resolution, SolutionLabels, StagePolicy, StageRole,
    WorkItem, STRATEGY,
};
use sop_pilot_llm::{Completion, CompletionRequest, ModelClient, ModelError, ModelResult};

// ============================================================================
// Fixtures
// ============================================================================

fn sample_catalog() -> ProcedureCatalog {
    let mut catalog = ProcedureCatalog::default();
    catalog.status_index.insert(
        "Pending Review".to_string(),
        Procedure {
            title: "SOP 3.1 — Pending Review Resolution".to_string(),
            steps: vec![
                "Verify member eligibility".to_string(),
                "Check coding alignment".to_string(),
            ],
            ..Default::default()
        },
    );
    catalog.status_index.insert(
        "Information Needed".to_string(),
        Procedure {
            title: "SOP 2.4 — Information Request Follow-up".to_string(),
            steps: vec![
                "Identify the missing documents".to_string(),
                "Notify the submitter".to_string(),
            ],
            ..Default::default()
        },
    );
    catalog.scenario_index.insert(
        "duplicate".to_string(),
        Procedure {
            title: "SOP 4.7 — Duplicate Submission Handling".to_string(),
            steps: vec![
                "Locate the prior submission".to_string(),
                "Compare line items".to_string(),
            ],
            denial_codes: vec![DenialCode {
                code: "CO-18".to_string(),
                description: "Duplicate claim/service".to_string(),
            }],
            ..Default::default()
        },
    );
    catalog
}

fn simulated_engine() -> ReasoningEngine {
    ReasoningEngine::new(
        EngineConfig::direct(),
        Arc::new(ProcedureDataProvider::new(sample_catalog())),
    )
    .unwrap()
}

/// Model client whose every call fails with a transient network error.
#[derive(Default)]
struct UnreachableModel {
    calls: AtomicU32,
}

#[async_trait]
impl ModelClient for UnreachableModel {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn model(&self) -> &str {
        "unreachable-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> ModelResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::NetworkError {
            message: "connection reset".to_string(),
        })
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        _tx: mpsc::Sender<String>,
    ) -> ModelResult<Completion> {
        self.complete(request).await
    }

    async fn health_check(&self) -> ModelResult<bool> {
        Ok(false)
    }
}

// ============================================================================
// Stage ordering and scoring
// ============================================================================

#[tokio::test]
async fn test_run_produces_four_steps_in_stage_order() {
    let engine = simulated_engine();
    let mut observed = Vec::new();
    let result = engine
        .run_with(WorkItem::new("CLM-2024-0001", "Pending Review"), |step| {
            observed.push(step.role);
        })
        .await
        .unwrap();

    assert_eq!(observed, StageRole::ALL.to_vec());
    assert!(result.is_complete());
    for (step, role) in result.steps.iter().zip(StageRole::ALL) {
        assert_eq!(step.role, role);
        assert!(
            (0.0..=1.0).contains(&step.confidence),
            "confidence {} out of range",
            step.confidence
        );
        assert!(!step.text.is_empty());
    }
    assert!(result.simulated);
    assert!(!result.degraded);
    assert!(!result.run_id.is_empty());
    assert!(result.started_at.is_some());
    assert!(result.completed_at.is_some());

    let info = result.model_info.expect("model info");
    assert_eq!(info.strategy, STRATEGY);
}

#[tokio::test]
async fn test_clean_run_recommends_process_without_escalation() {
    let engine = simulated_engine();
    let result = engine
        .run(WorkItem::new("CLM-2024-0002", "Pending Review"))
        .await
        .unwrap();

    let recommendation = result.recommendation.expect("recommendation");
    assert_eq!(recommendation.action, RecommendedAction::Process);
    assert_eq!(recommendation.timeline, "48 hours");
    assert!(recommendation.confidence > 0.6);
    assert_eq!(result.resolution, Resolution::NoEscalation);
}

// ============================================================================
// Procedure citation precedence
// ============================================================================

#[tokio::test]
async fn test_scenario_procedure_cited_over_status_procedure() {
    let engine = simulated_engine();
    let mut item = WorkItem::new("CLM-2024-0187", "Pending Review");
    item.scenario = Some("duplicate".to_string());
    item.amount = Some(1520.0);

    let result = engine.run(item).await.unwrap();

    let matching = result.step(StageRole::ProcedureMatching).expect("matching step");
    assert_eq!(matching.referenced_procedures.first().map(String::as_str), Some("SOP 4.7"));
    assert_eq!(matching.scenario.as_deref(), Some("duplicate"));

    // The duplicate scenario drives the recommendation to a denial, which
    // always requires a human in the loop.
    let recommendation = result.recommendation.expect("recommendation");
    assert_eq!(recommendation.action, RecommendedAction::Deny);
    assert!(recommendation.text.contains("CO-18"));
    assert_eq!(result.resolution, Resolution::EscalationRequired);
}

#[tokio::test]
async fn test_status_only_item_cites_status_procedure() {
    let engine = simulated_engine();
    let result = engine
        .run(WorkItem::new("C-1", "Information Needed"))
        .await
        .unwrap();

    assert_eq!(result.item.id, "C-1");
    let matching = result.step(StageRole::ProcedureMatching).expect("matching step");
    assert_eq!(matching.referenced_procedures, vec!["SOP 2.4"]);
    assert!(matching.scenario.is_none());
}

// ============================================================================
// Degraded completion
// ============================================================================

#[tokio::test]
async fn test_failing_model_degrades_but_still_completes() {
    let model = Arc::new(UnreachableModel::default());
    let client: Arc<dyn ModelClient> = model.clone();
    let procedures = Arc::new(ProcedureDataProvider::new(sample_catalog()));
    let policy = StagePolicy {
        max_attempts: 2,
        retry_delay_ms: 1,
        stage_timeout_ms: 500,
    };
    let transport = DirectTransport::new(
        client,
        procedures.clone(),
        policy,
        SolutionLabels::default(),
    );
    let engine = ReasoningEngine::with_transport(
        Arc::new(transport),
        procedures,
        EngineConfig::direct(),
    );

    let result = engine
        .run(WorkItem::new("CLM-2024-0003", "Pending Review"))
        .await
        .unwrap();

    // Two attempts per stage, all four stages tried.
    assert_eq!(model.calls.load(Ordering::SeqCst), 8);
    assert!(result.degraded);
    assert_eq!(result.steps.len(), 4);
    for step in &result.steps {
        assert_eq!(step.confidence, 0.0);
        assert!(step.text.contains("unavailable"));
    }
    assert!(result.recommendation.is_none());
    assert_eq!(result.resolution, Resolution::EscalationRequired);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_after_first_step_stops_observation() {
    let engine = simulated_engine();
    let cancel = CancellationToken::new();
    let observer_cancel = cancel.clone();
    let mut seen = 0u32;

    let err = engine
        .run_controlled(
            WorkItem::new("CLM-2024-0004", "Pending Review"),
            |_step| {
                seen += 1;
                observer_cancel.cancel();
            },
            cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(seen, 1);
}
