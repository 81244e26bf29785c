//! Reasoning Pipeline
//!
//! The orchestrator runs the four reasoning stages strictly in order,
//! feeding each stage the raw item plus every previously produced step, and
//! emits a frame as each stage completes. Stage failures are retried per the
//! configured policy; a stage that stays down degrades the run instead of
//! failing it.

pub mod confidence;
pub mod stages;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sop_pilot_core::{
    Frame, ModelInfo, Procedure, ProcedureSource, ReasoningResult, ReasoningStep,
    Recommendation, Resolution, StageRole, WorkItem,
};
use sop_pilot_llm::{CompletionRequest, ModelClient, ModelError, ScriptedModelClient};

use crate::config::StagePolicy;
use self::stages::{build_stage_messages, parse_recommendation, parse_step, stage_temperature};

/// Reasoning strategy label reported with every run.
pub const STRATEGY: &str = "Multi-agent chain of thought reasoning";

/// How a stage attempt sequence ended short of success.
enum StageError {
    /// Transient failures exhausted the retry budget; later stages can
    /// still proceed
    Exhausted(ModelError),
    /// A failure every remaining stage would hit the same way
    Fatal(ModelError),
    /// Cancellation observed mid-stage
    Cancelled,
}

/// Runs the four-stage reasoning sequence and streams frames to a channel.
///
/// One orchestrator serves many runs; each run builds its own result, so
/// concurrent runs need no synchronization beyond the shared read-only
/// procedure source.
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    procedures: Arc<dyn ProcedureSource>,
    policy: StagePolicy,
    simulated: bool,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        procedures: Arc<dyn ProcedureSource>,
        policy: StagePolicy,
    ) -> Self {
        Self {
            client,
            procedures,
            policy,
            simulated: false,
        }
    }

    /// Orchestrator over the scripted client, used when no model endpoint is
    /// reachable. Results it produces are flagged `simulated`.
    pub fn simulated(procedures: Arc<dyn ProcedureSource>, policy: StagePolicy) -> Self {
        Self {
            client: Arc::new(ScriptedModelClient::new()),
            procedures,
            policy,
            simulated: true,
        }
    }

    /// True when runs are served by the scripted client.
    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Model identity and strategy reported with results.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo::new(self.client.model(), STRATEGY)
    }

    /// Executes a full run for `item`, sending frames on `tx`.
    ///
    /// The item is assumed validated. Emits a connection frame, one step
    /// frame per completed stage, and a terminal complete frame carrying the
    /// aggregate result. Cancellation stops frame emission without a
    /// terminal frame; the consumer resolves the run as cancelled.
    pub async fn execute(
        &self,
        item: WorkItem,
        tx: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Reasoning run {} started for item {}", run_id, item.id);

        let _ = tx
            .send(Frame::Connection {
                message: Some(format!("Reasoning run {} started", run_id)),
                model: Some(self.client.model().to_string()),
            })
            .await;

        let procedures = self.procedures.applicable_for_item(&item);
        debug!(
            "Run {}: {} applicable procedure(s) for item {}",
            run_id,
            procedures.len(),
            item.id
        );

        let mut steps: Vec<ReasoningStep> = Vec::new();
        let mut recommendation: Option<Recommendation> = None;
        let mut degraded = false;

        for role in StageRole::ALL {
            if cancel.is_cancelled() {
                debug!("Run {} cancelled before {} stage", run_id, role);
                return;
            }

            match self.run_stage(role, &item, &steps, &procedures, &cancel).await {
                Ok(content) => {
                    let step = parse_step(role, &content, &item, &procedures);
                    info!(
                        "Run {}: {} stage completed, confidence {:.2}",
                        run_id, role, step.confidence
                    );
                    if role == StageRole::Recommendation {
                        recommendation = Some(parse_recommendation(&content, &procedures));
                    }
                    steps.push(step.clone());
                    if tx.send(Frame::Step { step }).await.is_err() {
                        debug!("Run {}: consumer dropped, stopping", run_id);
                        return;
                    }
                }
                Err(StageError::Exhausted(err)) => {
                    warn!(
                        "Run {}: {} stage degraded after {} attempt(s): {}",
                        run_id, role, self.policy.max_attempts, err
                    );
                    degraded = true;
                    let step = unavailable_step(role, &err);
                    steps.push(step.clone());
                    if tx.send(Frame::Step { step }).await.is_err() {
                        return;
                    }
                }
                Err(StageError::Fatal(err)) => {
                    warn!(
                        "Run {}: {} stage failed fatally, aborting remaining stages: {}",
                        run_id, role, err
                    );
                    degraded = true;
                    break;
                }
                Err(StageError::Cancelled) => {
                    debug!("Run {} cancelled during {} stage", run_id, role);
                    return;
                }
            }
        }

        let result = ReasoningResult {
            run_id: run_id.clone(),
            item,
            steps,
            resolution: Resolution::derive(recommendation.as_ref(), degraded),
            recommendation,
            model_info: Some(self.model_info()),
            degraded,
            simulated: self.simulated,
            started_at: Some(started_at),
            completed_at: Some(Utc::now()),
        };

        match serde_json::to_value(&result) {
            Ok(value) => {
                let _ = tx.send(Frame::Complete { result: value }).await;
                info!(
                    "Reasoning run {} finished: {} step(s), degraded={}",
                    run_id,
                    result.steps.len(),
                    result.degraded
                );
            }
            Err(err) => {
                let _ = tx
                    .send(Frame::Error {
                        message: format!("Failed to encode result: {}", err),
                    })
                    .await;
            }
        }
    }

    /// One stage with retry, backoff, and per-attempt timeout.
    async fn run_stage(
        &self,
        role: StageRole,
        item: &WorkItem,
        steps: &[ReasoningStep],
        procedures: &[Procedure],
        cancel: &CancellationToken,
    ) -> Result<String, StageError> {
        let messages = build_stage_messages(role, item, steps, procedures);
        let timeout = Duration::from_millis(self.policy.stage_timeout_ms);
        let mut last_error: Option<ModelError> = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                let delay = self.policy.backoff_delay_ms(attempt - 1);
                debug!("Retrying {} stage in {}ms", role, delay);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(StageError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
            }

            let request = CompletionRequest::new(messages.clone())
                .with_stage(role.to_string())
                .with_temperature(stage_temperature(role));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StageError::Cancelled),
                outcome = tokio::time::timeout(timeout, self.client.complete(request)) => outcome,
            };

            match outcome {
                Ok(Ok(completion)) => return Ok(completion.content),
                Ok(Err(err)) if is_fatal(&err) => return Err(StageError::Fatal(err)),
                Ok(Err(err)) => {
                    warn!("{} stage attempt {} failed: {}", role, attempt + 1, err);
                    last_error = Some(err);
                }
                Err(_) => {
                    warn!(
                        "{} stage attempt {} timed out after {}ms",
                        role,
                        attempt + 1,
                        timeout.as_millis()
                    );
                    last_error = Some(ModelError::Timeout {
                        message: format!("stage timed out after {}ms", timeout.as_millis()),
                    });
                }
            }
        }

        Err(StageError::Exhausted(last_error.unwrap_or(ModelError::Other {
            message: "no attempts made".to_string(),
        })))
    }
}

/// Errors that would hit every remaining stage identically, so retrying or
/// continuing is pointless.
fn is_fatal(error: &ModelError) -> bool {
    matches!(
        error,
        ModelError::AuthenticationFailed { .. }
            | ModelError::ModelNotFound { .. }
            | ModelError::InvalidRequest { .. }
    )
}

/// Placeholder step recorded for a stage whose model call stayed down.
/// Zero confidence: the stage produced no analysis to be confident about.
fn unavailable_step(role: StageRole, error: &ModelError) -> ReasoningStep {
    ReasoningStep::new(
        role,
        format!("{} unavailable: {}", role.title(), error),
        0.0,
    )
}
