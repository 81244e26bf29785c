//! Solution Adapters
//!
//! One parametrized adapter serves every vertical. An adapter owns the
//! vertical's procedure provider, converts vertical payloads into the
//! generic work item, forwards to the shared engine, and relabels results
//! on the way back out. Nothing else: no extra stages, no extra state, no
//! vertical business logic. Two adapters fed structurally identical items
//! produce identical step sequences apart from field names.

pub mod solutions;

use std::sync::Arc;

use serde_json::{Map, Value};

use sop_pilot_core::{
    ChatContext, ChatResponse, PipelineError, PipelineResult, ProcedureCatalog,
    ProcedureDataProvider, ReasoningResult, ReasoningStep, WorkItem,
};

use crate::config::{EngineConfig, SolutionLabels};
use crate::engine::ReasoningEngine;

/// Vertical-to-generic field names for one solution.
///
/// Names identical on both sides (the claims vertical already uses `id` and
/// `amount`) make the rename a no-op, so an identity map is valid.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    /// Vertical name for the whole item in result payloads, e.g. `claim`
    pub item: &'static str,
    /// Vertical name for [`WorkItem::id`], e.g. `loanId`
    pub id: &'static str,
    /// Vertical name for the monetary amount, e.g. `loanAmount`
    pub amount: &'static str,
    /// Vertical name for the intake date, e.g. `applicationDate`
    pub date: &'static str,
    /// Vertical name for the deadline counter, e.g. `daysUntilDeadline`
    pub deadline: &'static str,
}

/// One vertical's view of the shared pipeline.
pub struct SolutionAdapter {
    name: &'static str,
    field_map: FieldMap,
    provider: Arc<ProcedureDataProvider>,
    engine: ReasoningEngine,
}

impl SolutionAdapter {
    /// Builds a vertical adapter around its catalogue and engine
    /// configuration.
    pub fn new(
        name: &'static str,
        field_map: FieldMap,
        labels: SolutionLabels,
        catalog: ProcedureCatalog,
        config: EngineConfig,
    ) -> PipelineResult<Self> {
        let provider = Arc::new(ProcedureDataProvider::new(catalog));
        let engine = ReasoningEngine::new(config.with_labels(labels), provider.clone())?;
        Ok(Self {
            name,
            field_map,
            provider,
            engine,
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The vertical's procedure provider.
    pub fn provider(&self) -> Arc<ProcedureDataProvider> {
        self.provider.clone()
    }

    /// The engine this adapter forwards to.
    pub fn engine(&self) -> &ReasoningEngine {
        &self.engine
    }

    /// Converts a vertical payload into the generic work item.
    ///
    /// Requires the vertical's id field and `status` to be present; every
    /// other field is optional. Unrecognized fields are preserved in the
    /// item's `extra` map.
    pub fn to_work_item(&self, payload: &Value) -> PipelineResult<WorkItem> {
        let object = payload.as_object().ok_or_else(|| {
            PipelineError::validation(format!("{} payload must be a JSON object", self.name))
        })?;
        if !object.contains_key(self.field_map.id) {
            return Err(PipelineError::validation(format!(
                "{} payload is missing '{}'",
                self.name, self.field_map.id
            )));
        }
        if !object.contains_key("status") {
            return Err(PipelineError::validation(format!(
                "{} payload is missing 'status'",
                self.name
            )));
        }

        let mut generic = object.clone();
        rename_key(&mut generic, self.field_map.id, "id");
        rename_key(&mut generic, self.field_map.amount, "amount");
        rename_key(&mut generic, self.field_map.date, "date");
        rename_key(&mut generic, self.field_map.deadline, "daysUntilSLA");

        let item: WorkItem = serde_json::from_value(Value::Object(generic)).map_err(|e| {
            PipelineError::validation(format!("{} payload invalid: {}", self.name, e))
        })?;
        item.validate()?;
        Ok(item)
    }

    /// Renders a generic item with the vertical's field names.
    pub fn relabel_item(&self, item: &WorkItem) -> PipelineResult<Value> {
        let mut value = serde_json::to_value(item)?;
        if let Some(object) = value.as_object_mut() {
            rename_key(object, "id", self.field_map.id);
            rename_key(object, "amount", self.field_map.amount);
            rename_key(object, "date", self.field_map.date);
            rename_key(object, "daysUntilSLA", self.field_map.deadline);
        }
        Ok(value)
    }

    /// Serializes a result with the vertical's relabeled item attached
    /// alongside the generic one.
    pub fn adapt_result(&self, result: &ReasoningResult) -> PipelineResult<Value> {
        let mut value = serde_json::to_value(result)?;
        if let Some(object) = value.as_object_mut() {
            object.insert(
                self.field_map.item.to_string(),
                self.relabel_item(&result.item)?,
            );
        }
        Ok(value)
    }

    /// Runs the pipeline over a vertical payload.
    pub async fn analyze(&self, payload: &Value) -> PipelineResult<Value> {
        let item = self.to_work_item(payload)?;
        let result = self.engine.run(item).await?;
        self.adapt_result(&result)
    }

    /// Runs the pipeline over a vertical payload with a per-step callback.
    pub async fn analyze_with(
        &self,
        payload: &Value,
        on_step: impl FnMut(&ReasoningStep) + Send,
    ) -> PipelineResult<Value> {
        let item = self.to_work_item(payload)?;
        let result = self.engine.run_with(item, on_step).await?;
        self.adapt_result(&result)
    }

    /// Builds a chat context from a vertical payload and completed steps.
    pub fn chat_context(
        &self,
        payload: &Value,
        steps: Vec<ReasoningStep>,
    ) -> PipelineResult<ChatContext> {
        Ok(ChatContext::new(self.to_work_item(payload)?).with_steps(steps))
    }

    /// Sends a chat message through the shared engine.
    pub async fn send(
        &self,
        message: &str,
        context: ChatContext,
    ) -> PipelineResult<ChatResponse> {
        self.engine.send(message, context).await
    }
}

fn rename_key(object: &mut Map<String, Value>, from: &str, to: &str) {
    if from != to {
        if let Some(value) = object.remove(from) {
            object.insert(to.to_string(), value);
        }
    }
}
