//! Work Item Model
//!
//! The normalized unit of work the pipeline reasons over. Solution adapters
//! map their domain records (claims, loans, appeals, dispatch orders,
//! inventory lines) into this shape before anything downstream sees them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};

/// A normalized work item flowing through the reasoning pipeline.
///
/// Only `id` and `status` are mandatory. Everything a solution captures
/// beyond the typed fields rides along in `extra` and is preserved verbatim
/// through serialization, so remote backends see the full record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Unique identifier within the solution
    pub id: String,
    /// Current processing status (solution vocabulary, e.g. "Pending Review")
    pub status: String,
    /// Scenario tag selecting a scenario-specific procedure (e.g. "duplicate")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Monetary amount associated with the item, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// Submission / filing date (solution-formatted string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Ordered sub-items, when the solution tracks them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<Value>>,
    /// Days remaining until the service-level deadline
    #[serde(rename = "daysUntilSLA", skip_serializing_if = "Option::is_none")]
    pub days_until_sla: Option<i64>,
    /// Machine-scored priority, when the solution precomputes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_priority: Option<f64>,
    /// Machine-scored risk band ("high" / "medium" / "low")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_risk_level: Option<String>,
    /// Any solution-specific fields not covered above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl WorkItem {
    /// Create a work item with the two mandatory fields set.
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    /// Validate the item before it enters a pipeline run.
    ///
    /// Fails fast with `PipelineError::Validation`; no model call or
    /// transport open happens for an invalid item.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.id.trim().is_empty() {
            return Err(PipelineError::validation("item id must not be empty"));
        }
        if self.status.trim().is_empty() {
            return Err(PipelineError::validation("item status must not be empty"));
        }
        if let Some(amount) = self.amount {
            if !amount.is_finite() {
                return Err(PipelineError::validation("item amount must be finite"));
            }
        }
        Ok(())
    }

    /// Compact single-line summary used in prompts and log lines.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("id={}", self.id), format!("status={}", self.status)];
        if let Some(scenario) = &self.scenario {
            parts.push(format!("scenario={}", scenario));
        }
        if let Some(amount) = self.amount {
            parts.push(format!("amount={:.2}", amount));
        }
        if let Some(days) = self.days_until_sla {
            parts.push(format!("daysUntilSLA={}", days));
        }
        if let Some(risk) = &self.ai_risk_level {
            parts.push(format!("risk={}", risk));
        }
        parts.join(" ")
    }
}
