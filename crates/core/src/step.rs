//! Reasoning Stages and Results
//!
//! Types describing a run of the four-stage reasoning sequence: the stage
//! roles, the per-stage step records, the final recommendation, and the
//! aggregated result handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::WorkItem;

/// Default resolution timeline quoted when the recommendation text does not
/// name one.
pub const DEFAULT_TIMELINE: &str = "48 hours";

/// Recommendation confidence below this resolves escalation-required.
pub const ESCALATION_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Characterize the item: category, anomalies, completeness
    Analysis,
    /// Match the item against the procedure catalogue
    ProcedureMatching,
    /// Score risk and compliance exposure
    RiskAssessment,
    /// Produce the final disposition
    Recommendation,
}

impl StageRole {
    /// All stages in execution order.
    pub const ALL: [StageRole; 4] = [
        StageRole::Analysis,
        StageRole::ProcedureMatching,
        StageRole::RiskAssessment,
        StageRole::Recommendation,
    ];

    /// Zero-based position in the execution order.
    pub fn index(&self) -> usize {
        match self {
            Self::Analysis => 0,
            Self::ProcedureMatching => 1,
            Self::RiskAssessment => 2,
            Self::Recommendation => 3,
        }
    }

    /// Human-readable stage title for chat and log output.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::ProcedureMatching => "Procedure Matching",
            Self::RiskAssessment => "Risk Assessment",
            Self::Recommendation => "Recommendation",
        }
    }
}

impl std::fmt::Display for StageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::ProcedureMatching => write!(f, "procedure_matching"),
            Self::RiskAssessment => write!(f, "risk_assessment"),
            Self::Recommendation => write!(f, "recommendation"),
        }
    }
}

impl std::str::FromStr for StageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analysis" => Ok(Self::Analysis),
            "procedure_matching" | "procedure matching" => Ok(Self::ProcedureMatching),
            "risk_assessment" | "risk assessment" => Ok(Self::RiskAssessment),
            "recommendation" => Ok(Self::Recommendation),
            _ => Err(format!("Unknown stage role: {}", s)),
        }
    }
}

/// One completed stage of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStep {
    /// Which stage produced this step
    pub role: StageRole,
    /// Narrative output of the stage
    pub text: String,
    /// Confidence score in [0.0, 1.0]
    pub confidence: f64,
    /// Procedure identifiers the stage cited or matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_procedures: Vec<String>,
    /// Scenario tag echoed from the item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// When the stage finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReasoningStep {
    /// Create a step, normalizing the confidence into [0.0, 1.0].
    ///
    /// Non-finite scores fall back to 0.5, the same neutral value used when
    /// a stage's output carries no parseable confidence at all.
    pub fn new(role: StageRole, text: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.5
        };
        Self {
            role,
            text: text.into(),
            confidence,
            referenced_procedures: Vec::new(),
            scenario: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// Attach the procedures this stage matched or cited.
    pub fn with_procedures(mut self, procedures: Vec<String>) -> Self {
        self.referenced_procedures = procedures;
        self
    }

    /// Echo the item's scenario tag onto the step.
    pub fn with_scenario(mut self, scenario: Option<String>) -> Self {
        self.scenario = scenario;
        self
    }
}

/// The disposition a recommendation stage can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    /// Approve the item as submitted
    Approve,
    /// Deny the item
    Deny,
    /// Continue standard processing
    Process,
}

impl RecommendedAction {
    /// Detect the action from recommendation text.
    ///
    /// Denial wording wins over approval wording when both appear; anything
    /// else falls through to `Process`.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("deny") || lower.contains("denial") || lower.contains("denied") {
            Self::Deny
        } else if lower.contains("approve") || lower.contains("approval") {
            Self::Approve
        } else {
            Self::Process
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Deny => write!(f, "DENY"),
            Self::Process => write!(f, "PROCESS"),
        }
    }
}

/// Parsed output of the Recommendation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Detected disposition
    pub action: RecommendedAction,
    /// Full recommendation text
    pub text: String,
    /// Expected resolution timeline
    pub timeline: String,
    /// Procedures the recommendation relies on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub procedure_refs: Vec<String>,
    /// Confidence of the recommendation stage
    pub confidence: f64,
}

/// Run-level outcome derived from the final stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Item can proceed without human review
    NoEscalation,
    /// Item needs a human in the loop
    EscalationRequired,
}

impl Resolution {
    /// Derive the resolution deterministically from the recommendation.
    ///
    /// A denial, a recommendation confidence below the threshold, a missing
    /// recommendation, or a degraded run all resolve escalation-required.
    pub fn derive(recommendation: Option<&Recommendation>, degraded: bool) -> Self {
        if degraded {
            return Self::EscalationRequired;
        }
        match recommendation {
            Some(rec) => {
                if rec.action == RecommendedAction::Deny
                    || rec.confidence < ESCALATION_CONFIDENCE_THRESHOLD
                {
                    Self::EscalationRequired
                } else {
                    Self::NoEscalation
                }
            }
            None => Self::EscalationRequired,
        }
    }

    /// True when a human must review the item.
    pub fn requires_escalation(&self) -> bool {
        matches!(self, Self::EscalationRequired)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEscalation => write!(f, "no_escalation"),
            Self::EscalationRequired => write!(f, "escalation_required"),
        }
    }
}

/// Identity of the model that served a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Model name as reported by the client
    pub model: String,
    /// Short description of the reasoning strategy
    pub strategy: String,
}

impl ModelInfo {
    pub fn new(model: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            strategy: strategy.into(),
        }
    }
}

/// Terminal aggregate of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningResult {
    /// Unique identifier of this run
    pub run_id: String,
    /// The item that was analyzed
    pub item: WorkItem,
    /// Completed stages in execution order
    pub steps: Vec<ReasoningStep>,
    /// Parsed final recommendation, absent when the run aborted early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    /// Run-level outcome
    pub resolution: Resolution,
    /// Which model and strategy served the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    /// True when at least one stage failed after retries
    #[serde(default)]
    pub degraded: bool,
    /// True when the result came from the local fallback path
    #[serde(default)]
    pub simulated: bool,
    /// When the run started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReasoningResult {
    /// Look up the step produced by a given stage, if it ran.
    pub fn step(&self, role: StageRole) -> Option<&ReasoningStep> {
        self.steps.iter().find(|s| s.role == role)
    }

    /// True when every stage produced a step.
    pub fn is_complete(&self) -> bool {
        self.steps.len() == StageRole::ALL.len()
    }
}
