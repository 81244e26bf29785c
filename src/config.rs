//! Engine Configuration
//!
//! Transport selection, model settings, and the per-stage retry policy.
//! All knobs are supplied by the caller at construction time; the engine
//! reads no ambient state.

use serde::{Deserialize, Serialize};

use sop_pilot_core::{PipelineError, PipelineResult};
use sop_pilot_llm::ModelConfig;

/// How the engine reaches the reasoning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Run the orchestrator in-process, no serialization boundary
    #[default]
    Direct,
    /// Consume framed output from a remote analysis server
    Remote,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Direct => write!(f, "direct"),
            TransportMode::Remote => write!(f, "remote"),
        }
    }
}

/// Endpoint settings for [`TransportMode::Remote`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the analysis server, e.g. `http://localhost:8787/api/`
    pub base_url: String,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Retry and timeout policy applied to each pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePolicy {
    /// Total attempts per stage, including the first (2 = one retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds; doubles per retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Timeout per stage model call in milliseconds
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_stage_timeout_ms() -> u64 {
    30_000
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            stage_timeout_ms: default_stage_timeout_ms(),
        }
    }
}

impl StagePolicy {
    /// Delay before the given retry attempt (0-based), exponential.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.retry_delay_ms.saturating_mul(1 << attempt.min(16))
    }
}

/// Human-facing labels a solution adapter supplies: its display name, the
/// domain it serves, and the noun for a single work item. Used in chat
/// prompts and suggested follow-up questions, never in pipeline prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionLabels {
    /// Solution display name, e.g. `ClaimsIQ`
    pub solution: String,
    /// Domain phrase, e.g. `healthcare claims`
    pub domain: String,
    /// Singular noun for one item, e.g. `claim`
    pub item_noun: String,
}

impl SolutionLabels {
    pub fn new(
        solution: impl Into<String>,
        domain: impl Into<String>,
        item_noun: impl Into<String>,
    ) -> Self {
        Self {
            solution: solution.into(),
            domain: domain.into(),
            item_noun: item_noun.into(),
        }
    }
}

impl Default for SolutionLabels {
    fn default() -> Self {
        Self::new("SOP Pilot", "work items", "item")
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transport selection
    #[serde(default)]
    pub mode: TransportMode,
    /// Remote endpoint, required when `mode` is `Remote`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    /// Model settings for direct mode; scripted client when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,
    /// Per-stage retry and timeout policy
    #[serde(default)]
    pub policy: StagePolicy,
    /// Remote mode: max milliseconds between frame reads before the
    /// stream is treated as incomplete
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Substitute a simulated run when the remote transport cannot be
    /// opened at all
    #[serde(default = "default_simulate_on_unavailable")]
    pub simulate_on_unavailable: bool,
    /// Solution-facing labels for chat output
    #[serde(default)]
    pub labels: SolutionLabels,
}

fn default_idle_timeout_ms() -> u64 {
    15_000
}

fn default_simulate_on_unavailable() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            remote: None,
            model: None,
            policy: StagePolicy::default(),
            idle_timeout_ms: default_idle_timeout_ms(),
            simulate_on_unavailable: default_simulate_on_unavailable(),
            labels: SolutionLabels::default(),
        }
    }
}

impl EngineConfig {
    /// Direct-mode configuration with defaults.
    pub fn direct() -> Self {
        Self::default()
    }

    /// Remote-mode configuration pointed at the given analysis server.
    pub fn remote(base_url: impl Into<String>) -> Self {
        Self {
            mode: TransportMode::Remote,
            remote: Some(RemoteConfig::new(base_url)),
            ..Default::default()
        }
    }

    /// Set the model configuration for direct mode.
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the stage retry/timeout policy.
    pub fn with_policy(mut self, policy: StagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the remote idle timeout in milliseconds.
    pub fn with_idle_timeout_ms(mut self, millis: u64) -> Self {
        self.idle_timeout_ms = millis;
        self
    }

    /// Disable the simulated fallback for unreachable remote transports.
    pub fn without_simulated_fallback(mut self) -> Self {
        self.simulate_on_unavailable = false;
        self
    }

    /// Set the solution labels surfaced in chat output.
    pub fn with_labels(mut self, labels: SolutionLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.mode == TransportMode::Remote && self.remote.is_none() {
            return Err(PipelineError::config(
                "remote mode requires a remote endpoint",
            ));
        }
        if self.policy.max_attempts == 0 {
            return Err(PipelineError::config(
                "policy.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
