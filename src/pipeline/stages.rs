//! Stage Templates and Response Parsing
//!
//! Each of the four stages has its own instruction template, sampling
//! temperature, and response parsing. Templates embed the raw item JSON,
//! every previously produced step, and the applicable procedures, so later
//! stages literally see earlier stages' text.

use regex::Regex;
use std::sync::OnceLock;

use sop_pilot_core::{
    Procedure, ReasoningStep, Recommendation, RecommendedAction, StageRole, WorkItem,
    DEFAULT_TIMELINE,
};
use sop_pilot_llm::Message;

use super::confidence::parse_confidence;

/// Sampling temperature per stage. Early stages run cold for consistent
/// extraction; the recommendation runs warmest.
pub fn stage_temperature(role: StageRole) -> f32 {
    match role {
        StageRole::Analysis => 0.2,
        StageRole::ProcedureMatching => 0.3,
        StageRole::RiskAssessment => 0.4,
        StageRole::Recommendation => 0.5,
    }
}

/// Builds the system + user message pair for one stage.
pub fn build_stage_messages(
    role: StageRole,
    item: &WorkItem,
    steps: &[ReasoningStep],
    procedures: &[Procedure],
) -> Vec<Message> {
    let item_json =
        serde_json::to_string_pretty(item).unwrap_or_else(|_| item.summary());
    let steps_json =
        serde_json::to_string_pretty(steps).unwrap_or_else(|_| "[]".to_string());
    let scenario = item.scenario.as_deref();

    match role {
        StageRole::Analysis => {
            let mut system = String::from(
                "You are an analysis specialist. Your role is to analyze item \
                 metadata and extract key information including:\n\
                 - Item amount and categorization\n\
                 - Provider/entity information and history\n\
                 - Member/customer details\n\
                 - Submission dates and processing timeline\n\
                 - Initial risk indicators",
            );
            if let Some(scenario) = scenario {
                system.push_str(&format!(
                    "\n- Scenario-specific analysis for: {}",
                    scenario
                ));
            }
            system.push_str(
                "\n\nProvide your analysis in a structured format with confidence scores.",
            );
            if let Some(sop) = procedures.first() {
                system.push_str(&format!(" Reference {}.", sop.reference()));
            }

            let mut user = format!("Analyze the following item:\n{}", item_json);
            if let Some(scenario) = scenario {
                user.push_str(&format!(
                    "\n\nThis item matches the \"{}\" scenario. Pay special \
                     attention to scenario-specific fields.",
                    scenario
                ));
            }
            user.push_str(
                "\n\nProvide a detailed analysis with:\n\
                 1. Key metadata extracted\n\
                 2. Initial observations\n\
                 3. Scenario-specific insights (if applicable)\n\
                 4. Confidence score (0-1)",
            );

            vec![Message::system(system), Message::user(user)]
        }
        StageRole::ProcedureMatching => {
            let mut system = String::from(
                "You are an SOP (Standard Operating Procedure) matching \
                 specialist. Your role is to:\n\
                 1. Identify which SOPs apply to the item based on status and \
                 characteristics\n\
                 2. Extract SOP requirements and steps\n\
                 3. Match item conditions to SOP rules\n\
                 4. Provide confidence scores for matches",
            );
            if let Some(scenario) = scenario {
                system.push_str(&format!(
                    "\n5. Pay special attention to scenario-specific SOPs for: {}",
                    scenario
                ));
            }

            let available = if procedures.is_empty() {
                "(no catalogued SOPs matched this item)".to_string()
            } else {
                procedures
                    .iter()
                    .map(|sop| format!("{}\nSteps: {}", sop.title, sop.steps.join(", ")))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            };

            let mut user = format!("Match the following item to relevant SOPs:\nItem: {}", item_json);
            if let Some(scenario) = scenario {
                user.push_str(&format!(
                    "\n\nThis item matches the \"{}\" scenario.",
                    scenario
                ));
            }
            user.push_str(&format!("\n\nAvailable SOPs:\n{}", available));
            user.push_str("\n\nIdentify matching SOPs and explain why they apply.");

            vec![Message::system(system), Message::user(user)]
        }
        StageRole::RiskAssessment => {
            let system = "You are a risk assessment specialist. Evaluate:\n\
                 1. Compliance with SOPs\n\
                 2. Missing documentation\n\
                 3. Anomalies or red flags\n\
                 4. Historical patterns\n\
                 5. Provider/entity reliability\n\n\
                 Provide risk assessment with confidence scores.";
            let user = format!(
                "Assess risks for this item:\n{}\n\nPrevious analysis:\n{}",
                item_json, steps_json
            );

            vec![Message::system(system), Message::user(user)]
        }
        StageRole::Recommendation => {
            let mut system = String::from(
                "You are a recommendation specialist. Based on all previous \
                 analysis, provide:\n\
                 1. Clear, actionable recommendation\n\
                 2. Whether to APPROVE, DENY (including deny as duplicate), or \
                 PROCESS\n\
                 3. Timeline for action\n\
                 4. Relevant SOP references\n\
                 5. Confidence score\n\
                 6. Reasoning behind the recommendation",
            );
            let mut extra = Vec::new();
            if let Some(scenario) = scenario {
                extra.push(format!("Scenario-specific recommendations for: {}", scenario));
            }
            let denial_codes = collect_denial_codes(procedures);
            if !denial_codes.is_empty() {
                extra.push(format!("Denial codes if applicable: {}", denial_codes));
            }
            for (offset, line) in extra.iter().enumerate() {
                system.push_str(&format!("\n{}. {}", 7 + offset, line));
            }

            let mut user = format!(
                "Generate a recommendation for this item.\nItem: {}\nAnalysis steps: {}",
                item_json, steps_json
            );
            if let Some(scenario) = scenario {
                user.push_str(&format!(
                    "\n\nThis item matches the \"{}\" scenario.",
                    scenario
                ));
            }
            if let Some(sop) = procedures.first() {
                user.push_str(&format!("\nPrimary SOP: {}.", sop.title));
            }
            user.push_str(
                "\n\nIf this is a true duplicate (e.g., CO-18 or \"duplicate \
                 claim/service\"), explicitly recommend DENYING the duplicate and \
                 reference the duplicate-handling SOP and denial code.\n\
                 If it is a valid corrected submission or not a duplicate, \
                 recommend APPROVE or PROCESS with clear justification.",
            );

            vec![Message::system(system), Message::user(user)]
        }
    }
}

/// Turns a stage's raw model output into a [`ReasoningStep`].
///
/// The Procedure-Matching step additionally carries cited procedure
/// references and echoes the item's scenario tag. References come from the
/// response text when it names any, otherwise from the catalogued matches,
/// which are ordered scenario-first.
pub fn parse_step(
    role: StageRole,
    content: &str,
    item: &WorkItem,
    procedures: &[Procedure],
) -> ReasoningStep {
    let text = content.trim().to_string();
    let confidence = parse_confidence(&text);
    let mut step = ReasoningStep::new(role, text, confidence);

    if role == StageRole::ProcedureMatching {
        let mut references = extract_procedure_refs(&step.text);
        if references.is_empty() {
            references = catalogued_refs(procedures);
        }
        step = step
            .with_procedures(references)
            .with_scenario(item.scenario.clone());
    }

    step
}

/// Parses the Recommendation stage's output into a structured decision.
pub fn parse_recommendation(content: &str, procedures: &[Procedure]) -> Recommendation {
    let text = content.trim().to_string();
    let action = RecommendedAction::from_text(&text);
    let confidence = parse_confidence(&text);

    let mut references = extract_procedure_refs(&text);
    if references.is_empty() {
        references = catalogued_refs(procedures);
    }

    let timeline = timeline_re()
        .captures(&text)
        .map(|captures| captures[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMELINE.to_string());

    Recommendation {
        action,
        text,
        timeline,
        procedure_refs: references,
        confidence,
    }
}

/// Extracts `SOP <number>` citations from text, first occurrence order,
/// deduplicated.
pub fn extract_procedure_refs(text: &str) -> Vec<String> {
    let mut references = Vec::new();
    for captures in sop_ref_re().captures_iter(text) {
        let reference = format!("SOP {}", &captures[1]);
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn catalogued_refs(procedures: &[Procedure]) -> Vec<String> {
    let mut references = Vec::new();
    for sop in procedures {
        let reference = sop.reference();
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}

fn collect_denial_codes(procedures: &[Procedure]) -> String {
    procedures
        .iter()
        .flat_map(|sop| sop.denial_codes.iter())
        .map(|dc| format!("{} - {}", dc.code, dc.description))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sop_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bSOP\s*([0-9]+(?:\.[0-9]+)*)").unwrap())
}

fn timeline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)timeline\s*(?:for action)?\s*[:\-]\s*([^.\n]+)").unwrap())
}
