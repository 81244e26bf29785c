//! Procedure Catalogue
//!
//! Reference playbook entries and the two-index catalogue a solution ships
//! them in. Procedures are immutable reference data; the pipeline looks them
//! up and cites them, never mutates them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::PipelineResult;

/// A denial code a procedure can apply, with its human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DenialCode {
    pub code: String,
    pub description: String,
}

/// One reference procedure: an ordered checklist plus citation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    /// Display title, conventionally prefixed with a citable code
    /// (e.g. "SOP 3.1 — Pending Review Resolution")
    pub title: String,
    /// Ordered checklist the procedure prescribes
    #[serde(default)]
    pub steps: Vec<String>,
    /// Link to the full procedure document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Denial codes this procedure can apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub denial_codes: Vec<DenialCode>,
    /// Page or document references backing the procedure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_references: Vec<String>,
    /// Jurisdictions the procedure applies to; empty or "All" means every one
    #[serde(default, alias = "states", skip_serializing_if = "Vec::is_empty")]
    pub jurisdictions: Vec<String>,
}

impl Procedure {
    /// Short citable reference for this procedure.
    ///
    /// Titles conventionally open with "SOP <number>"; when that prefix is
    /// present it is the reference ("SOP 3.1"), otherwise the full title is
    /// used so the citation is never empty.
    pub fn reference(&self) -> String {
        let title = self.title.trim();
        if let Some(rest) = title.strip_prefix("SOP") {
            let code: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ' ')
                .collect();
            let code = code.trim();
            if code.chars().any(|c| c.is_ascii_digit()) {
                return format!("SOP {}", code);
            }
        }
        title.to_string()
    }

    /// Whether this procedure applies in the given jurisdiction.
    pub fn applies_to_jurisdiction(&self, jurisdiction: &str) -> bool {
        self.jurisdictions.is_empty()
            || self
                .jurisdictions
                .iter()
                .any(|j| j == "All" || j.eq_ignore_ascii_case(jurisdiction))
    }
}

/// A vertical's full catalogue: status-keyed and scenario-keyed indexes.
///
/// Both indexes are optional in the serialized form; a catalogue missing one
/// simply has no matches of that kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureCatalog {
    /// Status string -> procedure for items in that status
    #[serde(default)]
    pub status_index: BTreeMap<String, Procedure>,
    /// Scenario tag -> scenario-specific procedure
    #[serde(default)]
    pub scenario_index: BTreeMap<String, Procedure>,
}

impl ProcedureCatalog {
    /// Parse a catalogue from its JSON representation.
    pub fn from_json_str(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a catalogue from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Total number of procedures across both indexes.
    pub fn len(&self) -> usize {
        self.status_index.len() + self.scenario_index.len()
    }

    /// True when the catalogue holds no procedures at all.
    pub fn is_empty(&self) -> bool {
        self.status_index.is_empty() && self.scenario_index.is_empty()
    }
}
