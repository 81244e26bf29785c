//! Solution Adapter Integration Tests
//!
//! Verifies the adapters are pure relabelers over the shared engine:
//! structurally identical payloads produce equivalent runs regardless of
//! vertical, results carry both the generic and the relabeled item shape,
//! and validation failures name the vertical's own field names.

use std::io::Write;

use serde_json::{json, Value};

use sop_pilot::adapters::solutions;
use sop_pilot::{DenialCode, EngineConfig, PipelineError, Procedure, ProcedureCatalog};

// ============================================================================
// Fixtures
// ============================================================================

fn shared_catalog() -> ProcedureCatalog {
    let mut catalog = ProcedureCatalog::default();
    catalog.status_index.insert(
        "Pending Review".to_string(),
        Procedure {
            title: "SOP 3.1 — Pending Review Resolution".to_string(),
            steps: vec![
                "Verify eligibility".to_string(),
                "Check coding alignment".to_string(),
            ],
            ..Default::default()
        },
    );
    catalog.scenario_index.insert(
        "duplicate".to_string(),
        Procedure {
            title: "SOP 4.7 — Duplicate Submission Handling".to_string(),
            denial_codes: vec![DenialCode {
                code: "CO-18".to_string(),
                description: "Duplicate claim/service".to_string(),
            }],
            ..Default::default()
        },
    );
    catalog
}

/// Clones a result's steps with their completion timestamps removed;
/// equivalence is about content, not clocks.
fn normalized_steps(result: &Value) -> Vec<Value> {
    result["steps"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|mut step| {
            if let Some(object) = step.as_object_mut() {
                object.remove("completedAt");
            }
            step
        })
        .collect()
}

// ============================================================================
// Cross-vertical equivalence
// ============================================================================

#[tokio::test]
async fn test_identical_payloads_run_identically_across_verticals() {
    let claims = solutions::claims(shared_catalog(), EngineConfig::direct()).unwrap();
    let loans = solutions::loans(shared_catalog(), EngineConfig::direct()).unwrap();

    let claims_result = claims
        .analyze(&json!({
            "id": "X-1",
            "status": "Pending Review",
            "amount": 1200.0,
            "daysUntilSLA": 3
        }))
        .await
        .unwrap();
    let loans_result = loans
        .analyze(&json!({
            "loanId": "X-1",
            "status": "Pending Review",
            "loanAmount": 1200.0,
            "daysUntilDeadline": 3
        }))
        .await
        .unwrap();

    // Same catalogue, same item content: identical reasoning regardless of
    // which vertical submitted it.
    assert_eq!(
        normalized_steps(&claims_result),
        normalized_steps(&loans_result)
    );
    assert_eq!(claims_result["item"], loans_result["item"]);
    assert_eq!(
        claims_result["recommendation"],
        loans_result["recommendation"]
    );
    assert_eq!(claims_result["resolution"], loans_result["resolution"]);
}

#[tokio::test]
async fn test_results_alias_the_item_under_the_vertical_name() {
    let claims = solutions::claims(shared_catalog(), EngineConfig::direct()).unwrap();
    let dispatch = solutions::dispatch(shared_catalog(), EngineConfig::direct()).unwrap();

    let claims_result = claims
        .analyze(&json!({ "id": "CLM-7", "status": "Pending Review" }))
        .await
        .unwrap();
    // The claims vertical already uses the generic names; its alias is an
    // identity copy.
    assert_eq!(claims_result["item"]["id"], "CLM-7");
    assert_eq!(claims_result["claim"]["id"], "CLM-7");

    let dispatch_result = dispatch
        .analyze(&json!({
            "orderId": "WO-12",
            "status": "Pending Review",
            "estimatedCost": 430.0
        }))
        .await
        .unwrap();
    assert_eq!(dispatch_result["item"]["id"], "WO-12");
    assert_eq!(dispatch_result["workOrder"]["orderId"], "WO-12");
    assert_eq!(dispatch_result["workOrder"]["estimatedCost"], 430.0);
    assert!(dispatch_result["workOrder"].get("id").is_none());
}

// ============================================================================
// Catalogue citations
// ============================================================================

#[tokio::test]
async fn test_matching_step_cites_the_vertical_catalogue() {
    let appeals = solutions::appeals(shared_catalog(), EngineConfig::direct()).unwrap();
    let result = appeals
        .analyze(&json!({ "caseId": "AP-3", "status": "Pending Review" }))
        .await
        .unwrap();

    let matching = &result["steps"][1];
    assert_eq!(matching["role"], "procedure_matching");
    assert_eq!(matching["referencedProcedures"][0], "SOP 3.1");
}

#[tokio::test]
async fn test_catalogue_loaded_from_file_drives_citations() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        r#"{
            "statusIndex": {
                "In Underwriting": {
                    "title": "SOP 6.2 — Underwriting Review",
                    "steps": ["Confirm income documentation"]
                }
            }
        }"#
        .as_bytes(),
    )
    .unwrap();
    let catalog = ProcedureCatalog::from_json_file(file.path()).unwrap();

    let loans = solutions::loans(catalog, EngineConfig::direct()).unwrap();
    let result = loans
        .analyze(&json!({ "loanId": "LN-1", "status": "In Underwriting" }))
        .await
        .unwrap();
    assert_eq!(result["steps"][1]["referencedProcedures"][0], "SOP 6.2");
}

// ============================================================================
// Validation and chat
// ============================================================================

#[tokio::test]
async fn test_validation_failures_name_vertical_fields() {
    let dispatch = solutions::dispatch(shared_catalog(), EngineConfig::direct()).unwrap();

    let err = dispatch
        .analyze(&json!({ "status": "Scheduled" }))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(err.to_string().contains("orderId"));

    let inventory = solutions::inventory(shared_catalog(), EngineConfig::direct()).unwrap();
    let err = inventory
        .analyze(&json!({ "sku": "SKU-88" }))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(err.to_string().contains("status"));
}

#[tokio::test]
async fn test_chat_suggestions_use_the_vertical_noun() {
    let loans = solutions::loans(shared_catalog(), EngineConfig::direct()).unwrap();
    let context = loans
        .chat_context(
            &json!({ "loanId": "LN-1", "status": "Pending Review" }),
            Vec::new(),
        )
        .unwrap();

    let response = loans.send("What should happen next?", context).await.unwrap();
    assert_eq!(response.suggestions[0], "What SOPs apply to this loan?");
    assert!(response.simulated);
}
