//! Shipped Verticals
//!
//! Constructors for the five solutions that share the pipeline. Each one is
//! a field map plus labels around [`SolutionAdapter::new`]; none carries any
//! logic of its own. The claims vertical already stores items in the generic
//! shape, so its map only aliases the item under `claim`.

use sop_pilot_core::{PipelineResult, ProcedureCatalog};

use super::{FieldMap, SolutionAdapter};
use crate::config::{EngineConfig, SolutionLabels};

/// Healthcare claims review.
pub fn claims(
    catalog: ProcedureCatalog,
    config: EngineConfig,
) -> PipelineResult<SolutionAdapter> {
    SolutionAdapter::new(
        "claims",
        FieldMap {
            item: "claim",
            id: "id",
            amount: "amount",
            date: "date",
            deadline: "daysUntilSLA",
        },
        SolutionLabels::new("ClaimsPilot", "healthcare claims", "claim"),
        catalog,
        config,
    )
}

/// Mortgage application underwriting.
pub fn loans(
    catalog: ProcedureCatalog,
    config: EngineConfig,
) -> PipelineResult<SolutionAdapter> {
    SolutionAdapter::new(
        "loans",
        FieldMap {
            item: "loan",
            id: "loanId",
            amount: "loanAmount",
            date: "applicationDate",
            deadline: "daysUntilDeadline",
        },
        SolutionLabels::new("LendPilot", "mortgage applications", "loan"),
        catalog,
        config,
    )
}

/// Appeals and grievances resolution.
pub fn appeals(
    catalog: ProcedureCatalog,
    config: EngineConfig,
) -> PipelineResult<SolutionAdapter> {
    SolutionAdapter::new(
        "appeals",
        FieldMap {
            item: "case",
            id: "caseId",
            amount: "disputedAmount",
            date: "filedDate",
            deadline: "daysUntilDeadline",
        },
        SolutionLabels::new("ResolvePilot", "appeals and grievances", "case"),
        catalog,
        config,
    )
}

/// Field service dispatch.
pub fn dispatch(
    catalog: ProcedureCatalog,
    config: EngineConfig,
) -> PipelineResult<SolutionAdapter> {
    SolutionAdapter::new(
        "dispatch",
        FieldMap {
            item: "workOrder",
            id: "orderId",
            amount: "estimatedCost",
            date: "scheduledDate",
            deadline: "daysUntilSLA",
        },
        SolutionLabels::new("DispatchPilot", "field service operations", "work order"),
        catalog,
        config,
    )
}

/// Inventory replenishment.
pub fn inventory(
    catalog: ProcedureCatalog,
    config: EngineConfig,
) -> PipelineResult<SolutionAdapter> {
    SolutionAdapter::new(
        "inventory",
        FieldMap {
            item: "stockItem",
            id: "sku",
            amount: "unitCost",
            date: "lastRestocked",
            deadline: "daysUntilReorder",
        },
        SolutionLabels::new("StockPilot", "inventory replenishment", "stock item"),
        catalog,
        config,
    )
}
