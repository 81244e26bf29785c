//! Procedure Data Provider
//!
//! The read-only lookup facade a solution supplies over its procedure
//! catalogue. Every lookup degrades to "not found" rather than failing, so a
//! vertical that omits an index (or an entire lookup) still works: the trait
//! defaults make any implementor safely partial.

use crate::item::WorkItem;
use crate::procedure::{Procedure, ProcedureCatalog};

/// Read-only procedure lookups consumed by the pipeline and chat agent.
///
/// All methods have no-op defaults returning empty results. A solution
/// implements only the lookups its catalogue supports; the pipeline treats
/// a miss as "no procedure on file", never as an error.
pub trait ProcedureSource: Send + Sync {
    /// Procedure for an item status, if the catalogue has one.
    fn lookup_by_status(&self, _status: &str) -> Option<Procedure> {
        None
    }

    /// Scenario-specific procedure, if the catalogue has one.
    fn lookup_by_scenario(&self, _scenario: &str) -> Option<Procedure> {
        None
    }

    /// Procedure by its index code, if the catalogue has one.
    fn lookup_by_code(&self, _code: &str) -> Option<Procedure> {
        None
    }

    /// All procedures applying in a jurisdiction.
    fn lookup_by_jurisdiction(&self, _jurisdiction: &str) -> Vec<Procedure> {
        Vec::new()
    }

    /// Procedures applicable to an item: the scenario match unioned with the
    /// status match, scenario first.
    ///
    /// Ordering is part of the contract: when both kinds match, the scenario
    /// procedure leads and is the one the pipeline cites.
    fn applicable_for_item(&self, item: &WorkItem) -> Vec<Procedure> {
        let mut applicable = Vec::new();
        if let Some(scenario) = item.scenario.as_deref() {
            if let Some(procedure) = self.lookup_by_scenario(scenario) {
                applicable.push(procedure);
            }
        }
        if let Some(procedure) = self.lookup_by_status(&item.status) {
            if !applicable.iter().any(|p| p.title == procedure.title) {
                applicable.push(procedure);
            }
        }
        applicable
    }
}

/// Catalogue-backed provider used by every shipped solution adapter.
#[derive(Debug, Clone, Default)]
pub struct ProcedureDataProvider {
    catalog: ProcedureCatalog,
}

impl ProcedureDataProvider {
    pub fn new(catalog: ProcedureCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }
}

impl ProcedureSource for ProcedureDataProvider {
    fn lookup_by_status(&self, status: &str) -> Option<Procedure> {
        self.catalog.status_index.get(status).cloned()
    }

    fn lookup_by_scenario(&self, scenario: &str) -> Option<Procedure> {
        self.catalog.scenario_index.get(scenario).cloned()
    }

    fn lookup_by_code(&self, code: &str) -> Option<Procedure> {
        // Codes are index keys; the status index is checked first
        self.catalog
            .status_index
            .get(code)
            .or_else(|| self.catalog.scenario_index.get(code))
            .cloned()
    }

    fn lookup_by_jurisdiction(&self, jurisdiction: &str) -> Vec<Procedure> {
        self.catalog
            .status_index
            .values()
            .chain(self.catalog.scenario_index.values())
            .filter(|p| p.applies_to_jurisdiction(jurisdiction))
            .cloned()
            .collect()
    }
}

/// Provider with no catalogue at all. Every lookup returns empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProcedureSource;

impl ProcedureSource for EmptyProcedureSource {}
