//! Per-run reporting
//!
//! Every skip and abort is counted where it happens; the run result is a
//! per-category breakdown rather than a single pass/fail flag.

use serde::Serialize;

/// Outcome of one category's reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryOutcome {
    /// Processed to the end; individual components may still have been
    /// skipped (see `skipped`)
    Converged,
    /// Processing stopped early (e.g. not enough bays for the CPUs)
    Aborted,
}

/// Write and skip counts for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub skipped: u32,
    pub outcome: CategoryOutcome,
}

impl CategoryReport {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            outcome: CategoryOutcome::Converged,
        }
    }

    /// Total remote writes this category performed
    pub fn writes(&self) -> u32 {
        self.created + self.updated + self.deleted
    }
}

/// Result of a full reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    pub fn push(&mut self, category: CategoryReport) {
        self.categories.push(category);
    }

    /// Total remote writes across all categories; zero on a repeat run with
    /// unchanged facts is the idempotence property
    pub fn total_writes(&self) -> u32 {
        self.categories.iter().map(CategoryReport::writes).sum()
    }

    pub fn aborted_categories(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories
            .iter()
            .filter(|c| c.outcome == CategoryOutcome::Aborted)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
