//! Stage report models.

use std::fmt;

use crate::conf::N_DECIMAL_VIOLATIONS_LOGGED;
use crate::spec::{SpecDecimalViolation, TableError};

/// Outcome of one zero-nutrient elimination run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportZeroNutrient {
    /// Whether the filter ran (false when a column was absent).
    pub if_applied: bool,
    /// Rows before filtering.
    pub cnt_rows_before: usize,
    /// 0-based positions (pre-filter) of dropped rows.
    pub rows_dropped: Vec<usize>,
    /// Required columns absent from the table.
    pub cols_missing: Vec<String>,
}

impl ReportZeroNutrient {
    /// Rows left after filtering.
    pub fn cnt_rows_after(&self) -> usize {
        self.cnt_rows_before - self.rows_dropped.len()
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        if !self.if_applied {
            return format!("{prefix} skipped, missing columns {:?}", self.cols_missing);
        }
        format!(
            "{prefix} before={} dropped={} after={}",
            self.cnt_rows_before,
            self.rows_dropped.len(),
            self.cnt_rows_after()
        )
    }
}

impl fmt::Display for ReportZeroNutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[ZERO-NUTRIENT]"))
    }
}

/// Every precision violation found by one formatter run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportDecimalPrecision {
    /// Columns formatted (present in the table).
    pub cols_formatted: Vec<String>,
    /// Violations in column then row order.
    pub violations: Vec<SpecDecimalViolation>,
}

impl ReportDecimalPrecision {
    /// Whether every formatted cell is within its precision.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Turn a non-empty report into [`TableError::DecimalPrecision`].
    pub fn into_result(self) -> Result<(), TableError> {
        if self.violations.is_empty() {
            return Ok(());
        }
        Err(TableError::DecimalPrecision {
            violations: self.violations,
        })
    }

    /// Emit the report: the first few violations in full, then a count.
    pub fn log(&self) {
        if self.is_clean() {
            tracing::info!(columns = ?self.cols_formatted, "decimal limits respected");
            return;
        }
        tracing::warn!(count = self.violations.len(), "decimal precision violations");
        for violation in self.violations.iter().take(N_DECIMAL_VIOLATIONS_LOGGED) {
            tracing::warn!("  {violation}");
        }
        if self.violations.len() > N_DECIMAL_VIOLATIONS_LOGGED {
            tracing::warn!(
                "  ... and {} more",
                self.violations.len() - N_DECIMAL_VIOLATIONS_LOGGED
            );
        }
    }
}
