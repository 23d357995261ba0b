//! Table-stage specification models, options and errors.

use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::PolarsError;

use crate::conf::{
    C_COL_FAT, C_COL_LACTOSE, C_COL_PROTEIN, derive_default_decimal_options,
    derive_default_metrics_options, derive_default_normalize_options,
};

////////////////////////////////////////////////////////////////////////////////
// #region LogicalFields

/// Logical field located by [`crate::resolver::ColumnResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumLogicalField {
    /// Sequential sample number (`a/a`).
    OrdinalKey,
    /// Per-sample measurement placed on the form (pH).
    Measurement,
    /// Fat content.
    Fat,
    /// Protein content.
    Protein,
    /// Lactose content.
    Lactose,
}

impl EnumLogicalField {
    /// Human-readable field name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrdinalKey => "ordinal key",
            Self::Measurement => "measurement",
            Self::Fat => "fat",
            Self::Protein => "protein",
            Self::Lactose => "lactose",
        }
    }

    /// Built-in aliases, already in normalized header form.
    pub fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::OrdinalKey => &["a/a", "aa"],
            Self::Measurement => &["ph"],
            Self::Fat => &["fat"],
            Self::Protein => &["protein"],
            Self::Lactose => &["lactose"],
        }
    }

    /// Every built-in field, in declaration order.
    pub fn all() -> [EnumLogicalField; 5] {
        [
            Self::OrdinalKey,
            Self::Measurement,
            Self::Fat,
            Self::Protein,
            Self::Lactose,
        ]
    }
}

impl fmt::Display for EnumLogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StageOptions

/// Options for [`crate::normalize::normalize_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecNormalizeOptions {
    /// Column names to drop after header trimming; absent names are ignored.
    pub cols_drop: Vec<String>,
    /// Canonical renames applied last, all at once.
    pub col_renames: BTreeMap<String, String>,
    /// Drop the unnamed column that follows the ordinal key in raw exports.
    pub if_drop_column_after_key: bool,
}

impl Default for SpecNormalizeOptions {
    fn default() -> Self {
        derive_default_normalize_options()
    }
}

/// Columns inspected by zero-nutrient row elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecZeroNutrientOptions {
    /// Fat column.
    pub col_fat: String,
    /// Protein column.
    pub col_protein: String,
    /// Lactose column.
    pub col_lactose: String,
}

impl Default for SpecZeroNutrientOptions {
    fn default() -> Self {
        Self {
            col_fat: C_COL_FAT.to_string(),
            col_protein: C_COL_PROTEIN.to_string(),
            col_lactose: C_COL_LACTOSE.to_string(),
        }
    }
}

/// One precision group: every listed column is formatted with `n_decimals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDecimalGroup {
    /// Fractional digits kept (and maximum allowed after formatting).
    pub n_decimals: usize,
    /// Columns in this group; absent names are skipped.
    pub cols: Vec<String>,
}

/// Options for [`crate::decimal::format_decimals`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDecimalOptions {
    /// Groups applied in order.
    pub groups: Vec<SpecDecimalGroup>,
}

impl Default for SpecDecimalOptions {
    fn default() -> Self {
        derive_default_decimal_options()
    }
}

/// Input/output column names for [`crate::metrics::calculate_derived_metrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMetricsOptions {
    /// Fat input column.
    pub col_fat: String,
    /// Protein input column.
    pub col_protein: String,
    /// Lactose input column.
    pub col_lactose: String,
    /// Output column for total solids.
    pub col_total_solids: String,
    /// Output column for solids-non-fat.
    pub col_solids_non_fat: String,
}

impl Default for SpecMetricsOptions {
    fn default() -> Self {
        derive_default_metrics_options()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MeasurementPairs

/// One `(key, value)` pair; `value == None` marks a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecMeasurementPair {
    /// Ordinal key.
    pub key: i64,
    /// Measurement value, if present.
    pub value: Option<f64>,
}

/// Key-unique pair sequence, ascending by key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecMeasurementPairs {
    pairs: Vec<SpecMeasurementPair>,
}

impl SpecMeasurementPairs {
    /// Build from arbitrary pairs: later pairs override earlier ones with the
    /// same key, result sorted ascending.
    pub fn from_pairs(pairs: impl IntoIterator<Item = SpecMeasurementPair>) -> Self {
        let dict_by_key: BTreeMap<i64, Option<f64>> =
            pairs.into_iter().map(|pair| (pair.key, pair.value)).collect();
        Self {
            pairs: dict_by_key
                .into_iter()
                .map(|(key, value)| SpecMeasurementPair { key, value })
                .collect(),
        }
    }

    /// Full sequence, gaps included.
    pub fn as_slice(&self) -> &[SpecMeasurementPair] {
        &self.pairs
    }

    /// Number of pairs, gaps included.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Keys whose value is missing, ascending.
    pub fn missing_keys(&self) -> Vec<i64> {
        self.pairs
            .iter()
            .filter(|pair| pair.value.is_none())
            .map(|pair| pair.key)
            .collect()
    }

    /// Lookup restricted to pairs with a value.
    pub fn to_map(&self) -> BTreeMap<i64, f64> {
        self.pairs
            .iter()
            .filter_map(|pair| pair.value.map(|value| (pair.key, value)))
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// One formatted cell carrying more fractional digits than allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDecimalViolation {
    /// Column name.
    pub column: String,
    /// 0-based row position.
    pub row: usize,
    /// Formatted cell text.
    pub value: String,
    /// Fractional digits found.
    pub n_decimals: usize,
    /// Fractional digits allowed.
    pub n_decimals_max: usize,
}

impl fmt::Display for SpecDecimalViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column {:?}, row {}, value {} has {} decimals (max {})",
            self.column, self.row, self.value, self.n_decimals, self.n_decimals_max
        )
    }
}

/// Errors raised by table stages.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A required logical column is unresolvable.
    #[error("column not found for {field}; headers: {headers:?}")]
    ColumnNotFound {
        /// Logical field name.
        field: String,
        /// Headers searched.
        headers: Vec<String>,
    },
    /// The ordinal key holds a value that is not an integer.
    #[error("ordinal key {column:?} row {row}: {value:?} is not an integer")]
    KeyType {
        /// Key column name.
        column: String,
        /// 0-based row position.
        row: usize,
        /// Offending cell text.
        value: String,
    },
    /// Post-format validation found cells over their precision.
    #[error(
        "{} decimal precision violation(s), first: {}",
        .violations.len(),
        .violations.first().map(ToString::to_string).unwrap_or_default()
    )]
    DecimalPrecision {
        /// Every violation, in column then row order.
        violations: Vec<SpecDecimalViolation>,
    },
    /// An input column of a derived metric is absent.
    #[error("missing column: {column:?}")]
    MissingColumn {
        /// Absent column name.
        column: String,
    },
    /// Underlying dataframe failure.
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
