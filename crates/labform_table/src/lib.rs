//! `labform_table` v1:
//! Rust-side normalization kernel for lab measurement tables.
//!
//! Module layout:
//! - `conf`      : constants and default presets
//! - `spec`      : options/models/errors
//! - `util`      : pure helper functions
//! - `resolver`  : logical-field column lookup
//! - `normalize` : cleaning pipeline and zero-nutrient elimination
//! - `decimal`   : fixed-precision formatting with validation
//! - `metrics`   : derived TS/SNF columns
//! - `pairs`     : `(key, measurement)` extraction
//! - `report`    : stage reports
pub mod conf;
pub mod decimal;
pub mod metrics;
pub mod normalize;
pub mod pairs;
pub mod report;
pub mod resolver;
pub mod spec;
pub mod util;

pub use conf::{
    C_COL_FAT, C_COL_LACTOSE, C_COL_PROTEIN, C_COL_SOLIDS_NON_FAT, C_COL_TOTAL_SOLIDS,
    N_SNF_OFFSET,
};
pub use decimal::{count_decimals, format_decimals, format_smart, validate_decimals};
pub use metrics::calculate_derived_metrics;
pub use normalize::{
    NormalizedTable, count_replicate_rows, drop_duplicate_rows, drop_zero_nutrient_rows,
    find_rows_missing_key, normalize_table,
};
pub use pairs::extract_measurement_pairs;
pub use report::{ReportDecimalPrecision, ReportZeroNutrient};
pub use resolver::{ColumnResolver, normalize_header};
pub use spec::{
    EnumLogicalField, SpecDecimalGroup, SpecDecimalOptions, SpecDecimalViolation,
    SpecMeasurementPair, SpecMeasurementPairs, SpecMetricsOptions, SpecNormalizeOptions,
    SpecZeroNutrientOptions, TableError,
};
