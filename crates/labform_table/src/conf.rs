//! Table-stage constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecDecimalGroup, SpecDecimalOptions, SpecMetricsOptions, SpecNormalizeOptions};

/// Canonical fat column name after renaming.
pub const C_COL_FAT: &str = "Fat";
/// Canonical protein column name after renaming.
pub const C_COL_PROTEIN: &str = "Protein";
/// Canonical lactose column name after renaming.
pub const C_COL_LACTOSE: &str = "Lactose";
/// Derived total solids column.
pub const C_COL_TOTAL_SOLIDS: &str = "TS";
/// Derived solids-non-fat column.
pub const C_COL_SOLIDS_NON_FAT: &str = "SNF";

/// Constant added to protein + lactose for solids-non-fat.
pub const N_SNF_OFFSET: f64 = 0.7;
/// Fractional digits kept by derived metrics.
pub const N_METRIC_DECIMALS: usize = 2;

/// Precision violations printed in full before the "and N more" line.
pub const N_DECIMAL_VIOLATIONS_LOGGED: usize = 5;
/// Dropped zero-nutrient rows previewed in logs.
pub const N_ZERO_NUTRIENT_ROWS_PREVIEW: usize = 10;

/// Columns the analyzer export carries but the lab report never uses.
pub const TUP_COLS_DROP_DEFAULT: [&str; 4] = ["Sample ID", "Product", "Date", "Time"];

/// Build the default canonical rename mapping.
pub fn derive_default_column_renames() -> BTreeMap<String, String> {
    [
        ("FAT", C_COL_FAT),
        ("PROTEIN", C_COL_PROTEIN),
        ("LACTOSE", C_COL_LACTOSE),
        ("Freezing point", "FPD"),
    ]
    .into_iter()
    .map(|(old, new)| (old.to_string(), new.to_string()))
    .collect()
}

/// Build default normalization options.
pub fn derive_default_normalize_options() -> SpecNormalizeOptions {
    SpecNormalizeOptions {
        cols_drop: TUP_COLS_DROP_DEFAULT.iter().map(ToString::to_string).collect(),
        col_renames: derive_default_column_renames(),
        if_drop_column_after_key: true,
    }
}

/// Build default decimal groups (2-decimal nutrients, 4-decimal freezing point).
pub fn derive_default_decimal_options() -> SpecDecimalOptions {
    SpecDecimalOptions {
        groups: vec![
            SpecDecimalGroup {
                n_decimals: 2,
                cols: [C_COL_FAT, C_COL_PROTEIN, C_COL_LACTOSE, "Density"]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            },
            SpecDecimalGroup {
                n_decimals: 4,
                cols: vec!["FPD".to_string()],
            },
        ],
    }
}

/// Build default derived-metric options.
pub fn derive_default_metrics_options() -> SpecMetricsOptions {
    SpecMetricsOptions {
        col_fat: C_COL_FAT.to_string(),
        col_protein: C_COL_PROTEIN.to_string(),
        col_lactose: C_COL_LACTOSE.to_string(),
        col_total_solids: C_COL_TOTAL_SOLIDS.to_string(),
        col_solids_non_fat: C_COL_SOLIDS_NON_FAT.to_string(),
    }
}
