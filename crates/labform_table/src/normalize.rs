//! Table normalization pipeline and zero-nutrient row elimination.

use std::collections::HashSet;

use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::conf::N_ZERO_NUTRIENT_ROWS_PREVIEW;
use crate::report::ReportZeroNutrient;
use crate::resolver::ColumnResolver;
use crate::spec::{EnumLogicalField, SpecNormalizeOptions, SpecZeroNutrientOptions, TableError};
use crate::util::{
    collect_column_names, collect_f64_column, derive_f64_from_any_value, derive_i64_from_any_value,
    derive_row_signature, derive_text_from_any_value, filter_rows, is_blank_any_value,
};

/// Cleaned table: canonical names, no duplicate rows, integer ordinal key.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    df: DataFrame,
    col_key: String,
}

impl NormalizedTable {
    /// Borrow the underlying frame.
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Take the underlying frame.
    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    /// Canonical name of the ordinal-key column.
    pub fn col_key(&self) -> &str {
        &self.col_key
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Same key column, different frame.
    pub(crate) fn with_dataframe(&self, df: DataFrame) -> Self {
        Self {
            df,
            col_key: self.col_key.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts_for_test(df: DataFrame, col_key: &str) -> Self {
        Self {
            df,
            col_key: col_key.to_string(),
        }
    }

    /// Re-run the cleaning steps on an already normalized table.
    ///
    /// The positional artifact-column drop applies to raw exports only and is
    /// skipped here, so the result equals `self` for any table produced by
    /// [`normalize_table`] with the same options.
    pub fn renormalize(&self, options: &SpecNormalizeOptions) -> Result<Self, TableError> {
        normalize_with_key(&self.df, &self.col_key, options)
    }
}

/// Clean a raw table.
///
/// Steps, in order: drop the column after the ordinal key, trim headers, drop
/// denylisted columns, remove duplicate rows, drop rows without a key, coerce
/// the key to `Int64`, rename to canonical names.
pub fn normalize_table(
    df: &DataFrame,
    resolver: &ColumnResolver,
    options: &SpecNormalizeOptions,
) -> Result<NormalizedTable, TableError> {
    let col_key_raw = resolver.resolve_in(EnumLogicalField::OrdinalKey, df)?;

    let mut df_work = df.clone();
    if options.if_drop_column_after_key {
        let l_colnames = collect_column_names(&df_work);
        let n_idx_key = l_colnames
            .iter()
            .position(|c_name| *c_name == col_key_raw)
            .unwrap_or_default();
        if let Some(col_after_key) = l_colnames.get(n_idx_key + 1) {
            tracing::debug!(column = %col_after_key, "dropping column after ordinal key");
            df_work = df_work.drop(col_after_key)?;
        }
    }

    normalize_with_key(&df_work, &col_key_raw, options)
}

fn normalize_with_key(
    df: &DataFrame,
    col_key_raw: &str,
    options: &SpecNormalizeOptions,
) -> Result<NormalizedTable, TableError> {
    // Headers that collide once trimmed keep their first column.
    let mut set_names_seen = HashSet::new();
    let mut l_cols_kept = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let c_name = col.name().trim().to_string();
        if !set_names_seen.insert(c_name.clone()) {
            tracing::warn!(
                column = %col.name(),
                header = %c_name,
                "duplicate header after trimming; later column dropped"
            );
            continue;
        }
        let mut col_kept = col.clone();
        col_kept.rename(c_name.into());
        l_cols_kept.push(col_kept);
    }
    let mut df_work = DataFrame::new(l_cols_kept)?;
    let l_colnames_trimmed = collect_column_names(&df_work);
    let col_key = col_key_raw.trim().to_string();

    let l_cols_drop: Vec<&String> = options
        .cols_drop
        .iter()
        .filter(|c_name| l_colnames_trimmed.contains(*c_name))
        .collect();
    for col_drop in l_cols_drop {
        if *col_drop == col_key {
            tracing::warn!(column = %col_drop, "denylist names the ordinal key; kept");
            continue;
        }
        df_work = df_work.drop(col_drop)?;
    }

    df_work = drop_duplicate_rows(&df_work)?;

    let col_key_values = df_work.column(&col_key)?;
    let mut l_mask_keyed = Vec::with_capacity(df_work.height());
    for n_idx_row in 0..df_work.height() {
        l_mask_keyed.push(!is_blank_any_value(&col_key_values.get(n_idx_row)?));
    }
    df_work = filter_rows(&df_work, &l_mask_keyed)?;

    let col_key_values = df_work.column(&col_key)?;
    let mut l_keys = Vec::with_capacity(df_work.height());
    for n_idx_row in 0..df_work.height() {
        let value = col_key_values.get(n_idx_row)?;
        let Some(n_key) = derive_i64_from_any_value(&value) else {
            return Err(TableError::KeyType {
                column: col_key.clone(),
                row: n_idx_row,
                value: derive_text_from_any_value(&value),
            });
        };
        l_keys.push(n_key);
    }
    df_work.with_column(Series::new(col_key.as_str().into(), l_keys))?;

    let l_colnames_final: Vec<String> = collect_column_names(&df_work)
        .into_iter()
        .map(|c_name| options.col_renames.get(&c_name).cloned().unwrap_or(c_name))
        .collect();
    df_work.set_column_names(l_colnames_final.iter().map(String::as_str))?;
    let col_key = options.col_renames.get(&col_key).cloned().unwrap_or(col_key);

    tracing::info!(rows = df_work.height(), "initial filtering done");
    Ok(NormalizedTable {
        df: df_work,
        col_key,
    })
}

/// Remove rows equal in every column to an earlier row.
pub fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame, TableError> {
    let mut set_signatures = HashSet::with_capacity(df.height());
    let mut l_mask = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        l_mask.push(set_signatures.insert(derive_row_signature(df, n_idx_row)?));
    }
    filter_rows(df, &l_mask)
}

/// 0-based positions of raw rows whose ordinal key is null or blank.
pub fn find_rows_missing_key(
    df: &DataFrame,
    resolver: &ColumnResolver,
) -> Result<Vec<usize>, TableError> {
    let col_key = resolver.resolve_in(EnumLogicalField::OrdinalKey, df)?;
    let col_key_values = df.column(&col_key)?;
    let mut l_rows_missing = Vec::new();
    for n_idx_row in 0..df.height() {
        if is_blank_any_value(&col_key_values.get(n_idx_row)?) {
            l_rows_missing.push(n_idx_row);
        }
    }
    Ok(l_rows_missing)
}

/// Rows beyond the highest ordinal key: `height - max(key)`.
///
/// Keys are numbered from 1, so a positive count means some samples were
/// measured more than once. Keys that are not numeric are ignored; `None`
/// when no key is numeric at all.
pub fn count_replicate_rows(
    df: &DataFrame,
    resolver: &ColumnResolver,
) -> Result<Option<i64>, TableError> {
    let col_key = resolver.resolve_in(EnumLogicalField::OrdinalKey, df)?;
    let col_key_values = df.column(&col_key)?;
    let mut n_key_max: Option<f64> = None;
    for n_idx_row in 0..df.height() {
        if let Some(n_key) = derive_f64_from_any_value(&col_key_values.get(n_idx_row)?) {
            n_key_max = Some(n_key_max.map_or(n_key, |n_max| n_max.max(n_key)));
        }
    }
    Ok(n_key_max.map(|n_max| df.height() as i64 - n_max.trunc() as i64))
}

/// Drop rows where fat, protein and lactose are all exactly zero.
///
/// Non-numeric cells count as zero. When any of the three columns is absent
/// the table is returned unchanged and the report says so.
pub fn drop_zero_nutrient_rows(
    table: &NormalizedTable,
    options: &SpecZeroNutrientOptions,
) -> Result<(NormalizedTable, ReportZeroNutrient), TableError> {
    let df = table.dataframe();
    let l_cols = [&options.col_fat, &options.col_protein, &options.col_lactose];
    let l_colnames = collect_column_names(df);
    let l_cols_missing: Vec<String> = l_cols
        .iter()
        .filter(|c_name| !l_colnames.contains(**c_name))
        .map(|c_name| c_name.to_string())
        .collect();

    let mut report = ReportZeroNutrient {
        cnt_rows_before: df.height(),
        ..Default::default()
    };
    if !l_cols_missing.is_empty() {
        tracing::warn!(missing = ?l_cols_missing, "zero nutrient filter skipped");
        report.cols_missing = l_cols_missing;
        return Ok((table.clone(), report));
    }

    let l_fat = collect_f64_column(df, &options.col_fat)?;
    let l_protein = collect_f64_column(df, &options.col_protein)?;
    let l_lactose = collect_f64_column(df, &options.col_lactose)?;

    let mut l_mask = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        let if_all_zero = [&l_fat, &l_protein, &l_lactose]
            .iter()
            .all(|l_values| l_values[n_idx_row].unwrap_or(0.0) == 0.0);
        if if_all_zero {
            report.rows_dropped.push(n_idx_row);
            if report.rows_dropped.len() <= N_ZERO_NUTRIENT_ROWS_PREVIEW {
                tracing::info!(
                    row = n_idx_row,
                    fat = ?l_fat[n_idx_row],
                    protein = ?l_protein[n_idx_row],
                    lactose = ?l_lactose[n_idx_row],
                    "zero nutrient row"
                );
            }
        }
        l_mask.push(!if_all_zero);
    }

    let df_kept = filter_rows(df, &l_mask)?;
    report.if_applied = true;
    tracing::info!("{report}");
    Ok((table.with_dataframe(df_kept), report))
}

#[cfg(test)]
mod tests {
    use polars::prelude::{AnyValue, Column, DataType};

    use super::*;

    fn make_raw_df() -> DataFrame {
        DataFrame::new(vec![
            Column::new("a/a ".into(), &[Some("1"), Some("2"), Some("2"), None, Some(" ")]),
            Column::new("Unnamed: 1".into(), &["x", "y", "y", "z", "w"]),
            Column::new(" Fat".into(), &["3.5", "3.6", "3.6", "3.7", "3.8"]),
            Column::new("Sample ID".into(), &["s1", "s2", "s2", "s3", "s4"]),
            Column::new("PROTEIN".into(), &["3.2", "3.3", "3.3", "3.4", "3.5"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_table_applies_all_steps() {
        let table = normalize_table(
            &make_raw_df(),
            &ColumnResolver::default(),
            &SpecNormalizeOptions::default(),
        )
        .unwrap();

        let df = table.dataframe();
        assert_eq!(df.get_column_names_str(), vec!["a/a", "Fat", "Protein"]);
        assert_eq!(table.col_key(), "a/a");
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("a/a").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("a/a").unwrap().get(1).unwrap(), AnyValue::Int64(2));
    }

    #[test]
    fn test_normalize_table_is_idempotent() {
        let options = SpecNormalizeOptions::default();
        let table =
            normalize_table(&make_raw_df(), &ColumnResolver::default(), &options).unwrap();
        let table_again = table.renormalize(&options).unwrap();
        assert_eq!(table_again, table);
    }

    #[test]
    fn test_normalize_table_renames_key_column() {
        let mut options = SpecNormalizeOptions::default();
        options
            .col_renames
            .insert("a/a".to_string(), "Sample No".to_string());
        let table = normalize_table(&make_raw_df(), &ColumnResolver::default(), &options).unwrap();
        assert_eq!(table.col_key(), "Sample No");
        assert!(table.dataframe().column("Sample No").is_ok());
    }

    #[test]
    fn test_normalize_table_rejects_fractional_key() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &["1", "2.5"]),
            Column::new("artifact".into(), &["", ""]),
            Column::new("pH".into(), &["6.6", "6.7"]),
        ])
        .unwrap();
        let err = normalize_table(&df, &ColumnResolver::default(), &SpecNormalizeOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, TableError::KeyType { row: 1, ref value, .. } if value == "2.5"));
    }

    #[test]
    fn test_normalize_table_without_key_column_errors() {
        let df = DataFrame::new(vec![Column::new("pH".into(), &["6.6"])]).unwrap();
        let err = normalize_table(&df, &ColumnResolver::default(), &SpecNormalizeOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, TableError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_normalize_table_keeps_first_of_colliding_headers() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &["1", "2"]),
            Column::new("Unnamed: 1".into(), &["", ""]),
            Column::new("pH".into(), &["6.6", "6.7"]),
            Column::new("pH ".into(), &["x", "y"]),
        ])
        .unwrap();
        let table =
            normalize_table(&df, &ColumnResolver::default(), &SpecNormalizeOptions::default())
                .unwrap();

        let df = table.dataframe();
        assert_eq!(df.get_column_names_str(), vec!["a/a", "pH"]);
        assert_eq!(df.column("pH").unwrap().get(1).unwrap(), AnyValue::String("6.7"));
        assert_eq!(
            table.renormalize(&SpecNormalizeOptions::default()).unwrap(),
            table
        );
    }

    #[test]
    fn test_find_rows_missing_key() {
        let rows = find_rows_missing_key(&make_raw_df(), &ColumnResolver::default()).unwrap();
        assert_eq!(rows, vec![3, 4]);
    }

    #[test]
    fn test_count_replicate_rows() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &[Some("1"), Some("2"), Some("3"), Some("1"), None]),
            Column::new("pH".into(), &["6.6", "6.7", "6.8", "6.6", "6.9"]),
        ])
        .unwrap();
        assert_eq!(count_replicate_rows(&df, &ColumnResolver::default()).unwrap(), Some(2));

        let df = DataFrame::new(vec![Column::new("a/a".into(), &["1", "2", "3"])]).unwrap();
        assert_eq!(count_replicate_rows(&df, &ColumnResolver::default()).unwrap(), Some(0));

        let df = DataFrame::new(vec![Column::new("a/a".into(), &[None::<&str>, Some("x")])]).unwrap();
        assert_eq!(count_replicate_rows(&df, &ColumnResolver::default()).unwrap(), None);
    }

    #[test]
    fn test_drop_zero_nutrient_rows_removes_only_all_zero_rows() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &[1i64, 2, 3]),
            Column::new("Fat".into(), &["0", "3.5", "0"]),
            Column::new("Protein".into(), &["0", "3.2", "n/a"]),
            Column::new("Lactose".into(), &["0.0", "4.8", "0.1"]),
        ])
        .unwrap();
        let table = NormalizedTable {
            df,
            col_key: "a/a".to_string(),
        };

        let (table_kept, report) =
            drop_zero_nutrient_rows(&table, &SpecZeroNutrientOptions::default()).unwrap();
        assert!(report.if_applied);
        assert_eq!(report.rows_dropped, vec![0]);
        assert_eq!(table_kept.height(), 2);
        assert_eq!(
            table_kept.dataframe().column("a/a").unwrap().get(0).unwrap(),
            AnyValue::Int64(2)
        );
    }

    #[test]
    fn test_drop_zero_nutrient_rows_soft_fails_on_missing_column() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &[1i64]),
            Column::new("Fat".into(), &[0.0]),
        ])
        .unwrap();
        let table = NormalizedTable {
            df,
            col_key: "a/a".to_string(),
        };

        let (table_kept, report) =
            drop_zero_nutrient_rows(&table, &SpecZeroNutrientOptions::default()).unwrap();
        assert!(!report.if_applied);
        assert_eq!(report.cols_missing, vec!["Protein", "Lactose"]);
        assert_eq!(table_kept, table);
    }
}
