//! Fixed-precision formatting of numeric columns, with a post-format check.

use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::normalize::NormalizedTable;
use crate::report::ReportDecimalPrecision;
use crate::spec::{SpecDecimalOptions, SpecDecimalViolation, TableError};
use crate::util::{collect_column_names, collect_f64_column, derive_text_from_any_value};

/// Format `value` with `n_decimals` digits, then strip trailing zeros and a
/// trailing point (`3.50` -> `"3.5"`, `3.00` -> `"3"`).
pub fn format_smart(value: f64, n_decimals: usize) -> String {
    let c_fixed = format!("{value:.n_decimals$}");
    let c_trimmed = if c_fixed.contains('.') {
        c_fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        c_fixed.as_str()
    };
    if c_trimmed == "-0" {
        "0".to_string()
    } else {
        c_trimmed.to_string()
    }
}

/// Fractional digits of a formatted value; 0 without a decimal point.
pub fn count_decimals(text: &str) -> usize {
    text.split_once('.')
        .map(|(_, c_frac)| c_frac.chars().count())
        .unwrap_or(0)
}

/// Format every configured column and validate the result.
///
/// Listed columns absent from the table are skipped. Formatted columns become
/// text; cells that are not numeric become null. Violations never abort the
/// stage, they are collected in the returned report.
pub fn format_decimals(
    table: &NormalizedTable,
    options: &SpecDecimalOptions,
) -> Result<(NormalizedTable, ReportDecimalPrecision), TableError> {
    let mut df_work = table.dataframe().clone();
    let l_colnames = collect_column_names(&df_work);
    let mut report = ReportDecimalPrecision::default();

    for group in &options.groups {
        for col_name in group.cols.iter().filter(|c_name| l_colnames.contains(*c_name)) {
            if col_name == table.col_key() {
                tracing::warn!(column = %col_name, "ordinal key is never reformatted");
                continue;
            }
            let l_formatted: Vec<Option<String>> = collect_f64_column(&df_work, col_name)?
                .into_iter()
                .map(|value| value.map(|n_value| format_smart(n_value, group.n_decimals)))
                .collect();
            df_work.with_column(Series::new(col_name.as_str().into(), l_formatted))?;
            tracing::debug!(column = %col_name, n_decimals = group.n_decimals, "formatted");
            report.cols_formatted.push(col_name.clone());
        }
    }

    for group in &options.groups {
        let l_cols_checked: Vec<String> = group
            .cols
            .iter()
            .filter(|c_name| report.cols_formatted.contains(*c_name))
            .cloned()
            .collect();
        report
            .violations
            .extend(validate_decimals(&df_work, &l_cols_checked, group.n_decimals)?);
    }

    report.log();
    Ok((table.with_dataframe(df_work), report))
}

/// Collect every cell of `columns` holding more than `n_decimals_max`
/// fractional digits. Absent columns are skipped; nulls count as 0 digits.
pub fn validate_decimals(
    df: &DataFrame,
    columns: &[String],
    n_decimals_max: usize,
) -> Result<Vec<SpecDecimalViolation>, TableError> {
    let l_colnames = collect_column_names(df);
    let mut l_violations = Vec::new();
    for col_name in columns.iter().filter(|c_name| l_colnames.contains(*c_name)) {
        let col = df.column(col_name)?;
        for n_idx_row in 0..df.height() {
            let c_value = derive_text_from_any_value(&col.get(n_idx_row)?);
            let n_decimals = count_decimals(&c_value);
            if n_decimals > n_decimals_max {
                l_violations.push(SpecDecimalViolation {
                    column: col_name.clone(),
                    row: n_idx_row,
                    value: c_value,
                    n_decimals,
                    n_decimals_max,
                });
            }
        }
    }
    Ok(l_violations)
}

#[cfg(test)]
mod tests {
    use polars::prelude::{AnyValue, Column};

    use super::*;
    use crate::spec::SpecDecimalGroup;

    #[test]
    fn test_format_smart_strips_trailing_zeros() {
        assert_eq!(format_smart(3.50, 2), "3.5");
        assert_eq!(format_smart(3.00, 2), "3");
        assert_eq!(format_smart(0.52049, 4), "0.5205");
        assert_eq!(format_smart(100.0, 2), "100");
        assert_eq!(format_smart(100.0, 0), "100");
        assert_eq!(format_smart(-0.001, 2), "0");
    }

    #[test]
    fn test_format_smart_parse_back_stays_within_precision() {
        for (value, n_decimals) in [(3.14159, 2), (0.520_49, 4), (12.0049, 2), (-7.77777, 4)] {
            let c_formatted = format_smart(value, n_decimals);
            assert!(count_decimals(&c_formatted) <= n_decimals);
            let n_parsed: f64 = c_formatted.parse().unwrap();
            assert!((n_parsed - value).abs() <= 10f64.powi(-(n_decimals as i32)));
        }
    }

    #[test]
    fn test_count_decimals() {
        assert_eq!(count_decimals("3.125"), 3);
        assert_eq!(count_decimals("3"), 0);
        assert_eq!(count_decimals(""), 0);
    }

    #[test]
    fn test_validate_decimals_reports_every_violation() {
        let df = DataFrame::new(vec![
            Column::new("Fat".into(), &[Some("3.5"), Some("3.141"), None, Some("2.71828")]),
            Column::new("FPD".into(), &["0.52", "0.52001", "0.5", "0.5"]),
        ])
        .unwrap();
        let l_violations = validate_decimals(
            &df,
            &["Fat".to_string(), "FPD".to_string(), "Absent".to_string()],
            2,
        )
        .unwrap();
        let l_found: Vec<(&str, usize)> = l_violations
            .iter()
            .map(|v| (v.column.as_str(), v.row))
            .collect();
        assert_eq!(l_found, vec![("Fat", 1), ("Fat", 3), ("FPD", 1)]);
        assert_eq!(l_violations[1].n_decimals, 5);
    }

    #[test]
    fn test_format_decimals_formats_groups_and_passes_nulls() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &[1i64, 2, 3]),
            Column::new("Fat".into(), &["3.50", "x", "4.256"]),
            Column::new("FPD".into(), &[0.52, 0.5201234, 0.5]),
        ])
        .unwrap();
        let table = crate::normalize::NormalizedTable::from_parts_for_test(df, "a/a");
        let options = SpecDecimalOptions {
            groups: vec![
                SpecDecimalGroup {
                    n_decimals: 2,
                    cols: vec!["Fat".to_string(), "Protein".to_string()],
                },
                SpecDecimalGroup {
                    n_decimals: 4,
                    cols: vec!["FPD".to_string()],
                },
            ],
        };

        let (table_fmt, report) = format_decimals(&table, &options).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.cols_formatted, vec!["Fat", "FPD"]);

        let df_fmt = table_fmt.dataframe();
        let col_fat = df_fmt.column("Fat").unwrap();
        assert_eq!(col_fat.get(0).unwrap(), AnyValue::String("3.5"));
        assert_eq!(col_fat.get(1).unwrap(), AnyValue::Null);
        assert_eq!(col_fat.get(2).unwrap(), AnyValue::String("4.26"));
        assert_eq!(
            df_fmt.column("FPD").unwrap().get(1).unwrap(),
            AnyValue::String("0.5201")
        );
    }
}
