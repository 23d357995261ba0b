//! Stateless helpers shared by the table stages.

use polars::prelude::{AnyValue, BooleanChunked, DataFrame, NewChunkedArray, PlSmallStr};

use crate::spec::TableError;

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Numeric view of one cell; text is trimmed, blanks and `NaN` are `None`.
pub fn derive_f64_from_any_value(value: &AnyValue<'_>) -> Option<f64> {
    let n_value = match value {
        AnyValue::UInt8(val) => *val as f64,
        AnyValue::UInt16(val) => *val as f64,
        AnyValue::UInt32(val) => *val as f64,
        AnyValue::UInt64(val) => *val as f64,
        AnyValue::Int8(val) => *val as f64,
        AnyValue::Int16(val) => *val as f64,
        AnyValue::Int32(val) => *val as f64,
        AnyValue::Int64(val) => *val as f64,
        AnyValue::Float32(val) => *val as f64,
        AnyValue::Float64(val) => *val,
        AnyValue::String(val) => val.trim().parse::<f64>().ok()?,
        AnyValue::StringOwned(val) => val.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n_value.is_nan() { None } else { Some(n_value) }
}

/// Integer view of one cell; `None` when the cell holds no whole number.
pub fn derive_i64_from_any_value(value: &AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::UInt8(val) => Some(*val as i64),
        AnyValue::UInt16(val) => Some(*val as i64),
        AnyValue::UInt32(val) => Some(*val as i64),
        AnyValue::UInt64(val) => i64::try_from(*val).ok(),
        AnyValue::Int8(val) => Some(*val as i64),
        AnyValue::Int16(val) => Some(*val as i64),
        AnyValue::Int32(val) => Some(*val as i64),
        AnyValue::Int64(val) => Some(*val),
        AnyValue::String(val) => derive_i64_from_text(val),
        AnyValue::StringOwned(val) => derive_i64_from_text(val),
        _ => derive_f64_from_any_value(value).and_then(derive_i64_from_f64),
    }
}

fn derive_i64_from_text(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(derive_i64_from_f64))
}

fn derive_i64_from_f64(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as i64)
    } else {
        None
    }
}

/// Whether a cell counts as an absent key (null, blank text or `NaN`).
pub fn is_blank_any_value(value: &AnyValue<'_>) -> bool {
    match value {
        AnyValue::Null => true,
        AnyValue::String(val) => val.trim().is_empty(),
        AnyValue::StringOwned(val) => val.trim().is_empty(),
        AnyValue::Float32(val) => val.is_nan(),
        AnyValue::Float64(val) => val.is_nan(),
        _ => false,
    }
}

/// Display text of one cell; null becomes an empty string.
pub fn derive_text_from_any_value(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(val) => val.to_string(),
        AnyValue::StringOwned(val) => val.to_string(),
        _ => value.to_string(),
    }
}

/// Round to `n_decimals` fractional digits; exact ties go to the even digit,
/// as pandas `round` does.
pub fn round_to_decimals(value: f64, n_decimals: usize) -> f64 {
    let n_scale = 10f64.powi(n_decimals as i32);
    (value * n_scale).round_ties_even() / n_scale
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataFrameLikeUtils

/// Owned column names in frame order.
pub fn collect_column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

/// Read every cell of `col_name` as a numeric view.
pub fn collect_f64_column(df: &DataFrame, col_name: &str) -> Result<Vec<Option<f64>>, TableError> {
    let col = df.column(col_name)?;
    let mut l_values = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        l_values.push(derive_f64_from_any_value(&col.get(n_idx_row)?));
    }
    Ok(l_values)
}

/// Exact-equality signature of one row (type tags included).
pub fn derive_row_signature(df: &DataFrame, n_idx_row: usize) -> Result<String, TableError> {
    let mut l_parts = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        l_parts.push(format!("{:?}", col.get(n_idx_row)?));
    }
    Ok(l_parts.join("\u{1f}"))
}

/// Keep rows where `mask` is true.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame, TableError> {
    if mask.iter().all(|keep| *keep) {
        return Ok(df.clone());
    }
    let mask = BooleanChunked::from_slice(PlSmallStr::EMPTY, mask);
    Ok(df.filter(&mask)?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_f64_from_any_value_trims_and_rejects_text() {
        assert_eq!(derive_f64_from_any_value(&AnyValue::String(" 3.5 ")), Some(3.5));
        assert_eq!(derive_f64_from_any_value(&AnyValue::String("n/a")), None);
        assert_eq!(derive_f64_from_any_value(&AnyValue::Int64(7)), Some(7.0));
        assert_eq!(derive_f64_from_any_value(&AnyValue::Float64(f64::NAN)), None);
        assert_eq!(derive_f64_from_any_value(&AnyValue::Null), None);
    }

    #[test]
    fn test_derive_i64_from_any_value_accepts_only_whole_numbers() {
        assert_eq!(derive_i64_from_any_value(&AnyValue::String("41")), Some(41));
        assert_eq!(derive_i64_from_any_value(&AnyValue::String("41.0")), Some(41));
        assert_eq!(derive_i64_from_any_value(&AnyValue::Float64(41.0)), Some(41));
        assert_eq!(derive_i64_from_any_value(&AnyValue::Float64(41.5)), None);
        assert_eq!(derive_i64_from_any_value(&AnyValue::String("x12")), None);
    }

    #[test]
    fn test_is_blank_any_value() {
        assert!(is_blank_any_value(&AnyValue::Null));
        assert!(is_blank_any_value(&AnyValue::String("   ")));
        assert!(!is_blank_any_value(&AnyValue::String("0")));
        assert!(!is_blank_any_value(&AnyValue::Int64(0)));
    }

    #[test]
    fn test_round_to_decimals() {
        assert_eq!(round_to_decimals(11.499999999999998, 2), 11.5);
        assert_eq!(round_to_decimals(8.7000001, 2), 8.7);
        assert_eq!(round_to_decimals(-1.005, 0), -1.0);
    }

    #[test]
    fn test_round_to_decimals_ties_go_to_even() {
        assert_eq!(round_to_decimals(2.5, 0), 2.0);
        assert_eq!(round_to_decimals(3.5, 0), 4.0);
        assert_eq!(round_to_decimals(-2.5, 0), -2.0);
        assert_eq!(round_to_decimals(0.125, 2), 0.12);
        assert_eq!(round_to_decimals(0.375, 2), 0.38);
    }
}
