//! Reduction of a table to `(ordinal key, measurement)` pairs.

use polars::prelude::DataFrame;

use crate::resolver::ColumnResolver;
use crate::spec::{EnumLogicalField, SpecMeasurementPair, SpecMeasurementPairs, TableError};
use crate::util::{derive_f64_from_any_value, derive_i64_from_any_value, derive_text_from_any_value};

/// Extract the key-unique, key-sorted pairs of `field` from `df`.
///
/// Both columns are located with `resolver`. Keys that are not numeric are
/// treated as null and their rows dropped; a numeric key with a fractional
/// part fails with [`TableError::KeyType`]. When a key repeats, the last row
/// wins. A non-numeric measurement becomes a gap (`value == None`).
pub fn extract_measurement_pairs(
    df: &DataFrame,
    resolver: &ColumnResolver,
    field: EnumLogicalField,
) -> Result<SpecMeasurementPairs, TableError> {
    let col_key = resolver.resolve_in(EnumLogicalField::OrdinalKey, df)?;
    let col_value = resolver.resolve_in(field, df)?;
    let col_key_values = df.column(&col_key)?;
    let col_value_values = df.column(&col_value)?;

    let mut l_pairs = Vec::with_capacity(df.height());
    let mut cnt_rows_unkeyed = 0usize;
    for n_idx_row in 0..df.height() {
        let value_key = col_key_values.get(n_idx_row)?;
        if derive_f64_from_any_value(&value_key).is_none() {
            cnt_rows_unkeyed += 1;
            continue;
        }
        let Some(n_key) = derive_i64_from_any_value(&value_key) else {
            return Err(TableError::KeyType {
                column: col_key.clone(),
                row: n_idx_row,
                value: derive_text_from_any_value(&value_key),
            });
        };
        l_pairs.push(SpecMeasurementPair {
            key: n_key,
            value: derive_f64_from_any_value(&col_value_values.get(n_idx_row)?),
        });
    }

    let pairs = SpecMeasurementPairs::from_pairs(l_pairs);
    tracing::debug!(
        key = %col_key,
        value = %col_value,
        rows_unkeyed = cnt_rows_unkeyed,
        "measurement columns resolved"
    );
    tracing::info!(
        pairs = pairs.len(),
        missing = pairs.missing_keys().len(),
        "measurement pairs extracted"
    );
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::*;

    #[test]
    fn test_extract_pairs_sorts_and_keeps_last_duplicate() {
        let df = DataFrame::new(vec![
            Column::new(" A/A".into(), &[Some("3"), Some("1"), None, Some("3"), Some("2")]),
            Column::new("pH ".into(), &["6.61", "6.70", "6.90", "6.65", ""]),
        ])
        .unwrap();
        let pairs =
            extract_measurement_pairs(&df, &ColumnResolver::default(), EnumLogicalField::Measurement)
                .unwrap();

        assert_eq!(
            pairs.as_slice(),
            &[
                SpecMeasurementPair { key: 1, value: Some(6.70) },
                SpecMeasurementPair { key: 2, value: None },
                SpecMeasurementPair { key: 3, value: Some(6.65) },
            ]
        );
        assert_eq!(pairs.missing_keys(), vec![2]);
        let dict_values = pairs.to_map();
        assert_eq!(dict_values.len(), 2);
        assert_eq!(dict_values.get(&3), Some(&6.65));
    }

    #[test]
    fn test_extract_pairs_drops_non_numeric_keys() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &["1", "total", "2.0"]),
            Column::new("pH".into(), &[6.6, 0.0, 6.7]),
        ])
        .unwrap();
        let pairs =
            extract_measurement_pairs(&df, &ColumnResolver::default(), EnumLogicalField::Measurement)
                .unwrap();
        let l_keys: Vec<i64> = pairs.as_slice().iter().map(|pair| pair.key).collect();
        assert_eq!(l_keys, vec![1, 2]);
    }

    #[test]
    fn test_extract_pairs_rejects_fractional_key() {
        let df = DataFrame::new(vec![
            Column::new("a/a".into(), &[1.0, 1.5]),
            Column::new("pH".into(), &[6.6, 6.7]),
        ])
        .unwrap();
        let err =
            extract_measurement_pairs(&df, &ColumnResolver::default(), EnumLogicalField::Measurement)
                .expect_err("must fail");
        assert!(matches!(err, TableError::KeyType { row: 1, .. }));
    }

    #[test]
    fn test_extract_pairs_missing_measurement_column_errors() {
        let df = DataFrame::new(vec![Column::new("a/a".into(), &[1i64])]).unwrap();
        let err =
            extract_measurement_pairs(&df, &ColumnResolver::default(), EnumLogicalField::Measurement)
                .expect_err("must fail");
        assert!(
            matches!(err, TableError::ColumnNotFound { ref field, .. } if field == "measurement")
        );
    }
}
