//! Input loading: CSV via polars, XLSX (first sheet) via calamine.
//!
//! Every column is loaded as text; key and measurement coercion happens in
//! the table stages.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, Xlsx, open_workbook};
use polars::prelude::{Column, CsvReadOptions, DataFrame, SerReader};

/// Load `path` by extension (`.csv` or `.xlsx`).
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let c_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let df = match c_ext.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" => load_xlsx(path)?,
        _ => bail!("unsupported input format: {}", path.display()),
    };
    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        "input loaded"
    );
    Ok(df)
}

/// Read a CSV file with every column kept as text.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;
    Ok(df)
}

/// Read the first worksheet; the first used row is the header.
pub fn load_xlsx(path: &Path) -> Result<DataFrame> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;
    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        bail!("workbook has no sheets: {}", path.display());
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("Failed to read sheet {sheet_name:?}"))?;

    let mut rows = range.rows();
    let Some(row_header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let l_headers = derive_unique_headers(row_header);

    let mut l_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); l_headers.len()];
    for row in rows {
        for (n_idx_col, l_values) in l_columns.iter_mut().enumerate() {
            l_values.push(row.get(n_idx_col).and_then(derive_text_from_cell));
        }
    }

    let l_cols: Vec<Column> = l_headers
        .into_iter()
        .zip(l_columns)
        .map(|(c_name, l_values)| Column::new(c_name.into(), l_values))
        .collect();
    Ok(DataFrame::new(l_cols)?)
}

/// Header text per column; blanks become `Unnamed: <idx>` and repeats get a
/// `.<n>` suffix.
fn derive_unique_headers(row: &[Data]) -> Vec<String> {
    let mut set_seen = BTreeSet::new();
    row.iter()
        .enumerate()
        .map(|(n_idx_col, cell)| {
            let c_base = derive_text_from_cell(cell)
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| format!("Unnamed: {n_idx_col}"));
            let mut c_name = c_base.clone();
            let mut n_dup = 1usize;
            while !set_seen.insert(c_name.clone()) {
                c_name = format!("{c_base}.{n_dup}");
                n_dup += 1;
            }
            c_name
        })
        .collect()
}

/// Cell as text; whole floats print without a fraction so keys stay integral.
fn derive_text_from_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(val) => Some(val.clone()),
        Data::Int(val) => Some(val.to_string()),
        Data::Float(val) if val.fract() == 0.0 && val.abs() < 1e15 => {
            Some(format!("{}", *val as i64))
        }
        Data::Float(val) => Some(val.to_string()),
        Data::Bool(val) => Some(if *val { "True" } else { "False" }.to_string()),
        Data::DateTime(val) => Some(val.as_f64().to_string()),
        Data::DateTimeIso(val) | Data::DurationIso(val) => Some(val.clone()),
    }
}

#[cfg(test)]
mod tests {
    use labform_xlsx::TableSheetWriter;
    use polars::prelude::{AnyValue, DataType as PlDataType};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_csv_keeps_every_column_as_text() {
        let dir_tmp = tempdir().unwrap();
        let path_csv = dir_tmp.path().join("raw.csv");
        std::fs::write(&path_csv, "a/a,pH,Fat\n1,6.61,3.5\n2,,4\n").unwrap();

        let df = load_table(&path_csv).unwrap();
        assert_eq!(df.shape(), (2, 3));
        for col in df.get_columns() {
            assert_eq!(col.dtype(), &PlDataType::String);
        }
        assert_eq!(df.column("a/a").unwrap().get(1).unwrap(), AnyValue::String("2"));
    }

    #[test]
    fn test_load_xlsx_reads_first_sheet() {
        let dir_tmp = tempdir().unwrap();
        let path_xlsx = dir_tmp.path().join("raw.xlsx");
        let df_src = DataFrame::new(vec![
            Column::new("a/a".into(), &[1i64, 2]),
            Column::new("pH".into(), &[Some(6.61), None]),
            Column::new("pH ".into(), &["x", "y"]),
        ])
        .unwrap();
        let mut writer = TableSheetWriter::new(path_xlsx.clone());
        writer.write_dataframe(&df_src, "Raw").unwrap();
        writer.close().unwrap();

        let df = load_table(&path_xlsx).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("a/a").unwrap().get(0).unwrap(), AnyValue::String("1"));
        assert_eq!(df.column("pH").unwrap().get(0).unwrap(), AnyValue::String("6.61"));
        assert_eq!(df.column("pH").unwrap().get(1).unwrap(), AnyValue::Null);
    }

    #[test]
    fn test_derive_unique_headers_fills_blanks_and_repeats() {
        let row = vec![
            Data::String("pH".to_string()),
            Data::Empty,
            Data::String("pH".to_string()),
        ];
        assert_eq!(derive_unique_headers(&row), vec!["pH", "Unnamed: 1", "pH.1"]);
    }

    #[test]
    fn test_load_table_rejects_unknown_extension() {
        assert!(load_table(Path::new("raw.json")).is_err());
    }
}
