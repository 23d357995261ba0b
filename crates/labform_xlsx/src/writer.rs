//! Workbook writer for cleaned tables.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use labform_table::NormalizedTable;
use labform_table::util::collect_column_names;
use polars::prelude::{AnyValue, DataFrame};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::conf::{
    EnumFmtKey, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    N_WIDTH_CELL_MAX, N_WIDTH_CELL_MIN, N_WIDTH_CELL_PADDING, derive_default_xlsx_formats,
};
use crate::spec::{FormError, SpecCellFormat};
use crate::util::{
    cast_col_num, cast_row_num, derive_rust_xlsx_format, estimate_unicode_string_width,
    sanitize_sheet_name,
};

/// Normalized cell value during the write pipeline.
#[derive(Debug, Clone, PartialEq)]
enum EnumCellValue {
    None,
    String(String),
    Number(f64),
}

/// Stateful workbook writer; one sheet per table.
///
/// The workbook is buffered in memory until [`Self::close`] is called.
pub struct TableSheetWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    dict_fmt: BTreeMap<EnumFmtKey, SpecCellFormat>,
    set_sheet_names_existing: BTreeSet<String>,
    if_closed: bool,
}

impl TableSheetWriter {
    /// Create a writer bound to `path_file_out` with the default formats.
    pub fn new(path_file_out: PathBuf) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            dict_fmt: derive_default_xlsx_formats(),
            set_sheet_names_existing: BTreeSet::new(),
            if_closed: false,
        }
    }

    /// Output file path.
    pub fn file_out(&self) -> &Path {
        &self.path_file_out
    }

    /// Write a cleaned table as one sheet.
    pub fn write_table(
        &mut self,
        table: &NormalizedTable,
        sheet_name: &str,
    ) -> Result<(), FormError> {
        self.write_dataframe(table.dataframe(), sheet_name)
    }

    /// Write a frame as one sheet: header row, typed body, frozen header and
    /// header-based column widths.
    pub fn write_dataframe(&mut self, df: &DataFrame, sheet_name: &str) -> Result<(), FormError> {
        if self.if_closed {
            return Err(FormError::InvalidLayout(
                "cannot write after close()".to_string(),
            ));
        }
        if df.height() + 1 > N_NROWS_EXCEL_MAX || df.width() > N_NCOLS_EXCEL_MAX {
            return Err(FormError::InvalidLayout(format!(
                "table {}x{} exceeds the worksheet limits",
                df.height(),
                df.width()
            )));
        }

        let l_colnames = collect_column_names(df);
        let l_fmt_by_col: Vec<Format> = df
            .get_columns()
            .iter()
            .map(|col| {
                let key = if col.dtype().is_integer() {
                    EnumFmtKey::Integer
                } else if col.dtype().is_float() {
                    EnumFmtKey::Decimal
                } else {
                    EnumFmtKey::Text
                };
                derive_rust_xlsx_format(&self.derive_format_spec(key))
            })
            .collect();
        let fmt_header = derive_rust_xlsx_format(&self.derive_format_spec(EnumFmtKey::Header));

        let sheet_name_unique =
            self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name));
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(&sheet_name_unique)?;

        for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
            worksheet.write_string_with_format(0, cast_col_num(n_idx_col)?, c_name, &fmt_header)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        for (n_idx_col, col) in df.get_columns().iter().enumerate() {
            for n_idx_row in 0..df.height() {
                let value = derive_cell_value_from_any_value(col.get(n_idx_row)?);
                write_cell_with_format(
                    worksheet,
                    n_idx_row + 1,
                    n_idx_col,
                    &value,
                    &l_fmt_by_col[n_idx_col],
                )?;
            }
        }

        for (n_idx_col, c_name) in l_colnames.iter().enumerate() {
            let n_width = usize::min(
                N_WIDTH_CELL_MAX,
                usize::max(
                    N_WIDTH_CELL_MIN,
                    estimate_unicode_string_width(c_name) + N_WIDTH_CELL_PADDING,
                ),
            );
            worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width as f64)?;
        }

        tracing::debug!(
            sheet = %sheet_name_unique,
            rows = df.height(),
            cols = df.width(),
            "table sheet written"
        );
        Ok(())
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), FormError> {
        if self.if_closed {
            return Ok(());
        }
        if let Some(path_parent) = self.path_file_out.parent()
            && !path_parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(path_parent)?;
        }
        self.workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        Ok(())
    }

    fn derive_format_spec(&self, key: EnumFmtKey) -> SpecCellFormat {
        self.dict_fmt.get(&key).cloned().unwrap_or_default()
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_string()) {
            return name.to_string();
        }

        let mut n_idx = 2usize;
        loop {
            let c_suffix = format!("__{n_idx}");
            let c_base: String = name
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_suffix.len()).max(1))
                .collect();
            let candidate = format!("{c_base}{c_suffix}");
            if self.set_sheet_names_existing.insert(candidate.clone()) {
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Write `table` to a single-sheet workbook at `path_file_out`.
pub fn write_normalized_table(
    table: &NormalizedTable,
    path_file_out: &Path,
    sheet_name: &str,
) -> Result<(), FormError> {
    let mut writer = TableSheetWriter::new(path_file_out.to_path_buf());
    writer.write_table(table, sheet_name)?;
    writer.close()?;
    tracing::info!(
        path = %path_file_out.display(),
        rows = table.height(),
        "normalized table saved"
    );
    Ok(())
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) if val.is_finite() => EnumCellValue::Number(val),
        AnyValue::Float64(_) => EnumCellValue::None,
        _ => EnumCellValue::String(value.to_string()),
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), FormError> {
    let (n_row, n_col) = (cast_row_num(row_idx)?, cast_col_num(col_idx)?);
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}
