//! Shared XLSX specification models.

use std::fmt;
use std::path::PathBuf;

use labform_table::SpecMeasurementPair;
use polars::prelude::PolarsError;
use rust_xlsxwriter::XlsxError;

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, derive_default_form_layout};
use crate::layout::{map_slot_to_cell, map_slot_to_label_cell};
use crate::util::derive_column_letters;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,

    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormLayoutSpecification

/// 1-based cell position on a form sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecCellCoordinate {
    /// Column index (`A` = 1).
    pub col_idx: u32,
    /// Row index (first row = 1).
    pub row_idx: u32,
}

impl SpecCellCoordinate {
    /// A1-style reference (`col_idx = 4, row_idx = 3` -> `"D3"`).
    pub fn to_a1(&self) -> String {
        format!("{}{}", derive_column_letters(self.col_idx), self.row_idx)
    }
}

impl fmt::Display for SpecCellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Fixed layout of a pre-printed form.
///
/// Slots run down a column group of `block_size` rows starting at
/// `start_row`, then continue in the next group `col_step` columns to the
/// right. The label (ordinal key) sits `label_col_offset` columns from the
/// value; a negative offset places it on the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFormLayout {
    /// First row of every group (1-based).
    pub start_row: u32,
    /// Slots per group.
    pub block_size: u32,
    /// Slots per document; overflow goes to the next chunk.
    pub max_per_form: usize,
    /// Value column of the first group (1-based).
    pub start_col_idx: u32,
    /// Column distance between groups.
    pub col_step: u32,
    /// Label column relative to the value column.
    pub label_col_offset: i32,
    /// Write the ordinal key next to every value.
    pub if_write_label: bool,
    /// Target sheet; the first sheet when `None`.
    pub sheet_name: Option<String>,
}

impl Default for SpecFormLayout {
    fn default() -> Self {
        derive_default_form_layout()
    }
}

impl SpecFormLayout {
    /// Check that every slot of a full document lands inside the sheet.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.start_row == 0 || self.start_col_idx == 0 {
            return Err(FormError::InvalidLayout(format!(
                "start_row={} and start_col_idx={} must be >= 1",
                self.start_row, self.start_col_idx
            )));
        }
        if self.block_size == 0 || self.max_per_form == 0 {
            return Err(FormError::InvalidLayout(format!(
                "block_size={} and max_per_form={} must be >= 1",
                self.block_size, self.max_per_form
            )));
        }
        if self.col_step == 0 && self.max_per_form > self.block_size as usize {
            return Err(FormError::InvalidLayout(
                "col_step=0 stacks every group on the same cells".to_string(),
            ));
        }

        let cell_first = self.map_value_cell(1)?;
        let cell_last = self.map_value_cell(self.max_per_form)?;
        let cell_row_last = self.map_value_cell(self.max_per_form.min(self.block_size as usize))?;
        if cell_row_last.row_idx as usize > N_NROWS_EXCEL_MAX
            || cell_last.col_idx as usize > N_NCOLS_EXCEL_MAX
        {
            return Err(FormError::InvalidLayout(format!(
                "slot {} maps to {cell_last}, outside the worksheet",
                self.max_per_form
            )));
        }
        if self.if_write_label {
            for cell in [cell_first, cell_last] {
                let cell_label = map_slot_to_label_cell(cell, self.label_col_offset)?;
                if cell_label.col_idx as usize > N_NCOLS_EXCEL_MAX {
                    return Err(FormError::InvalidLayout(format!(
                        "label of {cell} falls outside the worksheet"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Value cell of `slot` under this layout.
    pub fn map_value_cell(&self, slot: usize) -> Result<SpecCellCoordinate, FormError> {
        map_slot_to_cell(
            slot,
            self.start_row,
            self.block_size,
            self.start_col_idx,
            self.col_step,
        )
    }

    /// Label cell of `slot`, or `None` when labels are disabled.
    pub fn map_label_cell(&self, slot: usize) -> Result<Option<SpecCellCoordinate>, FormError> {
        if !self.if_write_label {
            return Ok(None);
        }
        let cell = self.map_value_cell(slot)?;
        map_slot_to_label_cell(cell, self.label_col_offset).map(Some)
    }
}

/// What to do with pairs lacking a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumMissingMeasurementPolicy {
    /// Refuse to write anything.
    #[default]
    FailFast,
    /// Exclude incomplete pairs before chunking.
    DropIncomplete,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ChunkSpecification

/// Pairs assigned to one output document.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFormChunk {
    /// 1-based chunk index.
    pub chunk_idx: usize,
    /// Output path of this chunk.
    pub path_out: PathBuf,
    /// Pairs in slot order (slot = position + 1); every value is present.
    pub pairs: Vec<SpecMeasurementPair>,
}

/// Outcome of one form fill.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportFormFill {
    /// Written documents, in chunk order.
    pub paths_out: Vec<PathBuf>,
    /// Pairs written across all documents.
    pub cnt_pairs_written: usize,
    /// Keys excluded under [`EnumMissingMeasurementPolicy::DropIncomplete`].
    pub keys_dropped: Vec<i64>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors raised by form filling and workbook output.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Pairs without a value under the fail-fast policy.
    #[error("{n_missing} key(s) have no measurement; first: {keys:?}")]
    MissingMeasurement {
        /// Up to the first 20 offending keys, ascending.
        keys: Vec<i64>,
        /// Total offending keys.
        n_missing: usize,
    },
    /// Layout parameters that cannot address the sheet.
    #[error("invalid form layout: {0}")]
    InvalidLayout(String),
    /// Template unreadable or missing the target sheet.
    #[error("template {path:?}: {message}")]
    Template {
        /// Template path.
        path: PathBuf,
        /// Reader message.
        message: String,
    },
    /// Worksheet part whose structure cannot be patched.
    #[error("malformed worksheet {part}: {message}")]
    Worksheet {
        /// Zip entry of the worksheet.
        part: String,
        /// What was wrong.
        message: String,
    },
    /// Zip container read or write failure.
    #[error("xlsx package error: {0}")]
    Package(#[from] zip::result::ZipError),
    /// Worksheet XML that does not parse.
    #[error("worksheet xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Table workbook construction or save failure.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Table cell access failure.
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
