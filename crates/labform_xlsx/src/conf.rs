//! XLSX constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{SpecCellFormat, SpecFormLayout};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters Excel rejects in sheet names.
pub const TUP_SHEET_NAME_ILLEGAL_CHARS: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];
/// Name used when nothing of the requested sheet name survives cleaning.
pub const C_SHEET_NAME_FALLBACK: &str = "Sheet";

/// Package part listing the workbook sheets.
pub const C_PART_WORKBOOK: &str = "xl/workbook.xml";
/// Relationships resolving sheet ids to worksheet parts.
pub const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";

/// First form row holding a measurement (1-based).
pub const N_FORM_START_ROW: u32 = 3;
/// Measurements per column group.
pub const N_FORM_BLOCK_SIZE: u32 = 50;
/// Measurements per output document.
pub const N_FORM_MAX_PER_FORM: usize = 150;
/// Column of the first group (1-based).
pub const N_FORM_START_COL_IDX: u32 = 1;
/// Column distance between consecutive groups.
pub const N_FORM_COL_STEP: u32 = 3;
/// Label column relative to the value column.
pub const N_FORM_LABEL_COL_OFFSET: i32 = 1;

/// Offending keys listed in a missing-measurement error.
pub const N_MISSING_KEYS_REPORTED: usize = 20;
/// Fractional digits of a value written on the form.
pub const N_VALUE_DECIMALS: usize = 2;
/// Infix between the base stem and the chunk index.
pub const C_CHUNK_SUFFIX: &str = "_part";

/// Default sheet name for the normalized table.
pub const C_SHEET_NAME_TABLE: &str = "Normalized";

/// Autofit bounds for the table writer.
pub const N_WIDTH_CELL_MIN: usize = 8;
/// Autofit upper bound.
pub const N_WIDTH_CELL_MAX: usize = 60;
/// Padding added to the widest header.
pub const N_WIDTH_CELL_PADDING: usize = 2;

/// Canonical format preset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnumFmtKey {
    /// Generic text cell format.
    Text,
    /// Integer number format.
    Integer,
    /// Decimal number format.
    Decimal,
    /// Header cell format.
    Header,
}

/// Build default named format presets used by [`crate::writer::TableSheetWriter`].
pub fn derive_default_xlsx_formats() -> BTreeMap<EnumFmtKey, SpecCellFormat> {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    dict_fmt.insert(EnumFmtKey::Text, cfg_base_fmt_spec.clone());
    dict_fmt.insert(
        EnumFmtKey::Header,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Integer,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
    );
    dict_fmt.insert(
        EnumFmtKey::Decimal,
        cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00".to_string()),
            ..Default::default()
        }),
    );

    dict_fmt
}

/// Build the layout of the pre-printed pH form.
pub fn derive_default_form_layout() -> SpecFormLayout {
    SpecFormLayout {
        start_row: N_FORM_START_ROW,
        block_size: N_FORM_BLOCK_SIZE,
        max_per_form: N_FORM_MAX_PER_FORM,
        start_col_idx: N_FORM_START_COL_IDX,
        col_step: N_FORM_COL_STEP,
        label_col_offset: N_FORM_LABEL_COL_OFFSET,
        if_write_label: true,
        sheet_name: None,
    }
}
