//! `labform_xlsx` v1:
//! Rust-side XLSX kernel for lab forms and cleaned tables.
//!
//! Module layout:
//! - `conf`     : constants and default presets
//! - `spec`     : specs/models/errors
//! - `util`     : pure helper functions
//! - `layout`   : slot-to-cell arithmetic
//! - `template` : template package copy and worksheet patching
//! - `form`     : chunked form filling
//! - `writer`   : cleaned-table workbook writer
pub mod conf;
pub mod form;
pub mod layout;
pub mod spec;
pub mod template;
pub mod util;
pub mod writer;

pub use conf::{
    C_CHUNK_SUFFIX, C_SHEET_NAME_TABLE, EnumFmtKey, N_MISSING_KEYS_REPORTED, N_VALUE_DECIMALS,
    derive_default_form_layout, derive_default_xlsx_formats,
};
pub use form::{FormWriter, plan_form_chunks};
pub use layout::{map_slot_to_cell, map_slot_to_label_cell};
pub use spec::{
    EnumMissingMeasurementPolicy, FormError, ReportFormFill, SpecCellCoordinate, SpecCellFormat,
    SpecFormChunk, SpecFormLayout,
};
pub use template::{TemplatePackage, TemplateSheet};
pub use util::{derive_chunk_path, derive_column_letters, parse_cell_reference};
pub use writer::{TableSheetWriter, write_normalized_table};
