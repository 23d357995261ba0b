//! Stateless helper utilities used by the form and table writers.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder};

use crate::conf::{
    C_CHUNK_SUFFIX, C_SHEET_NAME_FALLBACK, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_SHEET_NAME_ILLEGAL_CHARS,
};
use crate::spec::{FormError, SpecCellCoordinate, SpecCellFormat};

////////////////////////////////////////////////////////////////////////////////
// #region CoordinateConversion

/// Zero-based row number accepted by `rust_xlsxwriter`.
pub fn cast_row_num(value: usize) -> Result<u32, FormError> {
    u32::try_from(value).map_err(|_| FormError::InvalidLayout(format!("row index overflow: {value}")))
}

/// Zero-based column number accepted by `rust_xlsxwriter`.
pub fn cast_col_num(value: usize) -> Result<u16, FormError> {
    u16::try_from(value)
        .map_err(|_| FormError::InvalidLayout(format!("column index overflow: {value}")))
}

/// Spreadsheet column letters of a 1-based column (`1` -> `A`, `28` -> `AB`).
pub fn derive_column_letters(col_idx: u32) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col_idx;
    while n_rest > 0 {
        let n_digit = (n_rest - 1) % 26;
        l_chars.push(char::from(b'A' + n_digit as u8));
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Parse an A1-style reference (`"AB12"`, `"$C$3"`) into a 1-based
/// coordinate. Anything outside the worksheet grid yields `None`.
pub fn parse_cell_reference(c_ref: &str) -> Option<SpecCellCoordinate> {
    let c_ref = c_ref.replace('$', "");
    let n_split = c_ref.find(|chr: char| chr.is_ascii_digit())?;
    let (c_letters, c_digits) = c_ref.split_at(n_split);
    if c_letters.is_empty() || !c_letters.chars().all(|chr| chr.is_ascii_alphabetic()) {
        return None;
    }

    let mut n_col: u32 = 0;
    for chr in c_letters.chars() {
        let n_digit = u32::from(chr.to_ascii_uppercase()) - u32::from('A') + 1;
        n_col = n_col.checked_mul(26)?.checked_add(n_digit)?;
    }
    let n_row: u32 = c_digits.parse().ok()?;
    if n_row == 0
        || n_row as usize > N_NROWS_EXCEL_MAX
        || n_col as usize > N_NCOLS_EXCEL_MAX
    {
        return None;
    }
    Some(SpecCellCoordinate {
        col_idx: n_col,
        row_idx: n_row,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Chunking

/// Generate `(start, len)` chunks covering `n_total` items.
pub fn generate_chunks(n_total: usize, size_chunk: usize) -> Vec<(usize, usize)> {
    let mut l_chunks = Vec::new();
    if size_chunk == 0 {
        return l_chunks;
    }
    let mut n_cursor = 0;
    while n_cursor < n_total {
        let n_len = usize::min(size_chunk, n_total - n_cursor);
        l_chunks.push((n_cursor, n_len));
        n_cursor += n_len;
    }
    l_chunks
}

/// Output path of chunk `chunk_idx` (1-based) out of `n_chunks`.
///
/// A single chunk keeps `path_base`; otherwise the stem gets `_part<c>`
/// before the extension (`out.xlsx` -> `out_part2.xlsx`).
pub fn derive_chunk_path(path_base: &Path, chunk_idx: usize, n_chunks: usize) -> PathBuf {
    if n_chunks <= 1 {
        return path_base.to_path_buf();
    }
    let c_stem = path_base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let c_file_name = match path_base.extension() {
        Some(ext) => format!(
            "{c_stem}{C_CHUNK_SUFFIX}{chunk_idx}.{}",
            ext.to_string_lossy()
        ),
        None => format!("{c_stem}{C_CHUNK_SUFFIX}{chunk_idx}"),
    };
    path_base.with_file_name(c_file_name)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Sheet name Excel will accept.
///
/// Rejected and control characters become `_`. Excel also refuses names that
/// start or end with an apostrophe, so those are stripped with the blanks,
/// both before and after the cut to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let is_edge = |chr: char| chr.is_whitespace() || chr == '\'';
    let c_cut: String = name
        .chars()
        .map(|chr| {
            if chr.is_control() || TUP_SHEET_NAME_ILLEGAL_CHARS.contains(&chr) {
                '_'
            } else {
                chr
            }
        })
        .collect::<String>()
        .trim_matches(is_edge)
        .chars()
        .take(N_LEN_EXCEL_SHEET_NAME_MAX)
        .collect();

    match c_cut.trim_end_matches(is_edge) {
        "" => C_SHEET_NAME_FALLBACK.to_string(),
        c_name => c_name.to_string(),
    }
}

/// Displayed width units of `s`; non-ASCII characters count wider.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

/// Build a `rust_xlsxwriter` format from a `SpecCellFormat`.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    for val in [&spec.align, &spec.valign].into_iter().flatten() {
        if let Some(align) = derive_format_align(val) {
            format = format.set_align(align);
        }
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }

    format
}

/// Map an xlsxwriter border index to a border style.
pub fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

/// Map an alignment keyword to an alignment, if known.
pub fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
