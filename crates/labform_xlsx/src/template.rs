//! Template package copy with worksheet patching.
//!
//! An `.xlsx` template is a zip package. Filling a form copies every entry
//! unchanged except the target worksheet part, whose `<sheetData>` receives
//! the numeric cells. Styles, column widths, row heights, merged ranges,
//! drawings and print setup therefore stay exactly as the template has them.

use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::conf::{C_PART_WORKBOOK, C_PART_WORKBOOK_RELS};
use crate::spec::{FormError, SpecCellCoordinate};
use crate::util::parse_cell_reference;

////////////////////////////////////////////////////////////////////////////////
// #region TemplatePackage

/// Worksheet listed by a template workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSheet {
    /// Tab name.
    pub name: String,
    /// Zip entry of the worksheet part, e.g. `xl/worksheets/sheet1.xml`.
    pub part: String,
}

/// In-memory bytes of a template workbook plus its sheet index.
#[derive(Debug, Clone)]
pub struct TemplatePackage {
    path: PathBuf,
    bytes: Vec<u8>,
    sheets: Vec<TemplateSheet>,
}

impl TemplatePackage {
    /// Read the template at `path` and resolve each sheet to its part.
    pub fn open(path: &Path) -> Result<Self, FormError> {
        let derive_error = |message: String| FormError::Template {
            path: path.to_path_buf(),
            message,
        };

        let bytes = std::fs::read(path).map_err(|err| derive_error(err.to_string()))?;
        let (c_workbook, c_rels) = {
            let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
                .map_err(|err| derive_error(format!("not an xlsx package: {err}")))?;
            (
                read_entry_text(&mut archive, C_PART_WORKBOOK).map_err(&derive_error)?,
                read_entry_text(&mut archive, C_PART_WORKBOOK_RELS).map_err(&derive_error)?,
            )
        };

        let dict_targets = parse_workbook_rels(&c_rels)?;
        let mut sheets = Vec::new();
        for (c_name, c_rel_id) in parse_workbook_sheets(&c_workbook)? {
            let Some(c_target) = dict_targets.get(&c_rel_id) else {
                return Err(derive_error(format!(
                    "sheet {c_name:?} points to unknown relationship {c_rel_id:?}"
                )));
            };
            sheets.push(TemplateSheet {
                name: c_name,
                part: derive_part_name(c_target),
            });
        }
        if sheets.is_empty() {
            return Err(derive_error("workbook has no sheets".to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            sheets,
        })
    }

    /// Template path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[TemplateSheet] {
        &self.sheets
    }

    /// Sheet called `sheet_name`, or the first sheet when `None`.
    pub fn find_sheet(&self, sheet_name: Option<&str>) -> Result<&TemplateSheet, FormError> {
        let sheet = match sheet_name {
            None => self.sheets.first(),
            Some(c_name) => self.sheets.iter().find(|sheet| sheet.name == c_name),
        };
        sheet.ok_or_else(|| FormError::Template {
            path: self.path.clone(),
            message: format!(
                "sheet {:?} not found; available: {:?}",
                sheet_name.unwrap_or_default(),
                self.sheets.iter().map(|sheet| &sheet.name).collect::<Vec<_>>()
            ),
        })
    }

    /// Copy the package to `path_out` with `dict_cells` written as numbers
    /// into worksheet `part`.
    ///
    /// Existing cells keep their style index; new cells take the row or column
    /// default style. Every other entry is copied byte for byte.
    pub fn write_with_numbers(
        &self,
        part: &str,
        dict_cells: &BTreeMap<SpecCellCoordinate, f64>,
        path_out: &Path,
    ) -> Result<(), FormError> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut if_patched = false;
        for n_idx in 0..archive.len() {
            let mut file = archive.by_index(n_idx)?;
            let c_name = file.name().to_string();
            if file.is_dir() {
                zip.add_directory(c_name, options)?;
                continue;
            }

            let mut l_bytes = Vec::new();
            file.read_to_end(&mut l_bytes)?;
            if c_name == part {
                l_bytes = patch_sheet_xml(&l_bytes, dict_cells)
                    .map_err(|err| derive_worksheet_error(part, err))?;
                if_patched = true;
            }
            zip.start_file(c_name, options)?;
            zip.write_all(&l_bytes)?;
        }
        if !if_patched {
            return Err(FormError::Template {
                path: self.path.clone(),
                message: format!("worksheet part {part:?} is missing from the package"),
            });
        }

        let cursor = zip.finish()?;
        std::fs::write(path_out, cursor.into_inner())?;
        tracing::debug!(
            part,
            cells = dict_cells.len(),
            path = %path_out.display(),
            "worksheet patched"
        );
        Ok(())
    }
}

fn read_entry_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, String> {
    let mut file = archive
        .by_name(name)
        .map_err(|err| format!("{name}: {err}"))?;
    let mut c_text = String::new();
    file.read_to_string(&mut c_text)
        .map_err(|err| format!("{name}: {err}"))?;
    Ok(c_text)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn derive_part_name(c_target: &str) -> String {
    match c_target.strip_prefix('/') {
        Some(c_absolute) => c_absolute.to_string(),
        None => format!("xl/{c_target}"),
    }
}

fn derive_worksheet_error(part: &str, err: FormError) -> FormError {
    match err {
        FormError::Worksheet { message, .. } => FormError::Worksheet {
            part: part.to_string(),
            message,
        },
        other => other,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkbookIndex

fn get_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|val| val.into_owned()))
}

fn get_attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    get_attr(e, key).and_then(|val| val.trim().parse().ok())
}

/// `(name, r:id)` of every `<sheet>` in `xl/workbook.xml`.
fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>, FormError> {
    let mut reader = Reader::from_str(xml);
    let mut l_sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                // The relationship id is the namespaced `id`, not `sheetId`.
                let c_rel_id = e
                    .attributes()
                    .flatten()
                    .find(|attr| {
                        attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id"
                    })
                    .and_then(|attr| attr.unescape_value().ok().map(|val| val.into_owned()));
                if let (Some(c_name), Some(c_rel_id)) = (get_attr(&e, b"name"), c_rel_id) {
                    l_sheets.push((c_name, c_rel_id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(l_sheets)
}

/// `Id -> Target` of `xl/_rels/workbook.xml.rels`.
fn parse_workbook_rels(xml: &str) -> Result<BTreeMap<String, String>, FormError> {
    let mut reader = Reader::from_str(xml);
    let mut dict_targets = BTreeMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(c_id), Some(c_target)) = (get_attr(&e, b"Id"), get_attr(&e, b"Target"))
                {
                    dict_targets.insert(c_id, c_target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(dict_targets)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorksheetPatch

/// `<row>` of `<sheetData>` with its cells.
#[derive(Debug)]
struct SheetRow {
    row_idx: u32,
    start: BytesStart<'static>,
    cells: Vec<SheetCell>,
    if_touched: bool,
}

/// `<c>` with everything between its tags.
#[derive(Debug)]
struct SheetCell {
    col_idx: u32,
    start: BytesStart<'static>,
    inner: Vec<Event<'static>>,
}

/// `<col min max style>` default style of a column span.
#[derive(Debug)]
struct ColumnStyle {
    col_min: u32,
    col_max: u32,
    style: String,
}

fn derive_malformed(message: impl Into<String>) -> FormError {
    FormError::Worksheet {
        part: String::new(),
        message: message.into(),
    }
}

fn derive_qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Rebuild `e` without the attributes named in `l_keys_skip`.
fn derive_start_without(e: &BytesStart<'_>, l_keys_skip: &[&[u8]]) -> BytesStart<'static> {
    let mut start = BytesStart::new(derive_qname(e));
    for attr in e.attributes().flatten() {
        if !l_keys_skip.contains(&attr.key.as_ref()) {
            start.push_attribute(attr);
        }
    }
    start
}

/// Write numbers into the `<sheetData>` of one worksheet part.
fn patch_sheet_xml(
    xml: &[u8],
    dict_cells: &BTreeMap<SpecCellCoordinate, f64>,
) -> Result<Vec<u8>, FormError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + dict_cells.len() * 40));
    let mut l_col_styles = Vec::new();
    let mut if_sheet_data = false;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"col" => {
                if let (Some(col_min), Some(col_max), Some(style)) = (
                    get_attr_u32(e, b"min"),
                    get_attr_u32(e, b"max"),
                    get_attr(e, b"style"),
                ) {
                    l_col_styles.push(ColumnStyle {
                        col_min,
                        col_max,
                        style,
                    });
                }
                writer.write_event(event.clone())?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                writer.write_event(Event::Empty(derive_dimension(&e, dict_cells)))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                let mut l_rows = read_sheet_rows(&mut reader)?;
                write_sheet_data(&mut writer, e, &mut l_rows, dict_cells, &l_col_styles)?;
                if_sheet_data = true;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                write_sheet_data(&mut writer, e, &mut Vec::new(), dict_cells, &l_col_styles)?;
                if_sheet_data = true;
            }
            other => writer.write_event(other)?,
        }
    }

    if !if_sheet_data {
        return Err(derive_malformed("no <sheetData> element"));
    }
    Ok(writer.into_inner())
}

/// `ref` of `<dimension>` widened to cover the written cells.
fn derive_dimension(
    e: &BytesStart<'_>,
    dict_cells: &BTreeMap<SpecCellCoordinate, f64>,
) -> BytesStart<'static> {
    let Some(c_ref) = get_attr(e, b"ref") else {
        return e.clone().into_owned();
    };
    let mut l_corners: Vec<SpecCellCoordinate> =
        c_ref.split(':').filter_map(parse_cell_reference).collect();
    if l_corners.is_empty() {
        return e.clone().into_owned();
    }
    l_corners.extend(dict_cells.keys().copied());

    let n_row_min = l_corners.iter().map(|cell| cell.row_idx).min().unwrap_or(1);
    let n_row_max = l_corners.iter().map(|cell| cell.row_idx).max().unwrap_or(1);
    let n_col_min = l_corners.iter().map(|cell| cell.col_idx).min().unwrap_or(1);
    let n_col_max = l_corners.iter().map(|cell| cell.col_idx).max().unwrap_or(1);
    let cell_first = SpecCellCoordinate {
        col_idx: n_col_min,
        row_idx: n_row_min,
    };
    let cell_last = SpecCellCoordinate {
        col_idx: n_col_max,
        row_idx: n_row_max,
    };
    let c_ref_new = if cell_first == cell_last {
        cell_first.to_a1()
    } else {
        format!("{cell_first}:{cell_last}")
    };

    let mut start = derive_start_without(e, &[b"ref".as_slice()]);
    start.push_attribute(("ref", c_ref_new.as_str()));
    start
}

/// Collect rows up to the closing `</sheetData>`.
fn read_sheet_rows<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<SheetRow>, FormError> {
    let mut l_rows = Vec::new();
    let mut n_row_prev = 0;
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row_idx = get_attr_u32(&e, b"r").unwrap_or(n_row_prev + 1);
                n_row_prev = row_idx;
                let cells = read_row_cells(reader)?;
                l_rows.push(SheetRow {
                    row_idx,
                    start: e,
                    cells,
                    if_touched: false,
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row_idx = get_attr_u32(&e, b"r").unwrap_or(n_row_prev + 1);
                n_row_prev = row_idx;
                l_rows.push(SheetRow {
                    row_idx,
                    start: e,
                    cells: Vec::new(),
                    if_touched: false,
                });
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(l_rows),
            Event::Eof => return Err(derive_malformed("unterminated <sheetData>")),
            _ => {}
        }
    }
}

/// Collect cells up to the closing `</row>`.
fn read_row_cells<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<SheetCell>, FormError> {
    let mut l_cells = Vec::new();
    let mut n_col_prev = 0;
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let col_idx = derive_cell_col(&e).unwrap_or(n_col_prev + 1);
                n_col_prev = col_idx;
                let inner = read_cell_inner(reader)?;
                l_cells.push(SheetCell {
                    col_idx,
                    start: e,
                    inner,
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col_idx = derive_cell_col(&e).unwrap_or(n_col_prev + 1);
                n_col_prev = col_idx;
                l_cells.push(SheetCell {
                    col_idx,
                    start: e,
                    inner: Vec::new(),
                });
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(l_cells),
            Event::Eof => return Err(derive_malformed("unterminated <row>")),
            _ => {}
        }
    }
}

/// Events between `<c>` and its `</c>`.
fn read_cell_inner<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<Event<'static>>, FormError> {
    let mut l_inner = Vec::new();
    let mut n_depth = 0usize;
    let mut buf = Vec::new();
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        buf.clear();
        match &event {
            Event::Start(_) => n_depth += 1,
            Event::End(_) if n_depth == 0 => return Ok(l_inner),
            Event::End(_) => n_depth -= 1,
            Event::Eof => return Err(derive_malformed("unterminated <c>")),
            _ => {}
        }
        l_inner.push(event);
    }
}

fn derive_cell_col(e: &BytesStart<'_>) -> Option<u32> {
    get_attr(e, b"r")
        .and_then(|c_ref| parse_cell_reference(&c_ref))
        .map(|cell| cell.col_idx)
}

/// Default style of a new cell: the row style when the row carries a custom
/// format, else the column style.
fn derive_default_style(
    row: &SheetRow,
    col_idx: u32,
    l_col_styles: &[ColumnStyle],
) -> Option<String> {
    let if_custom_format = get_attr(&row.start, b"customFormat")
        .is_some_and(|val| val == "1" || val == "true");
    if if_custom_format && let Some(style) = get_attr(&row.start, b"s") {
        return Some(style);
    }
    l_col_styles
        .iter()
        .find(|col| col.col_min <= col_idx && col_idx <= col.col_max)
        .map(|col| col.style.clone())
}

/// `<v>value</v>` using the sheet's element prefix.
fn derive_number_inner(c_prefix: &str, value: f64) -> Vec<Event<'static>> {
    let c_tag = format!("{c_prefix}v");
    vec![
        Event::Start(BytesStart::new(c_tag.clone())),
        Event::Text(BytesText::from_escaped(value.to_string())),
        Event::End(BytesEnd::new(c_tag)),
    ]
}

fn has_formula(cell: &SheetCell) -> bool {
    cell.inner.iter().any(|event| match event {
        Event::Start(e) | Event::Empty(e) => e.local_name().as_ref() == b"f",
        _ => false,
    })
}

/// Merge `dict_cells` into the rows; rows and cells stay in sheet order.
fn apply_numbers(
    l_rows: &mut Vec<SheetRow>,
    dict_cells: &BTreeMap<SpecCellCoordinate, f64>,
    l_col_styles: &[ColumnStyle],
    c_prefix: &str,
) {
    for (cell_target, &n_value) in dict_cells {
        let c_ref = cell_target.to_a1();
        let n_pos_row = match l_rows.binary_search_by_key(&cell_target.row_idx, |row| row.row_idx) {
            Ok(n_pos) => n_pos,
            Err(n_pos) => {
                let mut start = BytesStart::new(format!("{c_prefix}row"));
                start.push_attribute(("r", cell_target.row_idx.to_string().as_str()));
                l_rows.insert(
                    n_pos,
                    SheetRow {
                        row_idx: cell_target.row_idx,
                        start,
                        cells: Vec::new(),
                        if_touched: false,
                    },
                );
                n_pos
            }
        };

        let style_default =
            derive_default_style(&l_rows[n_pos_row], cell_target.col_idx, l_col_styles);
        let row = &mut l_rows[n_pos_row];
        row.if_touched = true;
        match row.cells.binary_search_by_key(&cell_target.col_idx, |cell| cell.col_idx) {
            Ok(n_pos) => {
                let cell = &mut row.cells[n_pos];
                if has_formula(cell) {
                    tracing::warn!(cell = %c_ref, "template formula replaced by a value");
                }
                let mut start = BytesStart::new(derive_qname(&cell.start));
                start.push_attribute(("r", c_ref.as_str()));
                for attr in cell.start.attributes().flatten() {
                    if !matches!(attr.key.as_ref(), b"r" | b"t" | b"cm" | b"vm") {
                        start.push_attribute(attr);
                    }
                }
                cell.start = start;
                cell.inner = derive_number_inner(c_prefix, n_value);
            }
            Err(n_pos) => {
                let mut start = BytesStart::new(format!("{c_prefix}c"));
                start.push_attribute(("r", c_ref.as_str()));
                if let Some(style) = &style_default {
                    start.push_attribute(("s", style.as_str()));
                }
                row.cells.insert(
                    n_pos,
                    SheetCell {
                        col_idx: cell_target.col_idx,
                        start,
                        inner: derive_number_inner(c_prefix, n_value),
                    },
                );
            }
        }
    }
}

fn write_sheet_data(
    writer: &mut Writer<Vec<u8>>,
    start_sheet_data: BytesStart<'static>,
    l_rows: &mut Vec<SheetRow>,
    dict_cells: &BTreeMap<SpecCellCoordinate, f64>,
    l_col_styles: &[ColumnStyle],
) -> Result<(), FormError> {
    let c_qname = derive_qname(&start_sheet_data);
    let c_prefix = match c_qname.rfind(':') {
        Some(n_idx) => &c_qname[..=n_idx],
        None => "",
    };
    apply_numbers(l_rows, dict_cells, l_col_styles, c_prefix);

    writer.write_event(Event::Start(start_sheet_data))?;
    for row in l_rows.iter() {
        // Stale `spans` would mislead readers once cells were added.
        let start_row = if row.if_touched {
            derive_start_without(&row.start, &[b"spans".as_slice()])
        } else {
            row.start.clone()
        };
        if row.cells.is_empty() {
            writer.write_event(Event::Empty(start_row))?;
            continue;
        }

        let c_row_qname = derive_qname(&start_row);
        writer.write_event(Event::Start(start_row))?;
        for cell in &row.cells {
            if cell.inner.is_empty() {
                writer.write_event(Event::Empty(cell.start.clone()))?;
                continue;
            }
            writer.write_event(Event::Start(cell.start.clone()))?;
            for event in &cell.inner {
                writer.write_event(event.clone())?;
            }
            writer.write_event(Event::End(BytesEnd::new(derive_qname(&cell.start))))?;
        }
        writer.write_event(Event::End(BytesEnd::new(c_row_qname)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(c_qname.clone())))?;
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
