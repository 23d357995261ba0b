use std::io::Read;
use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use labform_table::{
    ColumnResolver, EnumLogicalField, SpecMeasurementPair, SpecMeasurementPairs,
    extract_measurement_pairs,
};
use labform_xlsx::{EnumMissingMeasurementPolicy, FormWriter, SpecFormLayout};
use polars::prelude::{Column, DataFrame};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use tempfile::tempdir;
use zip::ZipArchive;

const C_PART_FORM_SHEET: &str = "xl/worksheets/sheet1.xml";

fn write_template(path: &Path) {
    let fmt_title = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thick)
        .set_background_color(Color::RGB(0xFFFF00));
    let fmt_header = Format::new().set_bold().set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("pH").unwrap();
    worksheet
        .merge_range(0, 0, 0, 7, "Milk pH record", &fmt_title)
        .unwrap();
    for n_col in [0u16, 3, 6] {
        worksheet.set_column_width(n_col, 14).unwrap();
        worksheet.set_column_width(n_col + 1, 9).unwrap();
        worksheet.write_string_with_format(1, n_col, "pH", &fmt_header).unwrap();
        worksheet
            .write_string_with_format(1, n_col + 1, "a/a", &fmt_header)
            .unwrap();
    }
    worksheet.write_formula(53, 0, "=COUNT(A3:A52)").unwrap();
    workbook.add_worksheet().set_name("Notes").unwrap();
    workbook.save(path).unwrap();
}

fn read_sheet(path: &Path, sheet_name: &str) -> Range<Data> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    workbook.worksheet_range(sheet_name).unwrap()
}

fn read_part(path: &Path, part: &str) -> String {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut file = archive.by_name(part).unwrap();
    let mut c_text = String::new();
    file.read_to_string(&mut c_text).unwrap();
    c_text
}

fn extract_cols(xml: &str) -> &str {
    let n_start = xml.find("<cols>").unwrap();
    let n_end = xml.find("</cols>").unwrap();
    &xml[n_start..n_end]
}

fn extract_cell_tag<'a>(xml: &'a str, c_ref: &str) -> &'a str {
    let n_start = xml.find(&format!("<c r=\"{c_ref}\"")).unwrap();
    let n_len = xml[n_start..].find('>').unwrap();
    xml[n_start..=n_start + n_len].trim_end_matches(['/', '>'])
}

fn get_f64(range: &Range<Data>, row: u32, col: u32) -> Option<f64> {
    match range.get_value((row, col)) {
        Some(Data::Float(val)) => Some(*val),
        Some(Data::Int(val)) => Some(*val as f64),
        _ => None,
    }
}

#[test]
fn test_fill_160_pairs_produces_two_independent_documents() {
    let dir_tmp = tempdir().unwrap();
    let path_template = dir_tmp.path().join("template.xlsx");
    write_template(&path_template);

    let pairs = SpecMeasurementPairs::from_pairs((1..=160).map(|key| SpecMeasurementPair {
        key,
        value: Some(6.0 + key as f64 / 1000.0 + 0.0004),
    }));
    let writer = FormWriter::new(path_template.clone(), SpecFormLayout::default()).unwrap();
    let report = writer
        .fill(&pairs, &dir_tmp.path().join("ph_form.xlsx"))
        .unwrap();

    assert_eq!(
        report.paths_out,
        vec![
            dir_tmp.path().join("ph_form_part1.xlsx"),
            dir_tmp.path().join("ph_form_part2.xlsx"),
        ]
    );
    assert_eq!(report.cnt_pairs_written, 160);

    // Styles, column widths and header formatting are the template's in both
    // documents.
    let c_styles_template = read_part(&path_template, "xl/styles.xml");
    let c_sheet_template = read_part(&path_template, C_PART_FORM_SHEET);
    assert!(extract_cols(&c_sheet_template).contains("width=\"14"));
    for path_out in &report.paths_out {
        assert_eq!(read_part(path_out, "xl/styles.xml"), c_styles_template);
        let c_sheet = read_part(path_out, C_PART_FORM_SHEET);
        assert_eq!(extract_cols(&c_sheet), extract_cols(&c_sheet_template));
        for c_ref in ["A1", "A2", "E2", "H2"] {
            assert_eq!(
                extract_cell_tag(&c_sheet, c_ref),
                extract_cell_tag(&c_sheet_template, c_ref)
            );
        }
        assert!(extract_cell_tag(&c_sheet, "A1").contains(" s=\""));
        assert!(c_sheet.contains("<mergeCell ref=\"A1:H1\"/>"));
    }

    let range_first = read_sheet(&report.paths_out[0], "pH");
    let range_second = read_sheet(&report.paths_out[1], "pH");

    // Template content survives in every chunk.
    for range in [&range_first, &range_second] {
        assert_eq!(
            range.get_value((0, 0)),
            Some(&Data::String("Milk pH record".to_string()))
        );
        assert_eq!(range.get_value((1, 4)), Some(&Data::String("a/a".to_string())));
    }

    // Slot 1 -> A3/B3, slot 50 -> A52, slot 51 -> D3/E3, slot 150 -> G52/H52.
    assert_eq!(get_f64(&range_first, 2, 0), Some(6.0));
    assert_eq!(get_f64(&range_first, 2, 1), Some(1.0));
    assert_eq!(get_f64(&range_first, 51, 0), Some(6.05));
    assert_eq!(get_f64(&range_first, 2, 3), Some(6.05));
    assert_eq!(get_f64(&range_first, 2, 4), Some(51.0));
    assert_eq!(get_f64(&range_first, 51, 6), Some(6.15));
    assert_eq!(get_f64(&range_first, 51, 7), Some(150.0));

    // Second chunk restarts at slot 1 and carries nothing from the first.
    assert_eq!(get_f64(&range_second, 2, 1), Some(151.0));
    assert_eq!(get_f64(&range_second, 11, 1), Some(160.0));
    assert_eq!(get_f64(&range_second, 12, 1), None);
    assert_eq!(get_f64(&range_second, 2, 3), None);

    let mut l_keys_read = Vec::new();
    for range in [&range_first, &range_second] {
        for slot in 1..=150usize {
            let n_row = 2 + ((slot - 1) % 50) as u32;
            let n_col = 1 + ((slot - 1) / 50) as u32 * 3;
            if let Some(n_key) = get_f64(range, n_row, n_col) {
                l_keys_read.push(n_key as i64);
            }
        }
    }
    assert_eq!(l_keys_read, (1..=160).collect::<Vec<i64>>());
}

#[test]
fn test_fill_from_table_with_named_sheet_and_left_labels() {
    let dir_tmp = tempdir().unwrap();
    let path_template = dir_tmp.path().join("template.xlsx");
    write_template(&path_template);

    let df = DataFrame::new(vec![
        Column::new("A/A".into(), &["2", "1", "3", "2"]),
        Column::new("pH".into(), &["6.501", "6.6", "", "6.777"]),
    ])
    .unwrap();
    let pairs =
        extract_measurement_pairs(&df, &ColumnResolver::default(), EnumLogicalField::Measurement)
            .unwrap();
    assert_eq!(pairs.missing_keys(), vec![3]);

    let layout = SpecFormLayout {
        start_col_idx: 2,
        label_col_offset: -1,
        sheet_name: Some("Notes".to_string()),
        ..Default::default()
    };
    let writer = FormWriter::new(path_template, layout)
        .unwrap()
        .with_missing_policy(EnumMissingMeasurementPolicy::DropIncomplete);
    let path_out = dir_tmp.path().join("single.xlsx");
    let report = writer.fill(&pairs, &path_out).unwrap();

    assert_eq!(report.paths_out, vec![path_out.clone()]);
    assert_eq!(report.keys_dropped, vec![3]);

    let range = read_sheet(&path_out, "Notes");
    assert_eq!(get_f64(&range, 2, 1), Some(6.6));
    assert_eq!(get_f64(&range, 2, 0), Some(1.0));
    assert_eq!(get_f64(&range, 3, 1), Some(6.78));
    assert_eq!(get_f64(&range, 3, 0), Some(2.0));
    assert_eq!(get_f64(&range, 4, 1), None);

    let range_form = read_sheet(&path_out, "pH");
    assert_eq!(get_f64(&range_form, 2, 0), None);
}
