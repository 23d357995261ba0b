//! End-to-end run of the `process` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use labform_table::{
    EnumLogicalField, ReportDecimalPrecision, ReportZeroNutrient, TableError,
    calculate_derived_metrics, count_replicate_rows, drop_zero_nutrient_rows,
    extract_measurement_pairs, find_rows_missing_key, format_decimals, normalize_table,
};
use labform_xlsx::{C_SHEET_NAME_TABLE, FormWriter, ReportFormFill, write_normalized_table};

use crate::config::LabformConfig;
use crate::load::load_table;

/// Rows listed in the missing-key abort message.
const N_MISSING_KEY_ROWS_REPORTED: usize = 20;

/// Files involved in one run; `None` skips the matching output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecPipelinePaths {
    pub input: PathBuf,
    pub out_table: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub out_form: Option<PathBuf>,
}

/// What each stage did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPipeline {
    pub cnt_rows_input: usize,
    pub rows_missing_key: Vec<usize>,
    /// Raw rows beyond the highest ordinal key; `None` without numeric keys.
    pub n_replicate_rows: Option<i64>,
    pub cnt_rows_normalized: usize,
    pub zero_nutrient: Option<ReportZeroNutrient>,
    pub decimals: ReportDecimalPrecision,
    pub if_metrics_added: bool,
    pub path_table: Option<PathBuf>,
    pub form: Option<ReportFormFill>,
}

impl ReportPipeline {
    /// One line per artifact, for stdout.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut l_lines = vec![format!(
            "table: {} input rows -> {} normalized rows",
            self.cnt_rows_input, self.cnt_rows_normalized
        )];
        if let Some(n_replicates) = self.n_replicate_rows.filter(|n_rows| *n_rows > 0) {
            l_lines.push(format!("table: {n_replicates} replicate row(s) in input"));
        }
        if let Some(path_table) = &self.path_table {
            l_lines.push(format!("table written: {}", path_table.display()));
        }
        if let Some(form) = &self.form {
            for path_out in &form.paths_out {
                l_lines.push(format!("form written: {}", path_out.display()));
            }
            if !form.keys_dropped.is_empty() {
                l_lines.push(format!(
                    "form: {} incomplete measurement(s) excluded",
                    form.keys_dropped.len()
                ));
            }
        }
        l_lines
    }
}

/// Run every stage in order and write the configured outputs.
pub fn run_pipeline(paths: &SpecPipelinePaths, config: &LabformConfig) -> Result<ReportPipeline> {
    let df_raw = load_table(&paths.input)?;
    let resolver = config.resolver();
    let mut report = ReportPipeline {
        cnt_rows_input: df_raw.height(),
        ..Default::default()
    };

    report.rows_missing_key = find_rows_missing_key(&df_raw, &resolver)?;
    if !report.rows_missing_key.is_empty() {
        // Spreadsheet rows: 1-based with the header on row 1.
        let l_rows_preview: Vec<usize> = report
            .rows_missing_key
            .iter()
            .take(N_MISSING_KEY_ROWS_REPORTED)
            .map(|n_idx_row| n_idx_row + 2)
            .collect();
        if !config.normalize.allow_missing_keys {
            bail!(
                "{} row(s) have no ordinal key (rows {:?}); set normalize.allow_missing_keys to drop them",
                report.rows_missing_key.len(),
                l_rows_preview
            );
        }
        tracing::warn!(rows = ?l_rows_preview, "rows without ordinal key dropped");
    }

    report.n_replicate_rows = count_replicate_rows(&df_raw, &resolver)?;
    match report.n_replicate_rows {
        Some(n_replicates) if n_replicates > 0 => tracing::info!(
            replicates = n_replicates,
            rows = report.cnt_rows_input,
            "replicate measurements found"
        ),
        Some(_) => tracing::info!(rows = report.cnt_rows_input, "no replicate measurements"),
        None => tracing::info!("no numeric ordinal key; replicate check skipped"),
    }

    let mut table = normalize_table(&df_raw, &resolver, &config.normalize_options())
        .context("Failed to normalize table")?;

    if config.zero_nutrients.enabled {
        let (table_filtered, report_zero) =
            drop_zero_nutrient_rows(&table, &config.zero_nutrient_options())?;
        tracing::info!("{report_zero}");
        table = table_filtered;
        report.zero_nutrient = Some(report_zero);
    }

    let (table_formatted, report_decimals) = format_decimals(&table, &config.decimal_options())?;
    if config.decimals.strict_precision {
        report_decimals
            .clone()
            .into_result()
            .context("Decimal precision check failed")?;
    }
    table = table_formatted;
    report.decimals = report_decimals;

    if config.metrics.enabled {
        match calculate_derived_metrics(&table, &config.metrics_options()) {
            Ok(table_metrics) => {
                table = table_metrics;
                report.if_metrics_added = true;
            }
            Err(TableError::MissingColumn { column }) => {
                tracing::warn!(column = %column, "derived metrics skipped");
            }
            Err(err) => return Err(err.into()),
        }
    }
    report.cnt_rows_normalized = table.height();

    if let Some(path_table) = &paths.out_table {
        write_normalized_table(&table, path_table, C_SHEET_NAME_TABLE)
            .with_context(|| format!("Failed to write table: {}", path_table.display()))?;
        report.path_table = Some(path_table.clone());
    }

    if let Some(path_template) = &paths.template {
        let path_out_form = paths
            .out_form
            .clone()
            .unwrap_or_else(|| derive_default_form_path(&paths.input));
        let pairs = extract_measurement_pairs(&df_raw, &resolver, EnumLogicalField::Measurement)
            .context("Failed to extract measurement pairs")?;
        let writer = FormWriter::new(path_template.clone(), config.form_layout())?
            .with_missing_policy(config.missing_policy());
        let report_form = writer
            .fill(&pairs, &path_out_form)
            .with_context(|| format!("Failed to fill form: {}", path_template.display()))?;
        report.form = Some(report_form);
    }

    Ok(report)
}

/// `<input stem>_form.xlsx` next to the input.
fn derive_default_form_path(path_input: &Path) -> PathBuf {
    let c_stem = path_input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "labform".to_string());
    path_input.with_file_name(format!("{c_stem}_form.xlsx"))
}
