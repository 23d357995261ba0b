//! Derived quality metrics (total solids, solids-non-fat).

use polars::prelude::{NamedFrom, Series};

use crate::conf::{N_METRIC_DECIMALS, N_SNF_OFFSET};
use crate::normalize::NormalizedTable;
use crate::spec::{SpecMetricsOptions, TableError};
use crate::util::{collect_column_names, collect_f64_column, round_to_decimals};

/// Append `TS = round(fat + protein + lactose, 2)` and
/// `SNF = round(protein + lactose + 0.7, 2)`.
///
/// Inputs are parsed numerically, so text columns produced by the decimal
/// formatter are accepted. A row with a non-numeric input gets a null metric.
pub fn calculate_derived_metrics(
    table: &NormalizedTable,
    options: &SpecMetricsOptions,
) -> Result<NormalizedTable, TableError> {
    let mut df_work = table.dataframe().clone();
    let l_colnames = collect_column_names(&df_work);
    for col_name in [&options.col_fat, &options.col_protein, &options.col_lactose] {
        if !l_colnames.contains(col_name) {
            return Err(TableError::MissingColumn {
                column: col_name.clone(),
            });
        }
    }

    let l_fat = collect_f64_column(&df_work, &options.col_fat)?;
    let l_protein = collect_f64_column(&df_work, &options.col_protein)?;
    let l_lactose = collect_f64_column(&df_work, &options.col_lactose)?;

    let mut l_total_solids = Vec::with_capacity(df_work.height());
    let mut l_solids_non_fat = Vec::with_capacity(df_work.height());
    for n_idx_row in 0..df_work.height() {
        let (fat, protein, lactose) = (
            l_fat[n_idx_row],
            l_protein[n_idx_row],
            l_lactose[n_idx_row],
        );
        l_total_solids.push(match (fat, protein, lactose) {
            (Some(f), Some(p), Some(l)) => Some(round_to_decimals(f + p + l, N_METRIC_DECIMALS)),
            _ => None,
        });
        l_solids_non_fat.push(match (protein, lactose) {
            (Some(p), Some(l)) => Some(round_to_decimals(p + l + N_SNF_OFFSET, N_METRIC_DECIMALS)),
            _ => None,
        });
    }

    df_work.with_column(Series::new(
        options.col_total_solids.as_str().into(),
        l_total_solids,
    ))?;
    df_work.with_column(Series::new(
        options.col_solids_non_fat.as_str().into(),
        l_solids_non_fat,
    ))?;
    tracing::info!("derived TS and SNF");
    Ok(table.with_dataframe(df_work))
}
