//! TOML configuration for the `labform` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use labform_table::{
    ColumnResolver, EnumLogicalField, SpecDecimalGroup, SpecDecimalOptions, SpecMetricsOptions,
    SpecNormalizeOptions, SpecZeroNutrientOptions,
};
use labform_xlsx::{EnumMissingMeasurementPolicy, SpecFormLayout};
use serde::Deserialize;

/// Whole configuration file; every table is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct LabformConfig {
    pub normalize: NormalizeConfig,
    pub zero_nutrients: ZeroNutrientConfig,
    pub decimals: DecimalConfig,
    pub metrics: MetricsConfig,
    pub form: FormConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NormalizeConfig {
    pub cols_drop: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub drop_column_after_key: bool,
    /// Continue when raw rows lack an ordinal key (they are dropped).
    pub allow_missing_keys: bool,
    pub key_aliases: Option<Vec<String>>,
    pub measurement_aliases: Option<Vec<String>>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        let options = SpecNormalizeOptions::default();
        Self {
            cols_drop: options.cols_drop,
            renames: options.col_renames,
            drop_column_after_key: options.if_drop_column_after_key,
            allow_missing_keys: false,
            key_aliases: None,
            measurement_aliases: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ZeroNutrientConfig {
    pub enabled: bool,
    pub col_fat: String,
    pub col_protein: String,
    pub col_lactose: String,
}

impl Default for ZeroNutrientConfig {
    fn default() -> Self {
        let options = SpecZeroNutrientOptions::default();
        Self {
            enabled: true,
            col_fat: options.col_fat,
            col_protein: options.col_protein,
            col_lactose: options.col_lactose,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DecimalGroupConfig {
    pub n_decimals: usize,
    pub cols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DecimalConfig {
    /// Abort when formatted cells exceed their precision.
    pub strict_precision: bool,
    pub groups: Vec<DecimalGroupConfig>,
}

impl Default for DecimalConfig {
    fn default() -> Self {
        Self {
            strict_precision: false,
            groups: SpecDecimalOptions::default()
                .groups
                .into_iter()
                .map(|group| DecimalGroupConfig {
                    n_decimals: group.n_decimals,
                    cols: group.cols,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub col_fat: String,
    pub col_protein: String,
    pub col_lactose: String,
    pub col_total_solids: String,
    pub col_solids_non_fat: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let options = SpecMetricsOptions::default();
        Self {
            enabled: true,
            col_fat: options.col_fat,
            col_protein: options.col_protein,
            col_lactose: options.col_lactose,
            col_total_solids: options.col_total_solids,
            col_solids_non_fat: options.col_solids_non_fat,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FormConfig {
    pub start_row: u32,
    pub block_size: u32,
    pub max_per_form: usize,
    pub start_col_idx: u32,
    pub col_step: u32,
    pub label_col_offset: i32,
    pub write_label: bool,
    pub sheet_name: Option<String>,
    pub drop_incomplete: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        let layout = SpecFormLayout::default();
        Self {
            start_row: layout.start_row,
            block_size: layout.block_size,
            max_per_form: layout.max_per_form,
            start_col_idx: layout.start_col_idx,
            col_step: layout.col_step,
            label_col_offset: layout.label_col_offset,
            write_label: layout.if_write_label,
            sheet_name: layout.sheet_name,
            drop_incomplete: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub template: Option<PathBuf>,
    pub out_form: Option<PathBuf>,
    pub out_table: Option<PathBuf>,
}

impl LabformConfig {
    pub fn resolver(&self) -> ColumnResolver {
        let mut resolver = ColumnResolver::default();
        if let Some(l_aliases) = &self.normalize.key_aliases {
            resolver = resolver.with_aliases(EnumLogicalField::OrdinalKey, l_aliases);
        }
        if let Some(l_aliases) = &self.normalize.measurement_aliases {
            resolver = resolver.with_aliases(EnumLogicalField::Measurement, l_aliases);
        }
        resolver
    }

    pub fn normalize_options(&self) -> SpecNormalizeOptions {
        SpecNormalizeOptions {
            cols_drop: self.normalize.cols_drop.clone(),
            col_renames: self.normalize.renames.clone(),
            if_drop_column_after_key: self.normalize.drop_column_after_key,
        }
    }

    pub fn zero_nutrient_options(&self) -> SpecZeroNutrientOptions {
        SpecZeroNutrientOptions {
            col_fat: self.zero_nutrients.col_fat.clone(),
            col_protein: self.zero_nutrients.col_protein.clone(),
            col_lactose: self.zero_nutrients.col_lactose.clone(),
        }
    }

    pub fn decimal_options(&self) -> SpecDecimalOptions {
        SpecDecimalOptions {
            groups: self
                .decimals
                .groups
                .iter()
                .map(|group| SpecDecimalGroup {
                    n_decimals: group.n_decimals,
                    cols: group.cols.clone(),
                })
                .collect(),
        }
    }

    pub fn metrics_options(&self) -> SpecMetricsOptions {
        SpecMetricsOptions {
            col_fat: self.metrics.col_fat.clone(),
            col_protein: self.metrics.col_protein.clone(),
            col_lactose: self.metrics.col_lactose.clone(),
            col_total_solids: self.metrics.col_total_solids.clone(),
            col_solids_non_fat: self.metrics.col_solids_non_fat.clone(),
        }
    }

    pub fn form_layout(&self) -> SpecFormLayout {
        SpecFormLayout {
            start_row: self.form.start_row,
            block_size: self.form.block_size,
            max_per_form: self.form.max_per_form,
            start_col_idx: self.form.start_col_idx,
            col_step: self.form.col_step,
            label_col_offset: self.form.label_col_offset,
            if_write_label: self.form.write_label,
            sheet_name: self.form.sheet_name.clone(),
        }
    }

    pub fn missing_policy(&self) -> EnumMissingMeasurementPolicy {
        if self.form.drop_incomplete {
            EnumMissingMeasurementPolicy::DropIncomplete
        } else {
            EnumMissingMeasurementPolicy::FailFast
        }
    }
}

/// Read `path`, or return the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<LabformConfig> {
    let Some(path) = path else {
        return Ok(LabformConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: LabformConfig =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_match_library_defaults() {
        let config = LabformConfig::default();
        assert_eq!(config.normalize_options(), SpecNormalizeOptions::default());
        assert_eq!(config.decimal_options(), SpecDecimalOptions::default());
        assert_eq!(config.metrics_options(), SpecMetricsOptions::default());
        assert_eq!(config.form_layout(), SpecFormLayout::default());
        assert_eq!(config.missing_policy(), EnumMissingMeasurementPolicy::FailFast);
        assert!(config.zero_nutrients.enabled);
        assert!(!config.decimals.strict_precision);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: LabformConfig = toml::from_str(
            r#"
            [form]
            max_per_form = 100
            label_col_offset = -1
            drop_incomplete = true

            [normalize]
            measurement_aliases = ["acidity"]

            [[decimals.groups]]
            n_decimals = 3
            cols = ["Fat"]

            [paths]
            template = "forms/ph.xlsx"
            "#,
        )
        .unwrap();

        assert_eq!(config.form.max_per_form, 100);
        assert_eq!(config.form.block_size, 50);
        assert_eq!(config.form_layout().label_col_offset, -1);
        assert_eq!(
            config.missing_policy(),
            EnumMissingMeasurementPolicy::DropIncomplete
        );
        assert_eq!(
            config.resolver().aliases(EnumLogicalField::Measurement),
            ["acidity"]
        );
        assert_eq!(config.decimal_options().groups.len(), 1);
        assert_eq!(config.paths.template, Some(PathBuf::from("forms/ph.xlsx")));
        assert!(config.zero_nutrients.enabled);
    }

    #[test]
    fn test_load_config_without_path_is_default() {
        assert_eq!(load_config(None).unwrap(), LabformConfig::default());
    }
}
