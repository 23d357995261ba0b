//! Chunked filling of the pre-printed form.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use labform_table::SpecMeasurementPairs;
use labform_table::util::round_to_decimals;

use crate::conf::{N_MISSING_KEYS_REPORTED, N_VALUE_DECIMALS};
use crate::spec::{
    EnumMissingMeasurementPolicy, FormError, ReportFormFill, SpecFormChunk, SpecFormLayout,
};
use crate::template::TemplatePackage;
use crate::util::{derive_chunk_path, generate_chunks};

/// Apply the missing-value policy and split the pairs into per-document chunks.
///
/// Returns the chunks plus the keys excluded as incomplete. Nothing is read or
/// written; an empty (or fully excluded) input yields no chunks.
pub fn plan_form_chunks(
    pairs: &SpecMeasurementPairs,
    layout: &SpecFormLayout,
    policy: EnumMissingMeasurementPolicy,
    path_out_base: &Path,
) -> Result<(Vec<SpecFormChunk>, Vec<i64>), FormError> {
    let l_keys_missing = pairs.missing_keys();
    if !l_keys_missing.is_empty() && policy == EnumMissingMeasurementPolicy::FailFast {
        return Err(FormError::MissingMeasurement {
            keys: l_keys_missing
                .iter()
                .take(N_MISSING_KEYS_REPORTED)
                .copied()
                .collect(),
            n_missing: l_keys_missing.len(),
        });
    }

    let l_pairs_complete: Vec<_> = pairs
        .as_slice()
        .iter()
        .filter(|pair| pair.value.is_some())
        .copied()
        .collect();
    if !l_keys_missing.is_empty() {
        tracing::warn!(
            dropped = l_keys_missing.len(),
            "incomplete measurements excluded"
        );
    }

    let l_bounds = generate_chunks(l_pairs_complete.len(), layout.max_per_form);
    let n_chunks = l_bounds.len();
    let l_chunks = l_bounds
        .into_iter()
        .enumerate()
        .map(|(n_idx, (n_start, n_len))| SpecFormChunk {
            chunk_idx: n_idx + 1,
            path_out: derive_chunk_path(path_out_base, n_idx + 1, n_chunks),
            pairs: l_pairs_complete[n_start..n_start + n_len].to_vec(),
        })
        .collect();
    Ok((l_chunks, l_keys_missing))
}

/// Writer placing measurement pairs onto copies of a template.
#[derive(Debug, Clone)]
pub struct FormWriter {
    path_template: PathBuf,
    layout: SpecFormLayout,
    policy: EnumMissingMeasurementPolicy,
}

impl FormWriter {
    /// Bind a template and a layout; the layout is validated here.
    pub fn new(path_template: PathBuf, layout: SpecFormLayout) -> Result<Self, FormError> {
        layout.validate()?;
        Ok(Self {
            path_template,
            layout,
            policy: EnumMissingMeasurementPolicy::default(),
        })
    }

    /// Choose how pairs without a value are handled.
    pub fn with_missing_policy(mut self, policy: EnumMissingMeasurementPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Layout in use.
    pub fn layout(&self) -> &SpecFormLayout {
        &self.layout
    }

    /// Fill one template copy per chunk and save it.
    ///
    /// With a single chunk the document is saved at `path_out_base`; otherwise
    /// chunk `c` goes to `<stem>_part<c><ext>`. The template is re-read for
    /// every chunk and only its target worksheet changes, so formatting is
    /// kept in every document.
    pub fn fill(
        &self,
        pairs: &SpecMeasurementPairs,
        path_out_base: &Path,
    ) -> Result<ReportFormFill, FormError> {
        let (l_chunks, keys_dropped) =
            plan_form_chunks(pairs, &self.layout, self.policy, path_out_base)?;

        let mut report = ReportFormFill {
            keys_dropped,
            ..Default::default()
        };
        if l_chunks.is_empty() {
            tracing::info!("no measurements to place; no form written");
            return Ok(report);
        }

        for chunk in &l_chunks {
            self.write_chunk(chunk)?;
            tracing::info!(
                chunk = chunk.chunk_idx,
                pairs = chunk.pairs.len(),
                path = %chunk.path_out.display(),
                "form chunk saved"
            );
            report.cnt_pairs_written += chunk.pairs.len();
            report.paths_out.push(chunk.path_out.clone());
        }
        Ok(report)
    }

    fn write_chunk(&self, chunk: &SpecFormChunk) -> Result<(), FormError> {
        let package = TemplatePackage::open(&self.path_template)?;
        let sheet = package.find_sheet(self.layout.sheet_name.as_deref())?;

        let mut dict_cells = BTreeMap::new();
        for (n_pos, pair) in chunk.pairs.iter().enumerate() {
            let Some(n_value) = pair.value else {
                continue;
            };
            let n_slot = n_pos + 1;
            dict_cells.insert(
                self.layout.map_value_cell(n_slot)?,
                round_to_decimals(n_value, N_VALUE_DECIMALS),
            );
            if let Some(cell_label) = self.layout.map_label_cell(n_slot)? {
                dict_cells.insert(cell_label, pair.key as f64);
            }
        }

        if let Some(path_parent) = chunk.path_out.parent()
            && !path_parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(path_parent)?;
        }
        package.write_with_numbers(&sheet.part, &dict_cells, &chunk.path_out)
    }
}

#[cfg(test)]
mod tests {
    use labform_table::SpecMeasurementPair;
    use tempfile::tempdir;

    use super::*;

    fn make_pairs(n_pairs: i64) -> SpecMeasurementPairs {
        SpecMeasurementPairs::from_pairs((1..=n_pairs).map(|key| SpecMeasurementPair {
            key,
            value: Some(6.0 + key as f64 / 1000.0),
        }))
    }

    #[test]
    fn test_plan_form_chunks_splits_at_capacity() {
        let pairs = make_pairs(160);
        let (l_chunks, l_dropped) = plan_form_chunks(
            &pairs,
            &SpecFormLayout::default(),
            EnumMissingMeasurementPolicy::FailFast,
            Path::new("out/ph.xlsx"),
        )
        .unwrap();

        assert!(l_dropped.is_empty());
        assert_eq!(l_chunks.len(), 2);
        assert_eq!(l_chunks[0].pairs.len(), 150);
        assert_eq!(l_chunks[1].pairs.len(), 10);
        assert_eq!(l_chunks[0].path_out, Path::new("out/ph_part1.xlsx"));
        assert_eq!(l_chunks[1].path_out, Path::new("out/ph_part2.xlsx"));

        let l_concat: Vec<SpecMeasurementPair> = l_chunks
            .iter()
            .flat_map(|chunk| chunk.pairs.iter().copied())
            .collect();
        assert_eq!(l_concat.as_slice(), pairs.as_slice());
    }

    #[test]
    fn test_plan_form_chunks_single_chunk_keeps_base_path() {
        let (l_chunks, _) = plan_form_chunks(
            &make_pairs(150),
            &SpecFormLayout::default(),
            EnumMissingMeasurementPolicy::FailFast,
            Path::new("ph.xlsx"),
        )
        .unwrap();
        assert_eq!(l_chunks.len(), 1);
        assert_eq!(l_chunks[0].path_out, Path::new("ph.xlsx"));
    }

    #[test]
    fn test_plan_form_chunks_drop_incomplete() {
        let pairs = SpecMeasurementPairs::from_pairs([
            SpecMeasurementPair { key: 1, value: None },
            SpecMeasurementPair { key: 2, value: Some(7.2) },
        ]);
        let (l_chunks, l_dropped) = plan_form_chunks(
            &pairs,
            &SpecFormLayout::default(),
            EnumMissingMeasurementPolicy::DropIncomplete,
            Path::new("ph.xlsx"),
        )
        .unwrap();
        assert_eq!(l_dropped, vec![1]);
        assert_eq!(l_chunks.len(), 1);
        assert_eq!(l_chunks[0].pairs, vec![SpecMeasurementPair { key: 2, value: Some(7.2) }]);
    }

    #[test]
    fn test_missing_measurement_lists_at_most_twenty_keys() {
        let pairs = SpecMeasurementPairs::from_pairs(
            (1..=25).map(|key| SpecMeasurementPair { key, value: None }),
        );
        let err = plan_form_chunks(
            &pairs,
            &SpecFormLayout::default(),
            EnumMissingMeasurementPolicy::FailFast,
            Path::new("ph.xlsx"),
        )
        .expect_err("must fail");
        match err {
            FormError::MissingMeasurement { keys, n_missing } => {
                assert_eq!(keys, (1..=20).collect::<Vec<i64>>());
                assert_eq!(n_missing, 25);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fill_fail_fast_writes_nothing() {
        let dir_tmp = tempdir().unwrap();
        let pairs = SpecMeasurementPairs::from_pairs([
            SpecMeasurementPair { key: 1, value: None },
            SpecMeasurementPair { key: 2, value: Some(7.2) },
        ]);
        let writer = FormWriter::new(
            dir_tmp.path().join("template.xlsx"),
            SpecFormLayout::default(),
        )
        .unwrap();
        let path_out = dir_tmp.path().join("ph.xlsx");

        let err = writer.fill(&pairs, &path_out).expect_err("must fail");
        assert!(matches!(err, FormError::MissingMeasurement { ref keys, .. } if keys == &vec![1]));
        assert_eq!(std::fs::read_dir(dir_tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fill_empty_input_writes_nothing() {
        let dir_tmp = tempdir().unwrap();
        let writer = FormWriter::new(
            dir_tmp.path().join("template.xlsx"),
            SpecFormLayout::default(),
        )
        .unwrap();
        let report = writer
            .fill(&SpecMeasurementPairs::default(), &dir_tmp.path().join("ph.xlsx"))
            .unwrap();
        assert!(report.paths_out.is_empty());
        assert_eq!(std::fs::read_dir(dir_tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_layout() {
        let layout = SpecFormLayout {
            max_per_form: 0,
            ..Default::default()
        };
        assert!(matches!(
            FormWriter::new(PathBuf::from("template.xlsx"), layout),
            Err(FormError::InvalidLayout(_))
        ));
    }
}
