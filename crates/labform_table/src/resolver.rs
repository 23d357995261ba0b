//! Logical-field lookup over inconsistently written column headers.
//!
//! Headers are compared in normalized form: trimmed, lowercased, with every
//! character outside `[a-z0-9/]` removed (whitespace included). A field
//! matches a header exactly first; only when no header matches exactly is a
//! substring match tried. Within either rule the first header in frame order
//! wins, so when two headers collapse to the same normalized text the left one
//! is treated as canonical.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use polars::prelude::DataFrame;
use regex::Regex;

use crate::spec::{EnumLogicalField, TableError};

static RE_HEADER_STRIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9/]+").unwrap_or_else(|err| panic!("invalid header regex: {err}"))
});

/// Normalize one header for comparison.
pub fn normalize_header(header: &str) -> String {
    RE_HEADER_STRIP
        .replace_all(&header.trim().to_lowercase(), "")
        .into_owned()
}

/// Resolver holding the declared aliases of every logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnResolver {
    dict_aliases: BTreeMap<EnumLogicalField, Vec<String>>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        let dict_aliases = EnumLogicalField::all()
            .into_iter()
            .map(|field| {
                let l_aliases = field
                    .default_aliases()
                    .iter()
                    .map(|alias| normalize_header(alias))
                    .collect();
                (field, l_aliases)
            })
            .collect();
        Self { dict_aliases }
    }
}

impl ColumnResolver {
    /// Replace the aliases of `field`. Aliases are normalized on the way in.
    pub fn with_aliases<S: AsRef<str>>(mut self, field: EnumLogicalField, aliases: &[S]) -> Self {
        let l_aliases = aliases
            .iter()
            .map(|alias| normalize_header(alias.as_ref()))
            .filter(|alias| !alias.is_empty())
            .collect();
        self.dict_aliases.insert(field, l_aliases);
        self
    }

    /// Aliases currently declared for `field`.
    pub fn aliases(&self, field: EnumLogicalField) -> &[String] {
        self.dict_aliases
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Return the header representing `field`.
    pub fn resolve<S: AsRef<str>>(
        &self,
        field: EnumLogicalField,
        headers: &[S],
    ) -> Result<String, TableError> {
        resolve_header(field.name(), self.aliases(field), headers)
    }

    /// Resolve a caller-declared field that has no built-in variant.
    pub fn resolve_custom<A: AsRef<str>, S: AsRef<str>>(
        &self,
        field_name: &str,
        aliases: &[A],
        headers: &[S],
    ) -> Result<String, TableError> {
        let l_aliases: Vec<String> = aliases
            .iter()
            .map(|alias| normalize_header(alias.as_ref()))
            .filter(|alias| !alias.is_empty())
            .collect();
        resolve_header(field_name, &l_aliases, headers)
    }

    /// Return the column of `df` representing `field`.
    pub fn resolve_in(&self, field: EnumLogicalField, df: &DataFrame) -> Result<String, TableError> {
        self.resolve(field, &df.get_column_names_str())
    }
}

/// Exact alias match first, then substring match; first header wins.
fn resolve_header<S: AsRef<str>>(
    field_name: &str,
    aliases: &[String],
    headers: &[S],
) -> Result<String, TableError> {
    let l_normalized: Vec<String> = headers
        .iter()
        .map(|header| normalize_header(header.as_ref()))
        .collect();

    let n_idx_exact = l_normalized
        .iter()
        .position(|c_norm| aliases.iter().any(|alias| c_norm == alias));
    let n_idx_match = n_idx_exact.or_else(|| {
        l_normalized.iter().position(|c_norm| {
            !c_norm.is_empty() && aliases.iter().any(|alias| c_norm.contains(alias.as_str()))
        })
    });

    match n_idx_match {
        Some(n_idx) => Ok(headers[n_idx].as_ref().to_string()),
        None => Err(TableError::ColumnNotFound {
            field: field_name.to_string(),
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
        }),
    }
}
