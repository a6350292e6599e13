use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use super::error::SchemaError;
use crate::load::utils::clean_text;
use crate::record::Field;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_\-]+").unwrap());

/// Alternative header names per field, from configuration.
pub type Aliases = BTreeMap<Field, Vec<String>>;

/// Soft-matching key for a header: invisible characters removed, runs of
/// whitespace, `_` and `-` collapsed to one space, lowercased.
pub fn normalize_header(raw: &str) -> String {
    let cleaned = clean_text(raw);
    SEPARATORS
        .replace_all(&cleaned, " ")
        .trim()
        .to_lowercase()
}

/// Where each expected field lives in the input, plus the leftovers.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    positions: BTreeMap<Field, usize>,
    /// Unmatched columns: (index, cleaned header text).
    pub extras: Vec<(usize, String)>,
    /// Header text as found, for reporting.
    pub matched_headers: BTreeMap<Field, String>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String], aliases: &Aliases) -> Result<Self, SchemaError> {
        let keys: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut claimed = vec![false; headers.len()];
        let mut positions = BTreeMap::new();
        let mut matched_headers = BTreeMap::new();
        let mut missing = Vec::new();

        for field in Field::ALL {
            let mut wanted: HashSet<String> = HashSet::new();
            wanted.insert(normalize_header(field.canonical_name()));
            if let Some(alts) = aliases.get(&field) {
                wanted.extend(alts.iter().map(|a| normalize_header(a)));
            }
            wanted.remove("");

            let hits: Vec<usize> = keys
                .iter()
                .enumerate()
                .filter(|(i, k)| !claimed[*i] && wanted.contains(k.as_str()))
                .map(|(i, _)| i)
                .collect();

            match hits.first() {
                Some(&idx) => {
                    if hits.len() > 1 {
                        warn!(
                            field = %field,
                            used = %headers[idx],
                            ignored = hits.len() - 1,
                            "several columns match; using the first"
                        );
                    }
                    claimed[idx] = true;
                    positions.insert(field, idx);
                    matched_headers.insert(field, headers[idx].clone());
                    debug!(field = %field, header = %headers[idx], index = idx, "matched column");
                }
                None => missing.push(field.canonical_name().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        let extras = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(i, h)| {
                let name = clean_text(h);
                if name.is_empty() {
                    (i, format!("Unnamed: {}", i))
                } else {
                    (i, name)
                }
            })
            .collect();

        Ok(Self {
            positions,
            extras,
            matched_headers,
        })
    }

    pub fn index(&self, field: Field) -> usize {
        // resolve() only succeeds with every field placed
        self.positions[&field]
    }
}
