//! Column-name canonicalization.
//!
//! Legacy exports name fields with a two-letter module prefix followed by a
//! four-letter field code (`MMITNO` is field `ITNO` of module `MM`). The target
//! system uses the bare field code, so legacy names are stripped of the prefix
//! before the two datasets are compared. Target names are only trimmed and
//! uppercased.

use std::collections::{BTreeMap, HashSet};

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::MinerError;

const LEGACY_NAME_LEN: usize = 6;
const LEGACY_PREFIX_LEN: usize = 2;

/// Canonical form of a legacy column name.
///
/// Trims, uppercases and drops the two-letter module prefix from six-character
/// names whose first two characters are alphabetic. Idempotent.
pub fn normalize(name: &str) -> String {
    let upper = plain(name);
    let mut chars = upper.chars();
    let has_prefix = upper.chars().count() == LEGACY_NAME_LEN
        && chars
            .by_ref()
            .take(LEGACY_PREFIX_LEN)
            .all(|ch| ch.is_alphabetic());
    if has_prefix {
        chars.as_str().trim().to_string()
    } else {
        upper
    }
}

fn plain(name: &str) -> String {
    name.to_uppercase().trim().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// Module-prefixed legacy names (`MMITNO` → `ITNO`).
    #[default]
    Legacy,
    /// Names are trimmed and uppercased only.
    Plain,
}

impl NamingConvention {
    pub fn canonical(self, raw: &str) -> String {
        match self {
            NamingConvention::Legacy => normalize(raw),
            NamingConvention::Plain => plain(raw),
        }
    }
}

/// What to do when two raw headers collapse onto the same canonical name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Keep the later column under its plain name and log a warning.
    #[default]
    Warn,
    /// Fail with [`MinerError::HeaderCollision`].
    Reject,
}

/// Reverse map from canonical column name to the raw header it came from.
///
/// Display only; joins and classification always use canonical names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMap {
    originals: BTreeMap<String, String>,
}

impl NameMap {
    pub fn original<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.originals
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub(crate) fn insert(&mut self, canonical: String, original: String) {
        self.originals.insert(canonical, original);
    }
}

/// Canonicalizes a raw header row, guaranteeing unique output names.
pub fn canonicalize_headers(
    dataset: &str,
    raw_headers: &[String],
    convention: NamingConvention,
    policy: CollisionPolicy,
) -> Result<(Vec<String>, NameMap), MinerError> {
    let mut names = Vec::with_capacity(raw_headers.len());
    let mut seen: HashSet<String> = HashSet::with_capacity(raw_headers.len());
    let mut map = NameMap::default();

    for (idx, raw) in raw_headers.iter().enumerate() {
        let mut canonical = convention.canonical(raw);
        if canonical.is_empty() {
            canonical = format!("COLUMN_{}", idx + 1);
        }
        if seen.contains(&canonical) {
            let first = map.original(&canonical).to_string();
            if policy == CollisionPolicy::Reject {
                return Err(MinerError::HeaderCollision {
                    dataset: dataset.to_string(),
                    canonical,
                    first,
                    second: raw.clone(),
                });
            }
            let replacement = unique_name(&plain(raw), &seen);
            warn!(
                "Columns '{first}' and '{raw}' in '{dataset}' both normalize to '{canonical}'; keeping '{raw}' as '{replacement}'"
            );
            canonical = replacement;
        }
        seen.insert(canonical.clone());
        map.insert(canonical.clone(), raw.clone());
        names.push(canonical);
    }
    Ok((names, map))
}

fn unique_name(base: &str, seen: &HashSet<String>) -> String {
    if !base.is_empty() && !seen.contains(base) {
        return base.to_string();
    }
    let mut counter = 2usize;
    loop {
        let candidate = format!("{base}_{counter}");
        if !seen.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
