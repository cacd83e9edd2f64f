//! In-process tag and metadata filtering for documents.
//!
//! Candidate rows are fetched from storage first and then narrowed here, so
//! the same rules apply to listing and full-text search.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::Error;
use crate::models::{Document, DocumentSummary};

/// How multiple tag or metadata constraints combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatchMode {
    /// Every requested tag (or meta pair) must be present.
    #[default]
    All,
    /// At least one requested tag (or meta pair) must be present.
    Any,
}

impl FromStr for TagMatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(TagMatchMode::All),
            "any" => Ok(TagMatchMode::Any),
            other => Err(Error::InvalidInput(format!(
                "unknown tag_mode '{}' (expected 'all' or 'any')",
                other
            ))),
        }
    }
}

/// Filter applied to documents after they are fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    /// Exact doc_type match (case-insensitive).
    pub doc_type: Option<String>,
    /// Requested tags, already normalised.
    pub tags: Vec<String>,
    /// Flat key equality against top-level `meta` keys.
    pub meta: Map<String, JsonValue>,
    pub mode: TagMatchMode,
}

impl DocumentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into().trim().to_lowercase());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn with_mode(mut self, mode: TagMatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check if the filter imposes no constraint.
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.tags.is_empty() && self.meta.is_empty()
    }

    /// Core predicate shared by [`Document`] and [`DocumentSummary`].
    pub fn matches_parts(&self, doc_type: &str, tags: &[String], meta: &JsonValue) -> bool {
        if let Some(wanted) = &self.doc_type {
            if !doc_type.eq_ignore_ascii_case(wanted) {
                return false;
            }
        }
        self.matches_tags(tags) && self.matches_meta(meta)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.matches_parts(&doc.doc_type, &doc.tags, &doc.meta)
    }

    pub fn matches_summary(&self, doc: &DocumentSummary) -> bool {
        self.matches_parts(&doc.doc_type, &doc.tags, &doc.meta)
    }

    fn matches_tags(&self, doc_tags: &[String]) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let have: BTreeSet<String> = doc_tags.iter().map(|t| t.to_lowercase()).collect();
        match self.mode {
            TagMatchMode::All => self.tags.iter().all(|t| have.contains(t)),
            TagMatchMode::Any => self.tags.iter().any(|t| have.contains(t)),
        }
    }

    fn matches_meta(&self, doc_meta: &JsonValue) -> bool {
        if self.meta.is_empty() {
            return true;
        }
        let Some(obj) = doc_meta.as_object() else {
            return false;
        };
        let pair_matches = |(key, wanted): (&String, &JsonValue)| {
            obj.get(key)
                .is_some_and(|actual| meta_value_matches(actual, wanted))
        };
        match self.mode {
            TagMatchMode::All => self.meta.iter().all(pair_matches),
            TagMatchMode::Any => self.meta.iter().any(pair_matches),
        }
    }
}

/// Exact equality, except that a string filter value also matches a number
/// or boolean whose string form is identical. Strings compare case-sensitively.
pub fn meta_value_matches(actual: &JsonValue, wanted: &JsonValue) -> bool {
    if actual == wanted {
        return true;
    }
    match (actual, wanted) {
        (JsonValue::Number(n), JsonValue::String(s)) => n.to_string() == *s,
        (JsonValue::Bool(b), JsonValue::String(s)) => b.to_string() == *s,
        _ => false,
    }
}

/// Trim, lowercase, drop empties, deduplicate and sort.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse a comma-separated tag list (`a,b , c`).
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

/// Parse `key:value,key2:value2` into a meta map of string values.
pub fn parse_meta_pairs(raw: &str) -> Result<Map<String, JsonValue>, Error> {
    let mut map = Map::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once(':').ok_or_else(|| {
            Error::InvalidInput(format!("meta filter '{}' must look like key:value", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput(format!(
                "meta filter '{}' has an empty key",
                pair
            )));
        }
        map.insert(key.to_string(), JsonValue::String(value.trim().to_string()));
    }
    Ok(map)
}
