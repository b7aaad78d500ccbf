//! Splitting raw filter input into tokens.
//!
//! A raw value is either one string (comma separated, except for `search`)
//! or an already-split list. The first token may carry a leading `!`
//! which negates the whole filter.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Filter name whose scalar input is never comma split.
pub const SEARCH_FILTER: &str = "search";

/// Leading marker on the first token that negates a filter.
pub const NEGATION_MARKER: char = '!';

/// Token separator for scalar input.
pub const TOKEN_SEPARATOR: char = ',';

/// Raw filter value as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<&[&str]> for RawValue {
    fn from(values: &[&str]) -> Self {
        Self::List(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// A filter after tokenizing and negation detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFilter {
    pub name: String,
    pub negated: bool,
    /// Distinct tokens in first-seen order. May contain the empty string.
    pub tokens: Vec<String>,
    /// First or last token was empty (or there were no tokens at all).
    pub includes_empty: bool,
}

impl NormalizedFilter {
    /// `"!"` when negated, otherwise empty.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        if self.negated { "!" } else { "" }
    }

    /// Tokens that carry a value.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .map(String::as_str)
            .filter(|token| !token.is_empty())
    }
}

/// Normalize one filter's raw input.
///
/// Never fails: degenerate input yields an empty token list with
/// `includes_empty` set.
#[must_use]
pub fn normalize(name: &str, raw: RawValue) -> NormalizedFilter {
    let mut tokens: Vec<String> = match raw {
        RawValue::Scalar(value) if name == SEARCH_FILTER => vec![value],
        RawValue::Scalar(value) => value.split(TOKEN_SEPARATOR).map(str::to_string).collect(),
        RawValue::List(values) => values,
    };

    let mut negated = false;
    if let Some(first) = tokens.first_mut() {
        if let Some(stripped) = first.strip_prefix(NEGATION_MARKER) {
            *first = stripped.to_string();
            negated = true;
        }
    }

    let includes_empty = match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => first.is_empty() || last.is_empty(),
        _ => true,
    };

    let mut seen = HashSet::with_capacity(tokens.len());
    tokens.retain(|token| seen.insert(token.clone()));

    NormalizedFilter {
        name: name.to_string(),
        negated,
        tokens,
        includes_empty,
    }
}
