//! Per-filter strategies.
//!
//! A strategy reads a [`NormalizedFilter`], resolves what it needs through
//! the [`Resolver`], and returns the conditions to AND into the query along
//! with the values it actually applied. Strategies never touch the query.

use crate::error::Result;
use crate::filter::condition::{Column, Condition};
use crate::filter::normalize::NormalizedFilter;
use crate::filter::resolve::{LookupStore, Resolver};
use crate::model::{EntityId, EntityKind, StatusState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved status token expanding to every open status.
pub const ALL_OPEN: &str = "all.open";

/// Reserved status token expanding to every closed status.
pub const ALL_CLOSED: &str = "all.closed";

/// How a filter kind turns tokens into conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Resolve tokens to ids of `entity` and test membership on `column`.
    Identifiers { entity: EntityKind, column: Column },
    /// Like `Identifiers` on statuses, plus the `all.open`/`all.closed` tokens.
    Status,
    /// OR of contains-matches on `column`.
    Text { column: Column },
    /// Summary text match and, separately, description text match.
    Search,
}

/// A value a filter actually applied: a resolved id or literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppliedValue {
    Id(EntityId),
    Text(String),
}

impl fmt::Display for AppliedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Result of running one strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyOutcome {
    /// Conditions to AND into the query, possibly none.
    pub conditions: Vec<Condition>,
    pub applied: Vec<AppliedValue>,
}

impl Strategy {
    /// Run this strategy over a normalized filter.
    ///
    /// # Errors
    ///
    /// Returns an error only if the lookup store fails.
    pub fn apply<S: LookupStore + ?Sized>(
        self,
        resolver: &Resolver<'_, S>,
        filter: &NormalizedFilter,
    ) -> Result<StrategyOutcome> {
        match self {
            Self::Identifiers { entity, column } => {
                let ids = resolver.resolve_all(entity, filter.values())?;
                Ok(membership(column, ids, filter.negated))
            }
            Self::Status => {
                let ids = status_ids(resolver, filter)?;
                Ok(membership(Column::StatusId, ids, filter.negated))
            }
            Self::Text { column } => Ok(text(column, filter)),
            Self::Search => {
                let mut outcome = text(Column::Summary, filter);
                let description = text(Column::Body, filter);
                outcome.conditions.extend(description.conditions);
                Ok(outcome)
            }
        }
    }
}

fn membership(column: Column, ids: Vec<EntityId>, negated: bool) -> StrategyOutcome {
    let applied = ids.iter().copied().map(AppliedValue::Id).collect();
    StrategyOutcome {
        conditions: Condition::membership(column, ids, negated)
            .into_iter()
            .collect(),
        applied,
    }
}

/// Reserved tokens only count in first position and shadow the rest.
fn status_ids<S: LookupStore + ?Sized>(
    resolver: &Resolver<'_, S>,
    filter: &NormalizedFilter,
) -> Result<Vec<EntityId>> {
    match filter.tokens.first().map(String::as_str) {
        Some(ALL_OPEN) => resolver.status_ids(StatusState::Open),
        Some(ALL_CLOSED) => resolver.status_ids(StatusState::Closed),
        _ => resolver.resolve_all(EntityKind::Status, filter.values()),
    }
}

fn text(column: Column, filter: &NormalizedFilter) -> StrategyOutcome {
    let mut matches = Vec::new();
    let mut applied = Vec::new();
    for token in filter.values() {
        matches.push(Condition::contains(column, token, filter.negated));
        applied.push(AppliedValue::Text(token.to_string()));
    }
    StrategyOutcome {
        conditions: Condition::any(matches).into_iter().collect(),
        applied,
    }
}
