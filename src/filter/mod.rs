//! Ticket filter query builder.
//!
//! Turns loosely structured filter input (`status=!Closed`,
//! `milestone=1.0,1.1`, `search=crash*save`) into a project scoped
//! [`TicketQuery`], and records what each filter actually matched so a
//! form can be re-displayed.
//!
//! # Semantics
//!
//! - Tokens that do not resolve are dropped. A filter with nothing left
//!   adds no condition but still gets a [`ResolvedFilter`] entry.
//! - A leading `!` on the first token negates the whole filter.
//! - Unknown filter names are recorded and otherwise ignored.
//! - Processing the same filter name twice replaces both its entry and the
//!   conditions it contributed earlier.

pub mod condition;
pub mod kind;
pub mod normalize;
pub mod query;
pub mod resolve;
pub mod strategy;

pub use condition::{Column, Condition};
pub use kind::FilterKind;
pub use normalize::{NormalizedFilter, RawValue, normalize};
pub use query::{SortField, TicketQuery, TicketSort};
pub use resolve::{Lookup, LookupStore, Resolver};
pub use strategy::{ALL_CLOSED, ALL_OPEN, AppliedValue, Strategy, StrategyOutcome};

use crate::error::{Result, TraqError};
use crate::model::ProjectId;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// What one filter applied, for re-display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFilter {
    pub name: String,
    /// `"!"` when negated, otherwise empty.
    pub prefix: &'static str,
    pub values: Vec<AppliedValue>,
    /// The input carried an empty first or last value.
    pub includes_empty: bool,
}

impl ResolvedFilter {
    fn from_normalized(filter: &NormalizedFilter) -> Self {
        Self {
            name: filter.name.clone(),
            prefix: filter.prefix(),
            values: Vec::new(),
            includes_empty: filter.includes_empty,
        }
    }

    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.prefix == "!"
    }

    /// Values to pre-fill a filter form with: a blank slot first when the
    /// input had an empty value, then every applied value.
    #[must_use]
    pub fn display_values(&self) -> Vec<String> {
        let mut values = Vec::with_capacity(self.values.len() + 1);
        if self.includes_empty {
            values.push(String::new());
        }
        values.extend(self.values.iter().map(ToString::to_string));
        values
    }
}

/// Ordered `(name, value)` filter input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRequest {
    entries: Vec<(String, RawValue)>,
}

impl FilterRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Parse `name=value` pairs. The value may be empty (`milestone=`).
    ///
    /// # Errors
    ///
    /// Returns a validation error for a pair without `=` or with an empty name.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut request = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let Some((name, value)) = pair.split_once('=') else {
                return Err(TraqError::validation(
                    "filter",
                    format!("expected name=value, got '{pair}'"),
                ));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(TraqError::validation(
                    "filter",
                    format!("missing filter name in '{pair}'"),
                ));
            }
            request.push(name, value);
        }
        Ok(request)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>, V: Into<RawValue>> FromIterator<(N, V)> for FilterRequest {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut request = Self::new();
        for (name, value) in iter {
            request.push(name, value);
        }
        request
    }
}

/// Builds one project's ticket query from filter input.
///
/// Not meant to be shared between requests: create one per listing.
pub struct TicketFilterQuery<'a, S: ?Sized> {
    resolver: Resolver<'a, S>,
    builder: TicketQuery,
    filters: BTreeMap<String, ResolvedFilter>,
}

impl<'a, S: LookupStore + ?Sized> TicketFilterQuery<'a, S> {
    pub fn new(store: &'a S, project_id: ProjectId) -> Self {
        Self {
            resolver: Resolver::new(store, project_id),
            builder: TicketQuery::for_project(project_id),
            filters: BTreeMap::new(),
        }
    }

    /// Process one filter.
    ///
    /// # Errors
    ///
    /// Returns an error only if the lookup store fails; the query and the
    /// filter map are left untouched in that case.
    pub fn process(&mut self, name: &str, value: impl Into<RawValue>) -> Result<()> {
        let normalized = normalize(name, value.into());
        let mut resolved = ResolvedFilter::from_normalized(&normalized);

        debug!(
            filter = name,
            negated = normalized.negated,
            tokens = ?normalized.tokens,
            "processing filter"
        );

        if let Some(kind) = FilterKind::parse(name) {
            let outcome = if normalized.tokens.is_empty() {
                StrategyOutcome::default()
            } else {
                kind.strategy().apply(&self.resolver, &normalized)?
            };

            let replaced = self.builder.clear_filter(kind);
            if replaced > 0 {
                debug!(filter = name, replaced, "replacing earlier conditions");
            }
            let added = outcome.conditions.len();
            for condition in outcome.conditions {
                self.builder.and_where(kind, condition);
            }
            resolved.values = outcome.applied;

            debug!(
                filter = name,
                conditions = added,
                applied = resolved.values.len(),
                "filter processed"
            );
        } else {
            debug!(filter = name, "ignoring unknown filter");
        }

        self.filters.insert(name.to_string(), resolved);
        Ok(())
    }

    /// Process every filter of a request in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup store fails.
    pub fn apply(&mut self, request: &FilterRequest) -> Result<()> {
        for (name, value) in request.iter() {
            self.process(name, value.clone())?;
        }
        Ok(())
    }

    /// Every processed filter, keyed by name.
    #[must_use]
    pub const fn filters(&self) -> &BTreeMap<String, ResolvedFilter> {
        &self.filters
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&ResolvedFilter> {
        self.filters.get(name)
    }

    /// The in-progress query scoped to the project.
    #[must_use]
    pub const fn builder(&self) -> &TicketQuery {
        &self.builder
    }

    /// Mutable access for ordering and pagination.
    pub const fn builder_mut(&mut self) -> &mut TicketQuery {
        &mut self.builder
    }

    #[must_use]
    pub fn into_builder(self) -> TicketQuery {
        self.builder
    }

    #[must_use]
    pub fn into_parts(self) -> (TicketQuery, BTreeMap<String, ResolvedFilter>) {
        (self.builder, self.filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, EntityKind, StatusState};
    use crate::storage::SqliteStorage;

    struct Fixture {
        storage: SqliteStorage,
        project_id: ProjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut storage = SqliteStorage::open_memory().expect("open");
            storage.seed_defaults().expect("seed");
            let project = storage.create_project("Traq", "traq").expect("project");
            storage
                .create_milestone(project.id, "1.0", "1.0")
                .expect("milestone");
            storage
                .create_milestone(project.id, "1.1", "1.1")
                .expect("milestone");
            storage.create_user("alice", "Alice").expect("user");
            Self {
                storage,
                project_id: project.id,
            }
        }

        fn query(&self) -> TicketFilterQuery<'_, SqliteStorage> {
            TicketFilterQuery::new(&self.storage, self.project_id)
        }

        fn id(&self, kind: EntityKind, key: &str) -> EntityId {
            self.storage
                .lookup(kind, self.project_id, key)
                .expect("lookup")
                .id()
                .expect("exists")
        }
    }

    #[test]
    fn identifier_filter_builds_membership() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("milestone", "1.0,1.1").expect("process");

        let expected = vec![
            fx.id(EntityKind::Milestone, "1.0"),
            fx.id(EntityKind::Milestone, "1.1"),
        ];
        assert_eq!(
            query.builder().conditions().collect::<Vec<_>>(),
            vec![&Condition::Membership {
                column: Column::MilestoneId,
                ids: expected.clone(),
                negated: false,
            }]
        );
        let filter = query.filter("milestone").expect("recorded");
        assert_eq!(filter.prefix, "");
        assert_eq!(
            filter.values,
            expected.into_iter().map(AppliedValue::Id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn negated_filter_records_prefix() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("type", "!Defect,Task").expect("process");

        let filter = query.filter("type").expect("recorded");
        assert_eq!(filter.prefix, "!");
        assert!(filter.is_negated());
        assert!(matches!(
            query.builder().conditions().next(),
            Some(Condition::Membership { negated: true, .. })
        ));
    }

    #[test]
    fn unresolvable_tokens_are_excluded() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("type", "Defect,nosuchtype").expect("process");
        assert_eq!(
            query.filter("type").expect("recorded").values,
            vec![AppliedValue::Id(fx.id(EntityKind::Type, "Defect"))]
        );
    }

    #[test]
    fn all_unresolvable_adds_no_condition_but_records_entry() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("owner", "nobody,ghost").expect("process");

        assert_eq!(query.builder().condition_count(), 0);
        let filter = query.filter("owner").expect("recorded");
        assert!(filter.values.is_empty());
    }

    #[test]
    fn empty_value_sets_marker_without_condition() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("milestone", "").expect("process");

        assert_eq!(query.builder().condition_count(), 0);
        let filter = query.filter("milestone").expect("recorded");
        assert!(filter.includes_empty);
        assert_eq!(filter.display_values(), vec![String::new()]);
    }

    #[test]
    fn all_open_matches_open_statuses() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("status", "all.open,Closed").expect("process");

        let open = fx.storage.status_ids(StatusState::Open).expect("ids");
        assert_eq!(
            query.filter("status").expect("recorded").values,
            open.into_iter().map(AppliedValue::Id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn summary_tokens_are_or_combined() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("summary", "foo,baz").expect("process");

        assert_eq!(
            query.builder().conditions().collect::<Vec<_>>(),
            vec![&Condition::Any(vec![
                Condition::contains(Column::Summary, "foo", false),
                Condition::contains(Column::Summary, "baz", false),
            ])]
        );
    }

    #[test]
    fn reprocessing_replaces_entry_and_conditions() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("status", "New").expect("process");
        query.process("status", "Closed").expect("process");

        assert_eq!(query.filters().len(), 1);
        assert_eq!(
            query.filter("status").expect("recorded").values,
            vec![AppliedValue::Id(fx.id(EntityKind::Status, "Closed"))]
        );
        assert_eq!(query.builder().condition_count(), 1);
    }

    #[test]
    fn reprocessing_with_nothing_resolved_clears_earlier_condition() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("type", "Task").expect("process");
        query.process("type", "nosuchtype").expect("process");
        assert_eq!(query.builder().condition_count(), 0);
        assert!(query.filter("type").expect("recorded").values.is_empty());
    }

    #[test]
    fn unknown_filter_is_recorded_and_ignored() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("votes", "!3").expect("process");

        assert_eq!(query.builder().condition_count(), 0);
        let filter = query.filter("votes").expect("recorded");
        assert_eq!(filter.prefix, "!");
        assert!(filter.values.is_empty());
    }

    #[test]
    fn search_adds_summary_and_description_groups() {
        let fx = Fixture::new();
        let mut query = fx.query();
        query.process("search", "crash").expect("process");
        assert_eq!(query.builder().conditions_from(FilterKind::Search).count(), 2);
        assert_eq!(
            query.filter("search").expect("recorded").values,
            vec![AppliedValue::Text("crash".into())]
        );
    }

    #[test]
    fn apply_processes_request_in_order() {
        let fx = Fixture::new();
        let request = FilterRequest::from_pairs(["owner=Alice", "milestone=1.0", "owner=nobody"])
            .expect("pairs");
        let mut query = fx.query();
        query.apply(&request).expect("apply");

        assert_eq!(query.filters().len(), 2);
        assert!(query.filter("owner").expect("recorded").values.is_empty());
        assert_eq!(query.builder().condition_count(), 1);
    }

    #[test]
    fn from_pairs_rejects_missing_equals() {
        assert!(FilterRequest::from_pairs(["milestone"]).is_err());
        assert!(FilterRequest::from_pairs(["=1.0"]).is_err());
        let request = FilterRequest::from_pairs(["milestone="]).expect("pairs");
        assert!(request.contains("milestone"));
        assert_eq!(request.len(), 1);
    }

    #[test]
    fn display_values_lead_with_blank_slot() {
        let filter = ResolvedFilter {
            name: "component".into(),
            prefix: "",
            values: vec![AppliedValue::Id(2)],
            includes_empty: true,
        };
        assert_eq!(filter.display_values(), vec!["".to_string(), "2".to_string()]);
    }
}
