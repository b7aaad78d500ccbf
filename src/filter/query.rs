//! The in-progress ticket query handed back to callers.
//!
//! A [`TicketQuery`] is always scoped to one project. Filters AND their
//! conditions into it; callers then pick ordering and pagination and hand
//! it to storage for execution.

use crate::error::{Result, TraqError};
use crate::filter::condition::Condition;
use crate::filter::kind::FilterKind;
use crate::model::ProjectId;
use rusqlite::types::Value;
use std::fmt::Write as _;
use std::str::FromStr;

/// Columns selected for ticket listings, in the order storage reads them.
pub(crate) const TICKET_COLUMNS: &str = r"
    tickets.id, tickets.ticket_id, tickets.project_id, tickets.summary, tickets.body,
    owner.name, assignee.name, milestone.slug, version.slug, component.name,
    ticket_type.name, status.name, priority.name, severity.name,
    tickets.is_closed, tickets.created_at, tickets.updated_at";

/// Ticket table with every referenced entity joined for display.
pub(crate) const TICKET_FROM: &str = r"
    FROM tickets
    LEFT JOIN users AS owner ON owner.id = tickets.user_id
    LEFT JOIN users AS assignee ON assignee.id = tickets.assigned_to_id
    LEFT JOIN milestones AS milestone ON milestone.id = tickets.milestone_id
    LEFT JOIN milestones AS version ON version.id = tickets.version_id
    LEFT JOIN components AS component ON component.id = tickets.component_id
    LEFT JOIN types AS ticket_type ON ticket_type.id = tickets.type_id
    LEFT JOIN statuses AS status ON status.id = tickets.status_id
    LEFT JOIN priorities AS priority ON priority.id = tickets.priority_id
    LEFT JOIN severities AS severity ON severity.id = tickets.severity_id";

/// Sortable ticket attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    Summary,
    Created,
    Updated,
    Priority,
    Severity,
    Status,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Summary => "summary",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Priority => "priority",
            Self::Severity => "severity",
            Self::Status => "status",
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Self::Id => "tickets.ticket_id",
            Self::Summary => "tickets.summary COLLATE NOCASE",
            Self::Created => "tickets.created_at",
            Self::Updated => "tickets.updated_at",
            Self::Priority => "tickets.priority_id",
            Self::Severity => "tickets.severity_id",
            Self::Status => "tickets.status_id",
        }
    }
}

/// Listing order, written as `field` or `field.asc` / `field.desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TicketSort {
    pub field: SortField,
    pub descending: bool,
}

impl FromStr for TicketSort {
    type Err = TraqError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        let (field, direction) = normalized
            .split_once('.')
            .unwrap_or((normalized.as_str(), "asc"));

        let field = match field {
            "id" | "ticket_id" => SortField::Id,
            "summary" => SortField::Summary,
            "created" | "created_at" => SortField::Created,
            "updated" | "updated_at" => SortField::Updated,
            "priority" => SortField::Priority,
            "severity" => SortField::Severity,
            "status" => SortField::Status,
            other => {
                return Err(TraqError::validation(
                    "order",
                    format!(
                        "unknown sort field '{other}' (expected id, summary, created, updated, priority, severity or status)"
                    ),
                ));
            }
        };
        let descending = match direction {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(TraqError::validation(
                    "order",
                    format!("unknown sort direction '{other}' (expected asc or desc)"),
                ));
            }
        };

        Ok(Self { field, descending })
    }
}

/// Conjunctive ticket query scoped to one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    project_id: ProjectId,
    conditions: Vec<(FilterKind, Condition)>,
    sort: TicketSort,
    limit: Option<usize>,
    offset: usize,
}

impl TicketQuery {
    /// Query matching every ticket of the project.
    #[must_use]
    pub const fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            conditions: Vec::new(),
            sort: TicketSort {
                field: SortField::Id,
                descending: false,
            },
            limit: None,
            offset: 0,
        }
    }

    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// AND a condition contributed by `source` into the query.
    pub fn and_where(&mut self, source: FilterKind, condition: Condition) {
        self.conditions.push((source, condition));
    }

    /// Drop every condition contributed by `source`, returning how many.
    pub fn clear_filter(&mut self, source: FilterKind) -> usize {
        let before = self.conditions.len();
        self.conditions.retain(|(kind, _)| *kind != source);
        before - self.conditions.len()
    }

    /// Conditions in the order they were added.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().map(|(_, condition)| condition)
    }

    /// Conditions contributed by one filter.
    pub fn conditions_from(&self, source: FilterKind) -> impl Iterator<Item = &Condition> {
        self.conditions
            .iter()
            .filter(move |(kind, _)| *kind == source)
            .map(|(_, condition)| condition)
    }

    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub const fn order_by(&mut self, sort: TicketSort) -> &mut Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn sort(&self) -> TicketSort {
        self.sort
    }

    pub const fn limit(&mut self, limit: Option<usize>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Select one page (1-based). Page 0 is treated as page 1.
    pub const fn paginate(&mut self, page: usize, per_page: usize) -> &mut Self {
        let page = if page == 0 { 1 } else { page };
        self.limit = Some(per_page);
        self.offset = (page - 1).saturating_mul(per_page);
        self
    }

    /// `WHERE` clause (including the keyword) and its parameters.
    #[must_use]
    pub fn where_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(" WHERE tickets.project_id = ?");
        let mut params = vec![Value::Integer(self.project_id)];
        for (_, condition) in &self.conditions {
            sql.push_str(" AND ");
            condition.write_sql(&mut sql, &mut params);
        }
        (sql, params)
    }

    /// Full listing statement with ordering and pagination.
    #[must_use]
    pub fn select_sql(&self) -> (String, Vec<Value>) {
        let (where_sql, mut params) = self.where_sql();
        let mut sql = format!("SELECT {TICKET_COLUMNS}{TICKET_FROM}{where_sql}");

        let direction = if self.sort.descending { "DESC" } else { "ASC" };
        let _ = write!(sql, " ORDER BY {} {direction}", self.sort.field.column());
        if self.sort.field != SortField::Id {
            sql.push_str(", tickets.ticket_id ASC");
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(to_i64(limit)));
            params.push(Value::Integer(to_i64(self.offset)));
        }

        (sql, params)
    }

    /// Count statement over the same conditions, ignoring pagination.
    #[must_use]
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let (where_sql, params) = self.where_sql();
        (format!("SELECT COUNT(*) FROM tickets{where_sql}"), params)
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
