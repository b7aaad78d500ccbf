//! Typed query conditions and their SQL rendering.
//!
//! Column names come only from [`Column`]; every user supplied value is
//! bound as a parameter.

use crate::model::EntityId;
use rusqlite::types::Value;
use std::fmt::Write as _;

/// Escape character used in every `LIKE` pattern.
pub const LIKE_ESCAPE: char = '\\';

/// User facing wildcard, rewritten to `%`.
pub const WILDCARD: char = '*';

/// Filterable ticket columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    MilestoneId,
    VersionId,
    StatusId,
    TypeId,
    ComponentId,
    PriorityId,
    SeverityId,
    UserId,
    AssignedToId,
    Summary,
    Body,
}

impl Column {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MilestoneId => "milestone_id",
            Self::VersionId => "version_id",
            Self::StatusId => "status_id",
            Self::TypeId => "type_id",
            Self::ComponentId => "component_id",
            Self::PriorityId => "priority_id",
            Self::SeverityId => "severity_id",
            Self::UserId => "user_id",
            Self::AssignedToId => "assigned_to_id",
            Self::Summary => "summary",
            Self::Body => "body",
        }
    }

    /// Column qualified with the tickets table, safe inside joins.
    #[must_use]
    pub const fn qualified(self) -> &'static str {
        match self {
            Self::MilestoneId => "tickets.milestone_id",
            Self::VersionId => "tickets.version_id",
            Self::StatusId => "tickets.status_id",
            Self::TypeId => "tickets.type_id",
            Self::ComponentId => "tickets.component_id",
            Self::PriorityId => "tickets.priority_id",
            Self::SeverityId => "tickets.severity_id",
            Self::UserId => "tickets.user_id",
            Self::AssignedToId => "tickets.assigned_to_id",
            Self::Summary => "tickets.summary",
            Self::Body => "tickets.body",
        }
    }
}

/// Boolean predicate over one filter's resolved values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column IN (ids)` or `column NOT IN (ids)`. `ids` is never empty.
    Membership {
        column: Column,
        ids: Vec<EntityId>,
        negated: bool,
    },
    /// `column LIKE pattern` or `column NOT LIKE pattern`.
    Pattern {
        column: Column,
        pattern: String,
        negated: bool,
    },
    /// Disjunction of conditions. Never empty.
    Any(Vec<Condition>),
}

impl Condition {
    /// Membership test, or `None` when there is nothing to test against.
    #[must_use]
    pub fn membership(column: Column, ids: Vec<EntityId>, negated: bool) -> Option<Self> {
        if ids.is_empty() {
            None
        } else {
            Some(Self::Membership {
                column,
                ids,
                negated,
            })
        }
    }

    /// Contains-match for a user token, with `*` as wildcard.
    #[must_use]
    pub fn contains(column: Column, token: &str, negated: bool) -> Self {
        Self::Pattern {
            column,
            pattern: like_pattern(token),
            negated,
        }
    }

    /// OR of the given conditions, or `None` if there are none.
    #[must_use]
    pub fn any(conditions: Vec<Self>) -> Option<Self> {
        if conditions.is_empty() {
            None
        } else {
            Some(Self::Any(conditions))
        }
    }

    /// Append this condition's SQL to `sql`, pushing bound values to `params`.
    pub fn write_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::Membership {
                column,
                ids,
                negated,
            } => {
                let placeholders = vec!["?"; ids.len()].join(",");
                let op = if *negated { "NOT IN" } else { "IN" };
                let _ = write!(sql, "{} {op} ({placeholders})", column.qualified());
                params.extend(ids.iter().map(|id| Value::Integer(*id)));
            }
            Self::Pattern {
                column,
                pattern,
                negated,
            } => {
                let op = if *negated { "NOT LIKE" } else { "LIKE" };
                let _ = write!(
                    sql,
                    "{} {op} ? ESCAPE '{LIKE_ESCAPE}'",
                    column.qualified()
                );
                params.push(Value::Text(pattern.clone()));
            }
            Self::Any(conditions) => {
                sql.push('(');
                for (idx, condition) in conditions.iter().enumerate() {
                    if idx > 0 {
                        sql.push_str(" OR ");
                    }
                    condition.write_sql(sql, params);
                }
                sql.push(')');
            }
        }
    }
}

/// Build a `%token%` pattern: literal `%`, `_` and `\` are escaped and
/// `*` becomes the multi-character wildcard.
#[must_use]
pub fn like_pattern(token: &str) -> String {
    let mut pattern = String::with_capacity(token.len() + 2);
    pattern.push('%');
    for ch in token.chars() {
        match ch {
            '%' | '_' | LIKE_ESCAPE => {
                pattern.push(LIKE_ESCAPE);
                pattern.push(ch);
            }
            WILDCARD => pattern.push('%'),
            _ => pattern.push(ch),
        }
    }
    pattern.push('%');
    pattern
}
