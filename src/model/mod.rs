//! Core data types for `traq_rust`.
//!
//! This module defines the fundamental types used throughout the application:
//! - `EntityKind` - The lookup tables a filter token can resolve against
//! - `Project` - The scope every ticket query runs in
//! - `Ticket` - A listed ticket with its referenced names joined in
//! - `NewTicket` - Insert payload with resolved identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal row identifier of any lookup entity.
pub type EntityId = i64;

/// Internal row identifier of a project.
pub type ProjectId = i64;

/// Lookup entity a human readable token can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Milestone,
    Status,
    Type,
    Component,
    Priority,
    Severity,
    User,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Milestone => "milestone",
            Self::Status => "status",
            Self::Type => "type",
            Self::Component => "component",
            Self::Priority => "priority",
            Self::Severity => "severity",
            Self::User => "user",
        }
    }

    /// Table holding rows of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Milestone => "milestones",
            Self::Status => "statuses",
            Self::Type => "types",
            Self::Component => "components",
            Self::Priority => "priorities",
            Self::Severity => "severities",
            Self::User => "users",
        }
    }

    /// Natural key column tokens are matched against.
    ///
    /// Milestones are addressed by slug, users by display name and
    /// everything else by name.
    #[must_use]
    pub const fn key_column(self) -> &'static str {
        match self {
            Self::Milestone => "slug",
            Self::Status
            | Self::Type
            | Self::Component
            | Self::Priority
            | Self::Severity
            | Self::User => "name",
        }
    }

    /// Whether rows of this kind belong to a single project.
    #[must_use]
    pub const fn is_project_scoped(self) -> bool {
        matches!(self, Self::Milestone | Self::Component)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open/closed flag carried by every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Open,
    Closed,
}

impl StatusState {
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// A project; every ticket query is scoped to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub slug: String,
}

/// A ticket as returned by listings, with referenced entity names joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Row id.
    pub id: EntityId,
    /// Per-project ticket number shown to users.
    pub ticket_id: i64,
    pub project_id: ProjectId,
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub ticket_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a ticket. References are already resolved ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTicket {
    pub summary: String,
    pub body: String,
    pub user_id: Option<EntityId>,
    pub assigned_to_id: Option<EntityId>,
    pub milestone_id: Option<EntityId>,
    pub version_id: Option<EntityId>,
    pub component_id: Option<EntityId>,
    pub type_id: Option<EntityId>,
    pub status_id: Option<EntityId>,
    pub priority_id: Option<EntityId>,
    pub severity_id: Option<EntityId>,
}

/// Open and closed ticket totals of one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    pub open: usize,
    pub closed: usize,
}
