//! YAML fixture import.
//!
//! An import file names every reference by its human key (status name,
//! milestone slug, username) and is applied in a single transaction:
//! any unknown reference rolls the whole import back.

use crate::error::{Result, TraqError};
use crate::model::{EntityId, EntityKind, NewTicket, ProjectId, StatusState};
use crate::storage::SqliteStorage;
use crate::storage::sqlite::{create_project_in, create_ticket_in, lookup_in};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Top-level import document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportFile {
    pub statuses: Vec<StatusSpec>,
    pub types: Vec<String>,
    pub priorities: Vec<String>,
    pub severities: Vec<String>,
    pub users: Vec<UserSpec>,
    pub projects: Vec<ProjectSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusSpec {
    pub name: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserSpec {
    pub username: String,
    /// Display name; defaults to the username.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSpec {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub milestones: Vec<MilestoneSpec>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub tickets: Vec<TicketSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MilestoneSpec {
    pub name: String,
    /// URL key; defaults to the name.
    #[serde(default)]
    pub slug: Option<String>,
}

/// One ticket. `owner` and `assigned_to` are usernames.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketSpec {
    pub summary: String,
    pub body: String,
    pub owner: Option<String>,
    pub assigned_to: Option<String>,
    pub milestone: Option<String>,
    pub version: Option<String>,
    pub component: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
}

/// Counts of rows created by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub lookups: usize,
    pub users: usize,
    pub projects: usize,
    pub milestones: usize,
    pub components: usize,
    pub tickets: usize,
}

impl ImportFile {
    /// Parse an import document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse an import file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }
}

impl SqliteStorage {
    /// Apply an import document in one transaction.
    ///
    /// Lookup rows, users, projects, milestones and components that already
    /// exist are reused. Tickets are always appended.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown reference, or a database
    /// error; nothing is written in either case.
    pub fn import(&mut self, file: &ImportFile) -> Result<ImportSummary> {
        let summary = self.transaction(|tx| import_in(tx, file))?;
        info!(
            projects = summary.projects,
            tickets = summary.tickets,
            "import complete"
        );
        Ok(summary)
    }
}

fn import_in(conn: &Connection, file: &ImportFile) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for status in &file.statuses {
        let state = if status.closed {
            StatusState::Closed
        } else {
            StatusState::Open
        };
        summary.lookups += conn.execute(
            "INSERT OR IGNORE INTO statuses (name, is_closed) VALUES (?, ?)",
            params![status.name, state.is_closed()],
        )?;
    }
    for (kind, names) in [
        (EntityKind::Type, &file.types),
        (EntityKind::Priority, &file.priorities),
        (EntityKind::Severity, &file.severities),
    ] {
        for name in names {
            summary.lookups += conn.execute(
                &format!("INSERT OR IGNORE INTO {} (name) VALUES (?)", kind.table()),
                [name],
            )?;
        }
    }

    for user in &file.users {
        let name = user.name.as_deref().unwrap_or(&user.username);
        summary.users += conn.execute(
            "INSERT OR IGNORE INTO users (username, name) VALUES (?, ?)",
            params![user.username, name],
        )?;
    }

    for project in &file.projects {
        import_project(conn, project, &mut summary)?;
    }

    Ok(summary)
}

fn import_project(conn: &Connection, spec: &ProjectSpec, summary: &mut ImportSummary) -> Result<()> {
    let existing: Option<ProjectId> = conn
        .query_row(
            "SELECT id FROM projects WHERE slug = ?",
            [&spec.slug],
            |row| row.get(0),
        )
        .optional()?;
    let project_id = match existing {
        Some(id) => id,
        None => {
            summary.projects += 1;
            create_project_in(conn, &spec.name, &spec.slug)?.id
        }
    };
    debug!(slug = %spec.slug, project_id, "importing project");

    for milestone in &spec.milestones {
        let slug = milestone.slug.as_deref().unwrap_or(&milestone.name);
        summary.milestones += conn.execute(
            "INSERT OR IGNORE INTO milestones (project_id, name, slug, display_order)
             VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM milestones WHERE project_id = ?1))",
            params![project_id, milestone.name, slug],
        )?;
    }
    for component in &spec.components {
        summary.components += conn.execute(
            "INSERT OR IGNORE INTO components (project_id, name) VALUES (?, ?)",
            params![project_id, component],
        )?;
    }

    for (index, ticket) in spec.tickets.iter().enumerate() {
        let field = |name: &str| format!("projects.{}.tickets[{index}].{name}", spec.slug);
        let reference = |kind: EntityKind, name: &str, key: Option<&String>| {
            resolve_reference(conn, kind, project_id, key, || field(name))
        };

        let new_ticket = NewTicket {
            summary: ticket.summary.clone(),
            body: ticket.body.clone(),
            user_id: resolve_username(conn, ticket.owner.as_ref(), || field("owner"))?,
            assigned_to_id: resolve_username(conn, ticket.assigned_to.as_ref(), || {
                field("assigned_to")
            })?,
            milestone_id: reference(EntityKind::Milestone, "milestone", ticket.milestone.as_ref())?,
            version_id: reference(EntityKind::Milestone, "version", ticket.version.as_ref())?,
            component_id: reference(EntityKind::Component, "component", ticket.component.as_ref())?,
            type_id: reference(EntityKind::Type, "type", ticket.ticket_type.as_ref())?,
            status_id: reference(EntityKind::Status, "status", ticket.status.as_ref())?,
            priority_id: reference(EntityKind::Priority, "priority", ticket.priority.as_ref())?,
            severity_id: reference(EntityKind::Severity, "severity", ticket.severity.as_ref())?,
        };
        create_ticket_in(conn, project_id, &new_ticket)?;
        summary.tickets += 1;
    }

    Ok(())
}

fn resolve_reference(
    conn: &Connection,
    kind: EntityKind,
    project_id: ProjectId,
    key: Option<&String>,
    field: impl FnOnce() -> String,
) -> Result<Option<EntityId>> {
    let Some(key) = key else {
        return Ok(None);
    };
    lookup_in(conn, kind, project_id, key)?
        .id()
        .map(Some)
        .ok_or_else(|| unknown_reference(field(), kind.as_str(), key))
}

fn resolve_username(
    conn: &Connection,
    username: Option<&String>,
    field: impl FnOnce() -> String,
) -> Result<Option<EntityId>> {
    let Some(username) = username else {
        return Ok(None);
    };
    conn.query_row(
        "SELECT id FROM users WHERE username = ?",
        [username],
        |row| row.get(0),
    )
    .optional()?
    .map(Some)
    .ok_or_else(|| unknown_reference(field(), "user", username))
}

fn unknown_reference(field: String, kind: &str, key: &str) -> TraqError {
    TraqError::Validation {
        field,
        reason: format!("unknown {kind} '{key}'"),
    }
}
