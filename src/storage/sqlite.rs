//! `SQLite` storage implementation.

use crate::error::{Result, TraqError};
use crate::filter::query::{TICKET_COLUMNS, TICKET_FROM};
use crate::filter::{Lookup, LookupStore, TicketQuery};
use crate::model::{
    EntityId, EntityKind, NewTicket, Project, ProjectId, StatusState, Ticket, TicketCounts,
};
use crate::storage::schema::{apply_schema, seed_defaults};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a new connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a new connection with an optional busy timeout (ms).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        }
        apply_schema(&conn)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside an immediate transaction, committing on success.
    ///
    /// # Errors
    ///
    /// Returns any error from `f` or from the transaction itself; the
    /// transaction is rolled back on error.
    pub fn transaction<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Insert the default statuses, types, priorities and severities.
    ///
    /// # Errors
    ///
    /// Returns an error if an insert fails.
    pub fn seed_defaults(&mut self) -> Result<usize> {
        let inserted = self.transaction(|tx| Ok(seed_defaults(tx)?))?;
        debug!(inserted, "seeded default lookup rows");
        Ok(inserted)
    }

    // ========================================================================
    // LOOKUP ENTITIES
    // ========================================================================

    /// Create a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug is already taken or the insert fails.
    pub fn create_project(&mut self, name: &str, slug: &str) -> Result<Project> {
        create_project_in(&self.conn, name, slug)
    }

    /// Find a project by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn project_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT id, name, slug FROM projects WHERE slug = ?",
                [slug],
                |row| {
                    Ok(Project {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(project)
    }

    /// Find a project by slug, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` if no project has this slug.
    pub fn require_project(&self, slug: &str) -> Result<Project> {
        self.project_by_slug(slug)?
            .ok_or_else(|| TraqError::ProjectNotFound {
                slug: slug.to_string(),
            })
    }

    /// Create a milestone (also usable as a version) in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug is already used in this project.
    pub fn create_milestone(
        &mut self,
        project_id: ProjectId,
        name: &str,
        slug: &str,
    ) -> Result<EntityId> {
        create_milestone_in(&self.conn, project_id, name, slug)
    }

    /// Create a component in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already used in this project.
    pub fn create_component(&mut self, project_id: ProjectId, name: &str) -> Result<EntityId> {
        create_component_in(&self.conn, project_id, name)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken.
    pub fn create_user(&mut self, username: &str, name: &str) -> Result<EntityId> {
        create_user_in(&self.conn, username, name)
    }

    /// Create a status.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn create_status(&mut self, name: &str, state: StatusState) -> Result<EntityId> {
        create_status_in(&self.conn, name, state)
    }

    /// Create a ticket type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn create_type(&mut self, name: &str) -> Result<EntityId> {
        create_named_in(&self.conn, EntityKind::Type, name)
    }

    /// Create a priority.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn create_priority(&mut self, name: &str) -> Result<EntityId> {
        create_named_in(&self.conn, EntityKind::Priority, name)
    }

    /// Create a severity.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn create_severity(&mut self, name: &str) -> Result<EntityId> {
        create_named_in(&self.conn, EntityKind::Severity, name)
    }

    // ========================================================================
    // TICKETS
    // ========================================================================

    /// Create a ticket, assigning the project's next ticket number.
    ///
    /// # Errors
    ///
    /// Returns an error if the summary is empty or the insert fails.
    pub fn create_ticket(&mut self, project_id: ProjectId, ticket: &NewTicket) -> Result<i64> {
        self.transaction(|tx| create_ticket_in(tx, project_id, ticket))
    }

    /// Execute a ticket query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>> {
        let (sql, params) = query.select_sql();
        trace!(%sql, params = params.len(), "listing tickets");

        let mut stmt = self.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(params_from_iter(params.iter()), ticket_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tickets)
    }

    /// Count tickets matching a query, ignoring pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_tickets(&self, query: &TicketQuery) -> Result<usize> {
        let (sql, params) = query.count_sql();
        trace!(%sql, params = params.len(), "counting tickets");
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Open and closed ticket totals of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn ticket_counts(&self, project_id: ProjectId) -> Result<TicketCounts> {
        let (open, closed): (i64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(is_closed = 0), 0), COALESCE(SUM(is_closed = 1), 0)
             FROM tickets WHERE project_id = ?",
            [project_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TicketCounts {
            open: usize::try_from(open).unwrap_or(0),
            closed: usize::try_from(closed).unwrap_or(0),
        })
    }
}

impl LookupStore for SqliteStorage {
    fn lookup(&self, kind: EntityKind, project_id: ProjectId, key: &str) -> Result<Lookup> {
        lookup_in(&self.conn, kind, project_id, key)
    }

    fn status_ids(&self, state: StatusState) -> Result<Vec<EntityId>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM statuses WHERE is_closed = ? ORDER BY id")?;
        let ids = stmt
            .query_map([state.is_closed()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<EntityId>, _>>()?;
        Ok(ids)
    }
}

// ============================================================================
// CONNECTION-LEVEL HELPERS (shared with import)
// ============================================================================

pub(crate) fn lookup_in(
    conn: &Connection,
    kind: EntityKind,
    project_id: ProjectId,
    key: &str,
) -> Result<Lookup> {
    let sql = if kind.is_project_scoped() {
        format!(
            "SELECT id FROM {} WHERE {} = ? AND project_id = ? ORDER BY id LIMIT 1",
            kind.table(),
            kind.key_column()
        )
    } else {
        format!(
            "SELECT id FROM {} WHERE {} = ? ORDER BY id LIMIT 1",
            kind.table(),
            kind.key_column()
        )
    };

    let mut stmt = conn.prepare_cached(&sql)?;
    let id: Option<EntityId> = if kind.is_project_scoped() {
        stmt.query_row(params![key, project_id], |row| row.get(0))
            .optional()?
    } else {
        stmt.query_row([key], |row| row.get(0)).optional()?
    };
    Ok(Lookup::from(id))
}

pub(crate) fn create_project_in(conn: &Connection, name: &str, slug: &str) -> Result<Project> {
    if slug.trim().is_empty() {
        return Err(TraqError::validation("slug", "cannot be empty"));
    }
    conn.execute(
        "INSERT INTO projects (name, slug) VALUES (?, ?)",
        params![name, slug],
    )?;
    Ok(Project {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        slug: slug.to_string(),
    })
}

pub(crate) fn create_milestone_in(
    conn: &Connection,
    project_id: ProjectId,
    name: &str,
    slug: &str,
) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO milestones (project_id, name, slug, display_order)
         VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM milestones WHERE project_id = ?1))",
        params![project_id, name, slug],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn create_component_in(
    conn: &Connection,
    project_id: ProjectId,
    name: &str,
) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO components (project_id, name) VALUES (?, ?)",
        params![project_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn create_user_in(conn: &Connection, username: &str, name: &str) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO users (username, name) VALUES (?, ?)",
        params![username, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn create_status_in(
    conn: &Connection,
    name: &str,
    state: StatusState,
) -> Result<EntityId> {
    conn.execute(
        "INSERT INTO statuses (name, is_closed) VALUES (?, ?)",
        params![name, state.is_closed()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert into one of the name-only tables (types, priorities, severities).
pub(crate) fn create_named_in(conn: &Connection, kind: EntityKind, name: &str) -> Result<EntityId> {
    match kind {
        EntityKind::Type | EntityKind::Priority | EntityKind::Severity => {}
        other => {
            return Err(TraqError::validation(
                other.as_str(),
                "not a name-only lookup table",
            ));
        }
    }
    conn.execute(
        &format!("INSERT INTO {} (name) VALUES (?)", kind.table()),
        [name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn create_ticket_in(
    conn: &Connection,
    project_id: ProjectId,
    ticket: &NewTicket,
) -> Result<i64> {
    if ticket.summary.trim().is_empty() {
        return Err(TraqError::validation("summary", "cannot be empty"));
    }

    let ticket_id: i64 = conn
        .query_row(
            "SELECT next_ticket_id FROM projects WHERE id = ?",
            [project_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| TraqError::ProjectNotFound {
            slug: format!("#{project_id}"),
        })?;

    let is_closed: bool = match ticket.status_id {
        Some(status_id) => conn
            .query_row(
                "SELECT is_closed FROM statuses WHERE id = ?",
                [status_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(false),
        None => false,
    };

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO tickets (
            ticket_id, project_id, summary, body, user_id, assigned_to_id,
            milestone_id, version_id, component_id, type_id, status_id,
            priority_id, severity_id, is_closed, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            ticket_id,
            project_id,
            ticket.summary,
            ticket.body,
            ticket.user_id,
            ticket.assigned_to_id,
            ticket.milestone_id,
            ticket.version_id,
            ticket.component_id,
            ticket.type_id,
            ticket.status_id,
            ticket.priority_id,
            ticket.severity_id,
            is_closed,
            now,
            now,
        ],
    )?;
    conn.execute(
        "UPDATE projects SET next_ticket_id = next_ticket_id + 1 WHERE id = ?",
        [project_id],
    )?;

    Ok(ticket_id)
}

fn ticket_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;
    Ok(Ticket {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        project_id: row.get(2)?,
        summary: row.get(3)?,
        body: row.get(4)?,
        owner: row.get(5)?,
        assigned_to: row.get(6)?,
        milestone: row.get(7)?,
        version: row.get(8)?,
        component: row.get(9)?,
        ticket_type: row.get(10)?,
        status: row.get(11)?,
        priority: row.get(12)?,
        severity: row.get(13)?,
        is_closed: row.get(14)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Utc.from_utc_datetime(&naive);
    }

    Utc::now()
}

#[cfg(test)]
impl SqliteStorage {
    /// Execute raw SQL for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL execution fails.
    pub fn execute_test_sql(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage_with_project() -> (SqliteStorage, Project) {
        let mut storage = SqliteStorage::open_memory().expect("open");
        storage.seed_defaults().expect("seed");
        let project = storage.create_project("Traq", "traq").expect("project");
        (storage, project)
    }

    fn status(storage: &SqliteStorage, name: &str) -> EntityId {
        storage
            .lookup(EntityKind::Status, 0, name)
            .expect("lookup")
            .id()
            .expect("status")
    }

    #[test]
    fn test_open_memory() {
        assert!(SqliteStorage::open_memory().is_ok());
    }

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("traq.db");
        let storage = SqliteStorage::open(&path).expect("open");
        drop(storage);
        assert!(path.exists());
    }

    #[test]
    fn test_open_nonexistent_parent_fails() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("missing").join("traq.db");
        assert!(SqliteStorage::open(&path).is_err());
    }

    #[test]
    fn test_project_by_slug() {
        let (storage, project) = storage_with_project();
        assert_eq!(storage.project_by_slug("traq").unwrap(), Some(project));
        assert_eq!(storage.project_by_slug("nope").unwrap(), None);
        assert!(matches!(
            storage.require_project("nope"),
            Err(TraqError::ProjectNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_project_slug_fails() {
        let (mut storage, _) = storage_with_project();
        assert!(matches!(
            storage.create_project("Again", "traq"),
            Err(TraqError::Database(_))
        ));
    }

    #[test]
    fn test_ticket_numbers_are_per_project() {
        let (mut storage, project) = storage_with_project();
        let other = storage.create_project("Other", "other").unwrap();
        let ticket = NewTicket {
            summary: "First".to_string(),
            ..Default::default()
        };
        assert_eq!(storage.create_ticket(project.id, &ticket).unwrap(), 1);
        assert_eq!(storage.create_ticket(project.id, &ticket).unwrap(), 2);
        assert_eq!(storage.create_ticket(other.id, &ticket).unwrap(), 1);
    }

    #[test]
    fn test_create_ticket_rejects_empty_summary() {
        let (mut storage, project) = storage_with_project();
        let ticket = NewTicket {
            summary: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            storage.create_ticket(project.id, &ticket),
            Err(TraqError::Validation { .. })
        ));
    }

    #[test]
    fn test_closed_flag_follows_status() {
        let (mut storage, project) = storage_with_project();
        let closed = status(&storage, "Closed");
        let open = status(&storage, "New");
        for (summary, status_id) in [("a", open), ("b", closed), ("c", closed)] {
            storage
                .create_ticket(
                    project.id,
                    &NewTicket {
                        summary: summary.to_string(),
                        status_id: Some(status_id),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        assert_eq!(
            storage.ticket_counts(project.id).unwrap(),
            TicketCounts { open: 1, closed: 2 }
        );
    }

    #[test]
    fn test_ticket_counts_empty_project() {
        let (storage, project) = storage_with_project();
        assert_eq!(
            storage.ticket_counts(project.id).unwrap(),
            TicketCounts::default()
        );
    }

    #[test]
    fn test_list_tickets_joins_names() {
        let (mut storage, project) = storage_with_project();
        let alice = storage.create_user("alice", "Alice").unwrap();
        let milestone = storage.create_milestone(project.id, "One", "1.0").unwrap();
        let ticket_type = storage
            .lookup(EntityKind::Type, project.id, "Defect")
            .unwrap()
            .id();
        storage
            .create_ticket(
                project.id,
                &NewTicket {
                    summary: "Crash".to_string(),
                    user_id: Some(alice),
                    milestone_id: Some(milestone),
                    type_id: ticket_type,
                    ..Default::default()
                },
            )
            .unwrap();

        let tickets = storage
            .list_tickets(&TicketQuery::for_project(project.id))
            .unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].owner.as_deref(), Some("Alice"));
        assert_eq!(tickets[0].milestone.as_deref(), Some("1.0"));
        assert_eq!(tickets[0].ticket_type.as_deref(), Some("Defect"));
        assert_eq!(tickets[0].assigned_to, None);
    }

    #[test]
    fn test_user_lookup_takes_oldest_of_duplicate_names() {
        let (mut storage, project) = storage_with_project();
        let first = storage.create_user("jack", "Jack").unwrap();
        storage.create_user("jack2", "Jack").unwrap();
        assert_eq!(
            storage.lookup(EntityKind::User, project.id, "Jack").unwrap(),
            Lookup::Found(first)
        );
    }

    #[test]
    fn test_created_lookups_resolve() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let project = storage.create_project("Traq", "traq").unwrap();
        let other = storage.create_project("Other", "other").unwrap();

        let component = storage.create_component(project.id, "Core").unwrap();
        let wontfix = storage.create_status("Won't fix", StatusState::Closed).unwrap();
        let chore = storage.create_type("Chore").unwrap();
        let urgent = storage.create_priority("Urgent").unwrap();
        let cosmetic = storage.create_severity("Cosmetic").unwrap();

        let found = |kind, project_id, key| storage.lookup(kind, project_id, key).unwrap();
        assert_eq!(found(EntityKind::Component, project.id, "Core"), Lookup::Found(component));
        assert_eq!(found(EntityKind::Component, other.id, "Core"), Lookup::NotFound);
        assert_eq!(found(EntityKind::Status, other.id, "Won't fix"), Lookup::Found(wontfix));
        assert_eq!(found(EntityKind::Type, project.id, "Chore"), Lookup::Found(chore));
        assert_eq!(found(EntityKind::Priority, project.id, "Urgent"), Lookup::Found(urgent));
        assert_eq!(found(EntityKind::Severity, project.id, "Cosmetic"), Lookup::Found(cosmetic));
        assert_eq!(storage.status_ids(StatusState::Closed).unwrap(), vec![wontfix]);
    }

    #[test]
    fn test_create_named_rejects_other_kinds() {
        let (storage, _) = storage_with_project();
        assert!(create_named_in(&storage.conn, EntityKind::User, "x").is_err());
    }

    #[test]
    fn test_storage_failure_propagates_from_lookup() {
        let (storage, project) = storage_with_project();
        storage.execute_test_sql("DROP TABLE types").unwrap();
        assert!(matches!(
            storage.lookup(EntityKind::Type, project.id, "Defect"),
            Err(TraqError::Database(_))
        ));
    }

    #[test]
    fn test_parse_datetime_formats() {
        let rfc = parse_datetime("2025-01-01T00:00:00+00:00");
        let naive = parse_datetime("2025-01-01 00:00:00");
        assert_eq!(rfc, naive);
    }
}
