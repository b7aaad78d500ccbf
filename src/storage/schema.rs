//! Database schema definitions and default lookup rows.

use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the traq database.
pub const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        next_ticket_id INTEGER NOT NULL DEFAULT 1,
        CHECK (length(slug) >= 1)
    );

    -- Milestones double as versions (tickets.version_id)
    CREATE TABLE IF NOT EXISTS milestones (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        slug TEXT NOT NULL,
        display_order INTEGER NOT NULL DEFAULT 0,
        UNIQUE (project_id, slug),
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS components (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE (project_id, name),
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS statuses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        is_closed INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_statuses_is_closed ON statuses(is_closed);

    CREATE TABLE IF NOT EXISTS types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS priorities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS severities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    -- Display names are not unique; lookups take the oldest row
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);

    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticket_id INTEGER NOT NULL,
        project_id INTEGER NOT NULL,
        summary TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        user_id INTEGER,
        assigned_to_id INTEGER,
        milestone_id INTEGER,
        version_id INTEGER,
        component_id INTEGER,
        type_id INTEGER,
        status_id INTEGER,
        priority_id INTEGER,
        severity_id INTEGER,
        is_closed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (project_id, ticket_id),
        CHECK (length(summary) >= 1),
        FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_tickets_project_id ON tickets(project_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_milestone_id ON tickets(milestone_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_version_id ON tickets(version_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_status_id ON tickets(status_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_type_id ON tickets(type_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_component_id ON tickets(component_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_priority_id ON tickets(priority_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_severity_id ON tickets(severity_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_user_id ON tickets(user_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_assigned_to_id ON tickets(assigned_to_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_is_closed ON tickets(is_closed);
";

/// Statuses created by `tq init`, with their closed flag.
pub const DEFAULT_STATUSES: &[(&str, bool)] = &[
    ("New", false),
    ("Accepted", false),
    ("Started", false),
    ("Closed", true),
    ("Completed", true),
];

/// Ticket types created by `tq init`.
pub const DEFAULT_TYPES: &[&str] = &["Defect", "Feature Request", "Enhancement", "Task"];

/// Priorities created by `tq init`, highest first.
pub const DEFAULT_PRIORITIES: &[&str] = &["Highest", "High", "Normal", "Low", "Lowest"];

/// Severities created by `tq init`, most severe first.
pub const DEFAULT_SEVERITIES: &[&str] = &["Blocker", "Critical", "Major", "Normal", "Minor", "Trivial"];

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;

    Ok(())
}

/// Insert the default statuses, types, priorities and severities.
///
/// Existing rows with the same name are left alone.
///
/// # Errors
///
/// Returns an error if an insert fails.
pub fn seed_defaults(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;
    for (name, is_closed) in DEFAULT_STATUSES {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO statuses (name, is_closed) VALUES (?, ?)",
            rusqlite::params![name, is_closed],
        )?;
    }
    for (table, names) in [
        ("types", DEFAULT_TYPES),
        ("priorities", DEFAULT_PRIORITIES),
        ("severities", DEFAULT_SEVERITIES),
    ] {
        for name in names {
            inserted += conn.execute(
                &format!("INSERT OR IGNORE INTO {table} (name) VALUES (?)"),
                [name],
            )?;
        }
    }
    Ok(inserted)
}
