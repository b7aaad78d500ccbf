#![allow(dead_code)]

use traq_rust::filter::LookupStore;
use traq_rust::model::{EntityId, EntityKind, Project};
use traq_rust::storage::{ImportFile, SqliteStorage};

/// Two projects sharing global lookups; `traq` holds the interesting tickets.
///
/// | # | summary                | type            | status    | priority | milestone | version | component | owner | assignee |
/// |---|------------------------|-----------------|-----------|----------|-----------|---------|-----------|-------|----------|
/// | 1 | Crash on save          | Defect          | New       | High     | 1.0       |         | Core      | Alice | Bob      |
/// | 2 | Add dark mode          | Feature Request | Accepted  | Normal   | 1.1       |         | UI        | Bob   |          |
/// | 3 | Save dialog 100% width | Defect          | Closed    | Low      | 1.0       | 1.0     | UI        | Alice | Alice    |
/// | 4 | Refactor storage       | Task            | Completed | Normal   |           |         | Core      | Bob   | Bob      |
/// | 5 | Slow startup           | Enhancement     | Started   | High     | 2.0       |         |           | Alice |          |
pub const TRACKER_YAML: &str = r"
users:
  - username: alice
    name: Alice
  - username: bob
    name: Bob
projects:
  - name: Traq
    slug: traq
    milestones:
      - name: First release
        slug: '1.0'
      - name: Point release
        slug: '1.1'
      - name: Second release
        slug: '2.0'
    components: [Core, UI]
    tickets:
      - summary: Crash on save
        body: stack trace attached
        type: Defect
        status: New
        priority: High
        severity: Critical
        milestone: '1.0'
        component: Core
        owner: alice
        assigned_to: bob
      - summary: Add dark mode
        body: users want a darker theme
        type: Feature Request
        status: Accepted
        priority: Normal
        milestone: '1.1'
        component: UI
        owner: bob
      - summary: Save dialog 100% width
        body: layout_bug in the dialog
        type: Defect
        status: Closed
        priority: Low
        milestone: '1.0'
        version: '1.0'
        component: UI
        owner: alice
        assigned_to: alice
      - summary: Refactor storage
        type: Task
        status: Completed
        priority: Normal
        component: Core
        owner: bob
        assigned_to: bob
      - summary: Slow startup
        body: crash reported once at boot
        type: Enhancement
        status: Started
        priority: High
        milestone: '2.0'
        owner: alice
  - name: Other
    slug: other
    milestones:
      - name: Other first
        slug: '1.0'
    tickets:
      - summary: Crash elsewhere
        status: New
        milestone: '1.0'
";

pub struct Tracker {
    pub storage: SqliteStorage,
    pub project: Project,
    pub other: Project,
}

impl Tracker {
    pub fn new() -> Self {
        let mut storage = super::test_db();
        let file = ImportFile::from_yaml_str(TRACKER_YAML).expect("parse fixture");
        storage.import(&file).expect("import fixture");
        let project = storage.require_project("traq").expect("traq project");
        let other = storage.require_project("other").expect("other project");
        Self {
            storage,
            project,
            other,
        }
    }

    pub fn id(&self, kind: EntityKind, key: &str) -> EntityId {
        self.storage
            .lookup(kind, self.project.id, key)
            .expect("lookup")
            .id()
            .unwrap_or_else(|| panic!("{kind} '{key}' missing from fixture"))
    }
}
