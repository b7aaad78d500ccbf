//! The fixed set of filterable ticket attributes.

use crate::filter::condition::Column;
use crate::filter::strategy::Strategy;
use crate::model::EntityKind;
use serde::{Serialize, Serializer};
use std::fmt;

/// A recognized filter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterKind {
    Milestone,
    Version,
    Status,
    Type,
    Component,
    Priority,
    Severity,
    Owner,
    AssignedTo,
    Summary,
    Description,
    Search,
}

impl FilterKind {
    pub const ALL: [Self; 12] = [
        Self::Milestone,
        Self::Version,
        Self::Status,
        Self::Type,
        Self::Component,
        Self::Priority,
        Self::Severity,
        Self::Owner,
        Self::AssignedTo,
        Self::Summary,
        Self::Description,
        Self::Search,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Milestone => "milestone",
            Self::Version => "version",
            Self::Status => "status",
            Self::Type => "type",
            Self::Component => "component",
            Self::Priority => "priority",
            Self::Severity => "severity",
            Self::Owner => "owner",
            Self::AssignedTo => "assigned_to",
            Self::Summary => "summary",
            Self::Description => "description",
            Self::Search => "search",
        }
    }

    /// Look up a filter by name. Unknown names yield `None` and are ignored
    /// by the query builder.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Strategy that turns this filter's tokens into conditions.
    #[must_use]
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::Milestone => Strategy::Identifiers {
                entity: EntityKind::Milestone,
                column: Column::MilestoneId,
            },
            Self::Version => Strategy::Identifiers {
                entity: EntityKind::Milestone,
                column: Column::VersionId,
            },
            Self::Status => Strategy::Status,
            Self::Type => Strategy::Identifiers {
                entity: EntityKind::Type,
                column: Column::TypeId,
            },
            Self::Component => Strategy::Identifiers {
                entity: EntityKind::Component,
                column: Column::ComponentId,
            },
            Self::Priority => Strategy::Identifiers {
                entity: EntityKind::Priority,
                column: Column::PriorityId,
            },
            Self::Severity => Strategy::Identifiers {
                entity: EntityKind::Severity,
                column: Column::SeverityId,
            },
            Self::Owner => Strategy::Identifiers {
                entity: EntityKind::User,
                column: Column::UserId,
            },
            Self::AssignedTo => Strategy::Identifiers {
                entity: EntityKind::User,
                column: Column::AssignedToId,
            },
            Self::Summary => Strategy::Text {
                column: Column::Summary,
            },
            Self::Description => Strategy::Text {
                column: Column::Body,
            },
            Self::Search => Strategy::Search,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FilterKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
