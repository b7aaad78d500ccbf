//! Resolving human readable tokens to entity identifiers.

use crate::error::Result;
use crate::model::{EntityId, EntityKind, ProjectId, StatusState};
use tracing::debug;

/// Outcome of resolving a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(EntityId),
    NotFound,
}

impl Lookup {
    #[must_use]
    pub const fn id(self) -> Option<EntityId> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

impl From<Option<EntityId>> for Lookup {
    fn from(id: Option<EntityId>) -> Self {
        id.map_or(Self::NotFound, Self::Found)
    }
}

/// Read-only entity lookups the filter builder depends on.
///
/// `NotFound` is a normal answer. Errors are reserved for the storage
/// itself failing.
pub trait LookupStore {
    /// Find one entity by its natural key (slug or name).
    ///
    /// `project_id` narrows project scoped kinds and is ignored for the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    fn lookup(&self, kind: EntityKind, project_id: ProjectId, key: &str) -> Result<Lookup>;

    /// Every status id flagged with the given state, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying query fails.
    fn status_ids(&self, state: StatusState) -> Result<Vec<EntityId>>;
}

/// Token resolver bound to one project.
pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    project_id: ProjectId,
}

impl<'a, S: LookupStore + ?Sized> Resolver<'a, S> {
    pub const fn new(store: &'a S, project_id: ProjectId) -> Self {
        Self { store, project_id }
    }

    #[must_use]
    pub const fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Resolve one token. Empty tokens never hit storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup store fails.
    pub fn resolve(&self, kind: EntityKind, token: &str) -> Result<Lookup> {
        if token.is_empty() {
            return Ok(Lookup::NotFound);
        }
        let lookup = self.store.lookup(kind, self.project_id, token)?;
        if lookup == Lookup::NotFound {
            debug!(kind = %kind, token, "token did not resolve, dropping it");
        }
        Ok(lookup)
    }

    /// Resolve every token, keeping distinct ids in token order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup store fails.
    pub fn resolve_all<'t, I>(&self, kind: EntityKind, tokens: I) -> Result<Vec<EntityId>>
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut ids = Vec::new();
        for token in tokens {
            if let Lookup::Found(id) = self.resolve(kind, token)? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Every status id in the given state.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup store fails.
    pub fn status_ids(&self, state: StatusState) -> Result<Vec<EntityId>> {
        self.store.status_ids(state)
    }
}
