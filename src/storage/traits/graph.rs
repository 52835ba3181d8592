//! Graph store trait for the compliance relationship graph.
//!
//! The graph layer stores typed entities (regulations, requirements,
//! controls, evidence, enforcement actions) and typed edges between them.
//! The content-ingestion pipeline writes it; from the orchestrator's
//! perspective it is read-mostly, with the Remember phase appending
//! confirmed evidence entities.

use crate::models::graph::{Entity, EntityId, RelationType, Relationship, Subgraph};
use crate::models::DomainTag;
use crate::Result;
use async_trait::async_trait;

/// Query criteria for entity lookups.
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    /// Case-insensitive substring match on the entity name.
    pub name: Option<String>,
    /// Restrict to a domain.
    pub domain: Option<DomainTag>,
    /// Restrict to an entity type.
    pub entity_type: Option<crate::models::graph::EntityType>,
    /// Maximum results.
    pub limit: usize,
}

impl EntityQuery {
    /// Creates an empty query with a default limit of 10.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            name: None,
            domain: None,
            entity_type: None,
            limit: 10,
        }
    }

    /// Sets the name filter.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the domain filter.
    #[must_use]
    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Sets the entity-type filter.
    #[must_use]
    pub const fn with_type(mut self, entity_type: crate::models::graph::EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for relationship graph backends.
///
/// # Implementor Notes
///
/// - Methods take `&self` to enable sharing via `Arc<dyn GraphStore>`;
///   use interior mutability for mutable state.
/// - `traverse` must honor the hop bound and the relation whitelist; a
///   breadth-first expansion keeps hop distances minimal.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Stores (or replaces) an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn store_entity(&self, entity: Entity) -> Result<()>;

    /// Retrieves an entity by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn entity(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// Queries entities with optional filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn find_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>>;

    /// Stores a directed relationship between two entities.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is missing or the write fails.
    async fn store_relationship(&self, relationship: Relationship) -> Result<()>;

    /// Returns all relationships touching an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn relationships_of(&self, id: &EntityId) -> Result<Vec<Relationship>>;

    /// Breadth-first traversal from `start` entities, bounded to `hops`
    /// hops, following only whitelisted relation types (in either
    /// direction).
    ///
    /// # Errors
    ///
    /// Returns an error if the traversal fails.
    async fn traverse(
        &self,
        start: &[EntityId],
        hops: usize,
        relations: &[RelationType],
    ) -> Result<Subgraph>;
}
