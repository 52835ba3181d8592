//! Relationship graph types for the compliance knowledge graph.
//!
//! Entities are the typed nodes the content-ingestion pipeline populates:
//!
//! | Type | Examples |
//! |------|----------|
//! | `Regulation` | "GDPR", "CCPA", "HIPAA Security Rule" |
//! | `Requirement` | "Art. 17 erasure", "data retention schedule" |
//! | `Control` | "encryption at rest", "quarterly access review" |
//! | `Evidence` | "retention policy v3", "audit log export" |
//! | `EnforcementAction` | "DPC v. X fine", "consent decree 2023-41" |
//!
//! Relations carry generic dependency/derivation/satisfaction semantics;
//! hybrid retrieval traverses only a whitelisted subset of them.

use super::DomainTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique entity ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ent_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the entity ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Type of entity in the compliance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A regulation or framework.
    Regulation,
    /// An individual requirement within a regulation.
    Requirement,
    /// A control implementing one or more requirements.
    Control,
    /// Evidence that a control is operating.
    Evidence,
    /// A historical enforcement action (fine, decree, audit finding).
    EnforcementAction,
}

impl EntityType {
    /// Returns the entity type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regulation => "regulation",
            Self::Requirement => "requirement",
            Self::Control => "control",
            Self::Evidence => "evidence",
            Self::EnforcementAction => "enforcement_action",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed node in the compliance graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Canonical display name.
    pub name: String,
    /// Domain/framework this entity belongs to.
    pub domain: Option<DomainTag>,
    /// Free-form attributes (amounts, deadlines, citations).
    ///
    /// `BTreeMap` keeps serialization deterministic for hashing and tests.
    pub attributes: BTreeMap<String, String>,
    /// Recorded violation count (requirements, from enforcement history).
    pub violation_count: u32,
    /// Recorded pass rate (controls, 0.0 to 1.0).
    pub pass_rate: Option<f32>,
}

impl Entity {
    /// Creates a new entity with a generated ID.
    #[must_use]
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate(),
            entity_type,
            name: name.into(),
            domain: None,
            attributes: BTreeMap::new(),
            violation_count: 0,
            pass_rate: None,
        }
    }

    /// Sets the entity ID.
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    /// Sets the domain tag.
    #[must_use]
    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the violation count.
    #[must_use]
    pub const fn with_violation_count(mut self, count: u32) -> Self {
        self.violation_count = count;
        self
    }

    /// Sets the pass rate.
    #[must_use]
    pub const fn with_pass_rate(mut self, rate: f32) -> Self {
        self.pass_rate = Some(rate);
        self
    }
}

/// Type of relation between graph entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// A regulation requires a requirement (dependency).
    Requires,
    /// An entity references another (derivation).
    References,
    /// A control implements a requirement (satisfaction).
    Implements,
    /// Evidence satisfies a control.
    Satisfies,
    /// An entity supersedes another version.
    Supersedes,
    /// An enforcement action records a violation of a requirement.
    Violates,
    /// An entity cites an authority.
    Cites,
}

impl RelationType {
    /// Returns the relation type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::References => "references",
            Self::Implements => "implements",
            Self::Satisfies => "satisfies",
            Self::Supersedes => "supersedes",
            Self::Violates => "violates",
            Self::Cites => "cites",
        }
    }

    /// The default traversal whitelist for hybrid retrieval.
    #[must_use]
    pub const fn retrieval_whitelist() -> [Self; 3] {
        [Self::Requires, Self::References, Self::Implements]
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, directed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Source entity.
    pub from: EntityId,
    /// Target entity.
    pub to: EntityId,
    /// Relation type.
    pub relation: RelationType,
    /// Edge weight (0.0 to 1.0), used in relatedness scoring.
    pub weight: f32,
}

impl Relationship {
    /// Creates a new relationship with full weight.
    #[must_use]
    pub const fn new(from: EntityId, to: EntityId, relation: RelationType) -> Self {
        Self {
            from,
            to,
            relation,
            weight: 1.0,
        }
    }

    /// Sets the edge weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// Result of a bounded graph traversal: the entities reached and the edges
/// connecting them, with the hop distance of each entity from the seeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subgraph {
    /// Entities reached by the traversal (including the seeds).
    pub entities: Vec<Entity>,
    /// Relationships between the reached entities.
    pub relationships: Vec<Relationship>,
    /// Hop distance from the nearest seed, parallel to `entities`.
    pub hops: Vec<usize>,
}

impl Subgraph {
    /// Returns `true` when the traversal reached nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the degree of an entity within this subgraph.
    #[must_use]
    pub fn degree(&self, id: &EntityId) -> usize {
        self.relationships
            .iter()
            .filter(|r| &r.from == id || &r.to == id)
            .count()
    }

    /// Normalized degree centrality of an entity within this subgraph
    /// (0.0 to 1.0 relative to the highest-degree entity).
    #[must_use]
    pub fn centrality(&self, id: &EntityId) -> f32 {
        let max_degree = self
            .entities
            .iter()
            .map(|e| self.degree(&e.id))
            .max()
            .unwrap_or(0);
        if max_degree == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.degree(id) as f32 / max_degree as f32;
        ratio
    }

    /// Looks up an entity by ID.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }
}
