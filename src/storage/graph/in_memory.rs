//! In-memory graph store (reference backend).

use crate::models::graph::{Entity, EntityId, RelationType, Relationship, Subgraph};
use crate::storage::traits::{EntityQuery, GraphStore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

#[derive(Default)]
struct GraphState {
    entities: HashMap<EntityId, Entity>,
    relationships: Vec<Relationship>,
}

/// Adjacency-scan graph store.
///
/// Traversal is breadth-first so hop distances are minimal; edges are
/// followed in both directions since relatedness is symmetric for
/// retrieval purposes.
#[derive(Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    /// Creates an empty graph store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, GraphState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, GraphState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn store_entity(&self, entity: Entity) -> Result<()> {
        self.write_guard().entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn entity(&self, id: &EntityId) -> Result<Option<Entity>> {
        Ok(self.read_guard().entities.get(id).cloned())
    }

    async fn find_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
        let guard = self.read_guard();
        let needle = query.name.as_deref().map(str::to_lowercase);
        let mut matches: Vec<Entity> = guard
            .entities
            .values()
            .filter(|e| {
                needle
                    .as_deref()
                    .is_none_or(|n| e.name.to_lowercase().contains(n))
            })
            .filter(|e| query.domain.as_ref().is_none_or(|d| e.domain.as_ref() == Some(d)))
            .filter(|e| query.entity_type.is_none_or(|t| e.entity_type == t))
            .cloned()
            .collect();
        drop(guard);
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(query.limit.max(1));
        Ok(matches)
    }

    async fn store_relationship(&self, relationship: Relationship) -> Result<()> {
        let mut guard = self.write_guard();
        if !guard.entities.contains_key(&relationship.from) {
            return Err(Error::OperationFailed {
                operation: "store_relationship".to_string(),
                cause: format!("unknown source entity {}", relationship.from),
            });
        }
        if !guard.entities.contains_key(&relationship.to) {
            return Err(Error::OperationFailed {
                operation: "store_relationship".to_string(),
                cause: format!("unknown target entity {}", relationship.to),
            });
        }
        guard.relationships.push(relationship);
        Ok(())
    }

    async fn relationships_of(&self, id: &EntityId) -> Result<Vec<Relationship>> {
        Ok(self
            .read_guard()
            .relationships
            .iter()
            .filter(|r| &r.from == id || &r.to == id)
            .cloned()
            .collect())
    }

    async fn traverse(
        &self,
        start: &[EntityId],
        hops: usize,
        relations: &[RelationType],
    ) -> Result<Subgraph> {
        let guard = self.read_guard();

        let mut visited: HashMap<EntityId, usize> = HashMap::new();
        let mut frontier: VecDeque<(EntityId, usize)> = start
            .iter()
            .filter(|id| guard.entities.contains_key(*id))
            .map(|id| (id.clone(), 0))
            .collect();
        for (id, depth) in &frontier {
            visited.insert(id.clone(), *depth);
        }

        let mut edges: Vec<Relationship> = Vec::new();
        let mut edge_seen: HashSet<(EntityId, EntityId)> = HashSet::new();

        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= hops {
                continue;
            }
            for rel in guard
                .relationships
                .iter()
                .filter(|r| relations.contains(&r.relation))
                .filter(|r| r.from == current || r.to == current)
            {
                let neighbor = if rel.from == current {
                    rel.to.clone()
                } else {
                    rel.from.clone()
                };
                let key = (rel.from.clone(), rel.to.clone());
                if edge_seen.insert(key) {
                    edges.push(rel.clone());
                }
                if !visited.contains_key(&neighbor) {
                    visited.insert(neighbor.clone(), depth + 1);
                    frontier.push_back((neighbor, depth + 1));
                }
            }
        }

        let mut ordered: Vec<(EntityId, usize)> = visited.into_iter().collect();
        ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut entities = Vec::with_capacity(ordered.len());
        let mut hop_list = Vec::with_capacity(ordered.len());
        for (id, hop) in ordered {
            if let Some(entity) = guard.entities.get(&id) {
                entities.push(entity.clone());
                hop_list.push(hop);
            }
        }

        Ok(Subgraph {
            entities,
            relationships: edges,
            hops: hop_list,
        })
    }
}
