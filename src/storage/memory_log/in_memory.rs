//! In-memory append-only memory log (reference backend).

use crate::models::{MemoryId, MemoryRecord, MemoryScope};
use crate::storage::traits::MemoryLog;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

struct LogState {
    records: Vec<MemoryRecord>,
    tombstones: HashSet<MemoryId>,
}

/// Append-only in-memory log.
///
/// Records are stored in arrival order; tombstones live in a side set so
/// history is never rewritten.
pub struct InMemoryMemoryLog {
    state: RwLock<LogState>,
}

impl InMemoryMemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState {
                records: Vec::new(),
                tombstones: HashSet::new(),
            }),
        }
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, LogState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, LogState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for InMemoryMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryLog for InMemoryMemoryLog {
    async fn append(&self, record: MemoryRecord) -> Result<()> {
        let mut guard = self.write_guard();
        if guard.records.iter().any(|r| r.id == record.id) {
            return Err(Error::OperationFailed {
                operation: "memory_append".to_string(),
                cause: format!("duplicate memory id {}", record.id),
            });
        }
        guard.records.push(record);
        Ok(())
    }

    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>> {
        Ok(self.read_guard().records.iter().find(|r| &r.id == id).cloned())
    }

    async fn recent(
        &self,
        scope: &MemoryScope,
        since: u64,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let guard = self.read_guard();
        let mut matches: Vec<MemoryRecord> = guard
            .records
            .iter()
            .filter(|r| !guard.tombstones.contains(&r.id))
            .filter(|r| r.created_at >= since)
            .filter(|r| r.scope.visible_to(scope) || r.scope == *scope)
            .cloned()
            .collect();
        drop(guard);
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn all(&self, scope: &MemoryScope) -> Result<Vec<MemoryRecord>> {
        let guard = self.read_guard();
        Ok(guard
            .records
            .iter()
            .filter(|r| !guard.tombstones.contains(&r.id))
            .filter(|r| r.scope.visible_to(scope) || r.scope == *scope)
            .cloned()
            .collect())
    }

    async fn by_pattern_hash(&self, hash: &str) -> Result<Vec<MemoryRecord>> {
        let guard = self.read_guard();
        Ok(guard
            .records
            .iter()
            .filter(|r| !guard.tombstones.contains(&r.id))
            .filter(|r| r.pattern_hash.as_deref() == Some(hash))
            .cloned()
            .collect())
    }

    async fn invalidate(&self, id: &MemoryId) -> Result<bool> {
        let mut guard = self.write_guard();
        // Flag the record itself so point lookups see the tombstone too;
        // the side set keeps the list-query filters cheap.
        let Some(record) = guard.records.iter_mut().find(|r| &r.id == id) else {
            return Ok(false);
        };
        record.invalidated = true;
        guard.tombstones.insert(id.clone());
        Ok(true)
    }
}
