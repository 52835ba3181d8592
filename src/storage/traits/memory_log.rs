//! Append-only memory log trait.
//!
//! The memory log is the only durable state the engine writes on the hot
//! path, and it is strictly append-only: history is never mutated in place,
//! invalidation is a tombstone, and consolidation appends new canonical
//! records with provenance instead of deleting originals. This keeps
//! cross-session writes lock-free from the caller's perspective.

use crate::models::{MemoryId, MemoryRecord, MemoryScope};
use crate::Result;
use async_trait::async_trait;

/// Trait for append-only memory log backends.
#[async_trait]
pub trait MemoryLog: Send + Sync {
    /// Appends a record to the log.
    ///
    /// # Errors
    ///
    /// Returns an error if a record with the same ID already exists or the
    /// write fails.
    async fn append(&self, record: MemoryRecord) -> Result<()>;

    /// Retrieves a record by ID (tombstoned records are still readable).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    async fn get(&self, id: &MemoryId) -> Result<Option<MemoryRecord>>;

    /// Returns records visible to `scope` created at or after `since`,
    /// newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    async fn recent(&self, scope: &MemoryScope, since: u64, limit: usize)
        -> Result<Vec<MemoryRecord>>;

    /// Returns all non-tombstoned records visible to `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    async fn all(&self, scope: &MemoryScope) -> Result<Vec<MemoryRecord>>;

    /// Returns records whose pattern hash equals `hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    async fn by_pattern_hash(&self, hash: &str) -> Result<Vec<MemoryRecord>>;

    /// Tombstones a record, excluding it from future recall without
    /// deleting it. Returns whether the record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn invalidate(&self, id: &MemoryId) -> Result<bool>;
}
