//! Tiered memory manager.
//!
//! Sits on top of the append-only [`MemoryLog`] and gives the engine a
//! recall/commit surface over four tiers: episodic (bounded retention),
//! semantic (permanent unless invalidated), procedural (confidence decays
//! without reinforcement) and preference.
//!
//! Scoring is lazy: records carry a base importance, and the manager
//! derives the effective score at read time from recency decay plus an
//! access-frequency overlay. Access never lowers a score, so importance is
//! monotonically non-decreasing under use and only falls through the decay
//! schedule.

use crate::config::MemoryConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{MemoryId, MemoryKind, MemoryRecord, MemoryScope};
use crate::storage::traits::MemoryLog;
use crate::{current_timestamp, Result};
use lru::LruCache;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const SECONDS_PER_DAY: f32 = 86_400.0;
const ACCESS_OVERLAY_CAPACITY: usize = 4096;

/// A recalled record with its blended relevance score.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// The recalled record.
    pub record: MemoryRecord,
    /// Blended recency/similarity/importance score (0.0 to 1.0).
    pub score: f32,
}

/// Per-record access statistics kept outside the append-only log.
#[derive(Debug, Clone, Copy, Default)]
struct AccessStats {
    count: u32,
    last_accessed: u64,
}

/// Manager over the tiered memory log.
pub struct MemoryManager {
    log: Arc<dyn MemoryLog>,
    embedder: Arc<dyn Embedder>,
    config: MemoryConfig,
    // Access tracking is an in-process overlay so recall stays a read-only
    // operation against the log.
    access: Mutex<LruCache<MemoryId, AccessStats>>,
}

impl MemoryManager {
    /// Creates a manager over the given log.
    ///
    /// # Panics
    ///
    /// Never panics; the overlay capacity is a non-zero constant.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new(log: Arc<dyn MemoryLog>, embedder: Arc<dyn Embedder>, config: MemoryConfig) -> Self {
        #[allow(clippy::unwrap_used)]
        let capacity = NonZeroUsize::new(ACCESS_OVERLAY_CAPACITY).unwrap();
        Self {
            log,
            embedder,
            config,
            access: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Commits a record: embeds it, fingerprints procedural patterns, and
    /// appends it to the log.
    ///
    /// Semantic records that duplicate an existing one (cosine similarity at
    /// or above the dedup threshold) are not appended as-is; instead a
    /// consolidated canonical record is appended with provenance links and
    /// the duplicate peer is tombstoned. Returns the ID the content now
    /// lives under.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the log write fails.
    pub async fn commit(&self, mut record: MemoryRecord) -> Result<MemoryId> {
        if record.embedding.is_none() {
            record.embedding = Some(self.embedder.embed(&record.content)?);
        }
        if record.kind == MemoryKind::Procedural && record.pattern_hash.is_none() {
            record.pattern_hash = Some(pattern_hash(&record.content));
        }

        if record.kind == MemoryKind::Semantic {
            if let Some(canonical_id) = self.consolidate_duplicate(&record).await? {
                metrics::counter!("memory_consolidations_total").increment(1);
                return Ok(canonical_id);
            }
        }

        let id = record.id.clone();
        let kind = record.kind;
        self.log.append(record).await?;
        metrics::counter!("memory_commits_total", "kind" => kind.as_str()).increment(1);
        tracing::debug!(memory_id = %id, kind = %kind, "memory committed");
        Ok(id)
    }

    /// Recalls the most relevant records for a query, newest-and-closest
    /// first, bounded by `limit`.
    ///
    /// Candidates come from four lists merged by ID: records inside the
    /// recency window, embedding neighbours of the query, records related to
    /// those neighbours, and procedural records matching the query's pattern
    /// fingerprint. Episodic records past their retention window never
    /// surface. Each returned record gets an access bump in the overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or a log scan fails.
    pub async fn recall(
        &self,
        query: &str,
        scope: &MemoryScope,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let now = current_timestamp();
        let query_embedding = self.embedder.embed(query)?;

        let mut candidates: Vec<MemoryRecord> = Vec::new();
        let mut seen: HashSet<MemoryId> = HashSet::new();

        let since = now.saturating_sub(self.config.recency_window_secs);
        for record in self.log.recent(scope, since, limit.max(1) * 4).await? {
            if seen.insert(record.id.clone()) {
                candidates.push(record);
            }
        }

        let all = self.log.all(scope).await?;
        let mut related_ids: Vec<MemoryId> = Vec::new();
        for record in &all {
            let similar = record
                .embedding
                .as_deref()
                .is_some_and(|e| cosine_similarity(e, &query_embedding) > 0.3);
            if similar {
                related_ids.extend(record.related.iter().cloned());
                if seen.insert(record.id.clone()) {
                    candidates.push(record.clone());
                }
            }
        }

        // Provenance links of the similarity hits.
        for id in related_ids {
            if seen.contains(&id) {
                continue;
            }
            if let Some(record) = self.log.get(&id).await? {
                if !record.invalidated && record.scope.visible_to(scope) {
                    seen.insert(record.id.clone());
                    candidates.push(record);
                }
            }
        }

        for record in self.log.by_pattern_hash(&pattern_hash(query)).await? {
            if record.scope.visible_to(scope) && seen.insert(record.id.clone()) {
                candidates.push(record);
            }
        }

        let mut scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .filter(|r| !r.invalidated && !self.is_expired(r, now))
            .map(|record| {
                let score = self.blend_score(&record, &query_embedding, now);
                ScoredMemory { record, score }
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        for memory in &scored {
            self.record_access(&memory.record.id, now);
        }
        metrics::histogram!("memory_recall_results").record({
            #[allow(clippy::cast_precision_loss)]
            let n = scored.len() as f64;
            n
        });
        Ok(scored)
    }

    /// Effective importance of a record right now: half-life decay since
    /// last access, raised by the access-frequency overlay, never above 1.0.
    #[must_use]
    pub fn effective_importance(&self, record: &MemoryRecord, now: u64) -> f32 {
        let stats = self.access_stats(&record.id);
        let last = stats.last_accessed.max(record.last_accessed);
        #[allow(clippy::cast_precision_loss)]
        let idle_days = now.saturating_sub(last) as f32 / SECONDS_PER_DAY;
        let decayed = record.importance * 0.5_f32.powf(idle_days / self.config.decay_half_life_days);
        #[allow(clippy::cast_precision_loss)]
        let boost = self.config.access_boost * stats.count as f32;
        (decayed + boost).clamp(0.0, 1.0)
    }

    /// Effective confidence of a procedural record: linear decay per idle
    /// day, floored at zero.
    #[must_use]
    pub fn effective_confidence(&self, record: &MemoryRecord, now: u64) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let idle_days = now.saturating_sub(record.last_accessed) as f32 / SECONDS_PER_DAY;
        (record.confidence - self.config.confidence_decay_per_day * idle_days).clamp(0.0, 1.0)
    }

    /// Reinforces (or weakens) the procedural pattern matching `content`.
    ///
    /// The log is append-only, so reinforcement supersedes: the latest
    /// record for the pattern is tombstoned and a new version with the
    /// adjusted confidence and a provenance link is appended. Returns the
    /// new record's ID, or `None` when no live record matches the pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if a log operation fails.
    pub async fn reinforce(&self, content: &str, success: bool) -> Result<Option<MemoryId>> {
        let hash = pattern_hash(content);
        let mut matches = self.log.by_pattern_hash(&hash).await?;
        matches.retain(|r| !r.invalidated);
        matches.sort_by_key(|r| r.created_at);
        let Some(latest) = matches.pop() else {
            return Ok(None);
        };

        let now = current_timestamp();
        let current = self.effective_confidence(&latest, now);
        let adjusted = if success {
            (current + 0.1).clamp(0.0, 1.0)
        } else {
            (current - 0.15).clamp(0.0, 1.0)
        };

        let mut superseding = MemoryRecord::new(latest.kind, latest.scope.clone(), &latest.content)
            .with_importance(latest.importance)
            .with_confidence(adjusted)
            .with_related(vec![latest.id.clone()]);
        superseding.embedding = latest.embedding.clone();
        superseding.pattern_hash = Some(hash);
        let id = superseding.id.clone();

        self.log.append(superseding).await?;
        self.log.invalidate(&latest.id).await?;
        tracing::debug!(memory_id = %id, success, "procedural pattern reinforced");
        Ok(Some(id))
    }

    /// Tombstones episodic records past the retention window. Returns how
    /// many were evicted. Retention is enforced lazily at recall time too,
    /// so calling this is housekeeping, not correctness.
    ///
    /// # Errors
    ///
    /// Returns an error if a log operation fails.
    pub async fn evict_expired(&self, scope: &MemoryScope) -> Result<usize> {
        let now = current_timestamp();
        let mut evicted = 0;
        for record in self.log.all(scope).await? {
            if self.is_expired(&record, now) && self.log.invalidate(&record.id).await? {
                evicted += 1;
            }
        }
        if evicted > 0 {
            metrics::counter!("memory_evictions_total").increment(evicted as u64);
            tracing::info!(evicted, "expired episodic memories evicted");
        }
        Ok(evicted)
    }

    /// Batch consolidation sweep over live semantic records in a scope.
    ///
    /// Commit-time dedup catches duplicates as they arrive; this pass mops
    /// up pairs that accumulated anyway, such as records written straight to
    /// the log or under an earlier similarity threshold. Each near-duplicate
    /// pair merges into one canonical record with provenance links to both
    /// originals, which are tombstoned. Returns how many merges happened.
    ///
    /// # Errors
    ///
    /// Returns an error if a log operation fails.
    pub async fn consolidate(&self, scope: &MemoryScope) -> Result<usize> {
        let mut live: Vec<MemoryRecord> = self
            .log
            .all(scope)
            .await?
            .into_iter()
            .filter(|r| r.kind == MemoryKind::Semantic && !r.invalidated)
            .collect();
        live.sort_by_key(|r| r.created_at);

        let mut merged = 0;
        let mut consumed: HashSet<MemoryId> = HashSet::new();
        for i in 0..live.len() {
            if consumed.contains(&live[i].id) {
                continue;
            }
            for j in (i + 1)..live.len() {
                if consumed.contains(&live[j].id) {
                    continue;
                }
                let close = match (live[i].embedding.as_deref(), live[j].embedding.as_deref()) {
                    (Some(a), Some(b)) => {
                        cosine_similarity(a, b) >= self.config.dedup_similarity_threshold
                    }
                    _ => false,
                };
                if !close {
                    continue;
                }

                let (older, newer) = (&live[i], &live[j]);
                let mut canonical =
                    MemoryRecord::new(MemoryKind::Semantic, newer.scope.clone(), &newer.content)
                        .with_importance(older.importance.max(newer.importance))
                        .with_confidence(older.confidence.max(newer.confidence))
                        .with_related(vec![older.id.clone(), newer.id.clone()]);
                canonical.embedding = newer.embedding.clone();
                let canonical_id = canonical.id.clone();

                self.log.append(canonical).await?;
                self.log.invalidate(&older.id).await?;
                self.log.invalidate(&newer.id).await?;
                consumed.insert(older.id.clone());
                consumed.insert(newer.id.clone());
                merged += 1;
                tracing::debug!(
                    canonical = %canonical_id,
                    first = %older.id,
                    second = %newer.id,
                    "semantic duplicates consolidated",
                );
                break;
            }
        }
        if merged > 0 {
            metrics::counter!("memory_consolidations_total").increment(merged as u64);
            tracing::info!(merged, "memory consolidation sweep merged duplicates");
        }
        Ok(merged)
    }

    /// Explicitly invalidates a record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log write fails.
    pub async fn invalidate(&self, id: &MemoryId) -> Result<bool> {
        self.log.invalidate(id).await
    }

    fn is_expired(&self, record: &MemoryRecord, now: u64) -> bool {
        record.kind == MemoryKind::Episodic
            && now.saturating_sub(record.created_at) > self.config.episodic_retention_secs
    }

    /// Looks for a live semantic duplicate of `record`; when found, appends
    /// a consolidated canonical carrying both provenance links and
    /// tombstones the existing peer.
    async fn consolidate_duplicate(&self, record: &MemoryRecord) -> Result<Option<MemoryId>> {
        let Some(embedding) = record.embedding.as_deref() else {
            return Ok(None);
        };
        let peers = self.log.all(&record.scope).await?;
        let duplicate = peers.into_iter().find(|peer| {
            peer.kind == MemoryKind::Semantic
                && peer
                    .embedding
                    .as_deref()
                    .is_some_and(|e| {
                        cosine_similarity(e, embedding) >= self.config.dedup_similarity_threshold
                    })
        });
        let Some(peer) = duplicate else {
            return Ok(None);
        };

        let mut canonical = MemoryRecord::new(
            MemoryKind::Semantic,
            record.scope.clone(),
            &record.content,
        )
        .with_importance(record.importance.max(peer.importance))
        .with_confidence(record.confidence.max(peer.confidence))
        .with_related(vec![peer.id.clone(), record.id.clone()]);
        canonical.embedding = record.embedding.clone();
        let id = canonical.id.clone();

        self.log.append(record.clone()).await?;
        self.log.append(canonical).await?;
        self.log.invalidate(&record.id).await?;
        self.log.invalidate(&peer.id).await?;
        tracing::debug!(canonical = %id, duplicate = %peer.id, "semantic duplicate consolidated");
        Ok(Some(id))
    }

    fn blend_score(&self, record: &MemoryRecord, query_embedding: &[f32], now: u64) -> f32 {
        let similarity = record
            .embedding
            .as_deref()
            .map_or(0.0, |e| cosine_similarity(e, query_embedding));
        #[allow(clippy::cast_precision_loss)]
        let age_secs = now.saturating_sub(record.created_at) as f32;
        let recency = 1.0 / (1.0 + age_secs / SECONDS_PER_DAY);
        let importance = self.effective_importance(record, now);

        match record.kind {
            MemoryKind::Episodic => {
                let w = self.config.episodic_recency_weight;
                w * recency + (1.0 - w) * similarity
            }
            MemoryKind::Semantic => {
                let w = self.config.semantic_similarity_weight;
                w * similarity + (1.0 - w) * importance
            }
            MemoryKind::Procedural => {
                let confidence = self.effective_confidence(record, now);
                0.5 * similarity + 0.5 * confidence
            }
            MemoryKind::Preference => 0.5 * similarity + 0.5 * importance,
        }
        .clamp(0.0, 1.0)
    }

    fn access_stats(&self, id: &MemoryId) -> AccessStats {
        self.access
            .lock()
            .map(|mut guard| guard.get(id).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn record_access(&self, id: &MemoryId, now: u64) {
        if let Ok(mut guard) = self.access.lock() {
            let stats = guard.get_or_insert_mut(id.clone(), AccessStats::default);
            stats.count = stats.count.saturating_add(1);
            stats.last_accessed = now;
        }
    }
}

/// Function words carrying no pattern signal.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "are", "was", "were", "with", "from", "that",
        "this", "have", "has", "had", "not", "but", "its", "all", "any",
        "per", "via", "into", "onto", "out", "our", "their",
    ]
    .into_iter()
    .collect()
});

/// Stable fingerprint for pattern matching: SHA-256 over the sorted set of
/// significant lowercase tokens, so wording order and filler words do not
/// matter.
#[must_use]
pub fn pattern_hash(content: &str) -> String {
    let mut tokens: Vec<String> = content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(t.as_str()))
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    let mut hasher = Sha256::new();
    for token in &tokens {
        hasher.update(token.as_bytes());
        hasher.update(b"\x1f");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::storage::InMemoryMemoryLog;

    fn manager() -> MemoryManager {
        MemoryManager::new(
            Arc::new(InMemoryMemoryLog::new()),
            Arc::new(HashEmbedder::new()),
            MemoryConfig::default(),
        )
    }

    #[test]
    fn test_pattern_hash_ignores_order_and_case() {
        let a = pattern_hash("Deadline missed for DPIA filing");
        let b = pattern_hash("dpia filing deadline missed");
        assert_eq!(a, b);
        assert_ne!(a, pattern_hash("unrelated pattern"));
    }

    #[test]
    fn test_pattern_hash_ignores_function_words() {
        let a = pattern_hash("the deadline was missed for the DPIA filing");
        let b = pattern_hash("deadline missed, DPIA filing");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_commit_and_recall_round_trip() {
        let manager = manager();
        let id = manager
            .commit(MemoryRecord::new(
                MemoryKind::Episodic,
                MemoryScope::Global,
                "session handled a GDPR retention question",
            ))
            .await
            .unwrap();

        let recalled = manager
            .recall("GDPR retention question", &MemoryScope::Global, 5)
            .await
            .unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].record.id, id);
        assert!(recalled[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_scope_isolation_in_recall() {
        let manager = manager();
        manager
            .commit(MemoryRecord::new(
                MemoryKind::Semantic,
                MemoryScope::User("alice".to_string()),
                "alice prefers strict interpretations",
            ))
            .await
            .unwrap();

        let other = manager
            .recall(
                "strict interpretations",
                &MemoryScope::User("bob".to_string()),
                5,
            )
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_expired_episodic_never_surfaces() {
        let log = Arc::new(InMemoryMemoryLog::new());
        let manager = MemoryManager::new(
            Arc::clone(&log) as Arc<dyn MemoryLog>,
            Arc::new(HashEmbedder::new()),
            MemoryConfig::default(),
        );

        let mut stale = MemoryRecord::new(
            MemoryKind::Episodic,
            MemoryScope::Global,
            "ancient retention incident",
        );
        stale.created_at = 1; // far past the retention window
        stale.last_accessed = 1;
        log.append(stale).await.unwrap();

        let recalled = manager
            .recall("retention incident", &MemoryScope::Global, 5)
            .await
            .unwrap();
        assert!(recalled.is_empty());

        let evicted = manager.evict_expired(&MemoryScope::Global).await.unwrap();
        assert_eq!(evicted, 1);
    }

    #[tokio::test]
    async fn test_access_raises_effective_importance() {
        let manager = manager();
        let record = MemoryRecord::new(
            MemoryKind::Semantic,
            MemoryScope::Global,
            "controllers must keep processing records",
        );
        manager.commit(record.clone()).await.unwrap();

        let now = current_timestamp();
        let before = manager.effective_importance(&record, now);
        for _ in 0..3 {
            manager
                .recall("processing records", &MemoryScope::Global, 5)
                .await
                .unwrap();
        }
        let after = manager.effective_importance(&record, now);
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_semantic_duplicates_consolidate() {
        let log = Arc::new(InMemoryMemoryLog::new());
        let manager = MemoryManager::new(
            Arc::clone(&log) as Arc<dyn MemoryLog>,
            Arc::new(HashEmbedder::new()),
            MemoryConfig::default(),
        );

        let first = manager
            .commit(MemoryRecord::new(
                MemoryKind::Semantic,
                MemoryScope::Global,
                "breach notification is due within 72 hours",
            ))
            .await
            .unwrap();
        // Identical content embeds identically, so it crosses the threshold.
        let canonical = manager
            .commit(MemoryRecord::new(
                MemoryKind::Semantic,
                MemoryScope::Global,
                "breach notification is due within 72 hours",
            ))
            .await
            .unwrap();
        assert_ne!(first, canonical);

        let record = log.get(&canonical).await.unwrap().unwrap();
        assert!(record.related.contains(&first));
        // Originals survive as tombstones, never deleted.
        assert!(log.get(&first).await.unwrap().unwrap().invalidated);
    }

    #[tokio::test]
    async fn test_recall_never_resurfaces_invalidated_links() {
        let manager = manager();
        let stale = manager
            .commit(MemoryRecord::new(
                MemoryKind::Semantic,
                MemoryScope::Global,
                "breach notification window is 24 hours",
            ))
            .await
            .unwrap();
        assert!(manager.invalidate(&stale).await.unwrap());

        // The live record keeps a provenance link to the tombstoned one.
        let current = manager
            .commit(
                MemoryRecord::new(
                    MemoryKind::Semantic,
                    MemoryScope::Global,
                    "breach notification window is 72 hours",
                )
                .with_related(vec![stale.clone()]),
            )
            .await
            .unwrap();

        let recalled = manager
            .recall("breach notification window", &MemoryScope::Global, 5)
            .await
            .unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].record.id, current);
    }

    #[tokio::test]
    async fn test_consolidate_sweeps_accumulated_duplicates() {
        let log = Arc::new(InMemoryMemoryLog::new());
        let embedder = Arc::new(HashEmbedder::new());
        let manager = MemoryManager::new(
            Arc::clone(&log) as Arc<dyn MemoryLog>,
            Arc::clone(&embedder) as Arc<dyn Embedder>,
            MemoryConfig::default(),
        );

        // Written straight to the log, so commit-time dedup never saw them.
        for _ in 0..2 {
            let mut record = MemoryRecord::new(
                MemoryKind::Semantic,
                MemoryScope::Global,
                "records of processing must be kept current",
            );
            record.embedding = Some(embedder.embed(&record.content).unwrap());
            log.append(record).await.unwrap();
        }

        let merged = manager.consolidate(&MemoryScope::Global).await.unwrap();
        assert_eq!(merged, 1);

        let live = log.all(&MemoryScope::Global).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].related.len(), 2);

        // Nothing left for a second pass.
        assert_eq!(manager.consolidate(&MemoryScope::Global).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reinforce_supersedes_with_provenance() {
        let log = Arc::new(InMemoryMemoryLog::new());
        let manager = MemoryManager::new(
            Arc::clone(&log) as Arc<dyn MemoryLog>,
            Arc::new(HashEmbedder::new()),
            MemoryConfig::default(),
        );

        let original = manager
            .commit(
                MemoryRecord::new(
                    MemoryKind::Procedural,
                    MemoryScope::Global,
                    "escalate monetary penalties above threshold",
                )
                .with_confidence(0.5),
            )
            .await
            .unwrap();

        let reinforced = manager
            .reinforce("escalate monetary penalties above threshold", true)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(original, reinforced);

        let record = log.get(&reinforced).await.unwrap().unwrap();
        assert!(record.confidence > 0.5);
        assert!(record.related.contains(&original));
        assert!(log.get(&original).await.unwrap().unwrap().invalidated);

        assert!(manager
            .reinforce("no such pattern anywhere", true)
            .await
            .unwrap()
            .is_none());
    }
}
