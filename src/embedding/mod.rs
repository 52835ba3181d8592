//! Embedding abstraction.
//!
//! The engine never depends on a specific embedding model; callers supply an
//! [`Embedder`] and the crate ships a deterministic hash-based fallback that
//! needs no model download. Vectors from different embedders are not
//! comparable, so one embedder instance must serve both ingestion and query
//! time.

mod hashed;

pub use hashed::HashEmbedder;

use crate::Result;

/// Trait for text embedders.
///
/// Implementations should be thread-safe (`Send + Sync`) and cheap to call;
/// the retrieval engine embeds on the query hot path.
pub trait Embedder: Send + Sync {
    /// The dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Embeds a text into a vector of [`dimensions()`](Embedder::dimensions)
    /// length.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity between two vectors (0.0 for mismatched lengths or
/// zero vectors), clamped to `0.0..=1.0`.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}
