//! Deterministic hash-based embedder (no-model fallback).

use super::Embedder;
use crate::Result;
use sha2::{Digest, Sha256};

/// Deterministic bag-of-words embedder.
///
/// Each lowercase token is hashed with SHA-256 and accumulated into a fixed
/// number of buckets, then the vector is L2-normalized. Quality is far below
/// a learned model, but the output is stable across runs and platforms,
/// which is what the reference backends and the test suites need.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Default vector dimensionality.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Creates an embedder with the default dimensionality.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }

    /// Creates an embedder with a custom dimensionality.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket_of(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = usize::from(digest[0]) << 8 | usize::from(digest[1]);
        // Second pair of digest bytes picks the sign, spreading tokens
        // across both half-spaces so unrelated texts decorrelate.
        let sign = if digest[2] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket % self.dimensions.max(1), sign)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let (bucket, sign) = self.bucket_of(token);
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("data retention under GDPR").unwrap();
        let b = embedder.embed("data retention under GDPR").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let embedder = HashEmbedder::new();
        let base = embedder.embed("data retention obligations gdpr").unwrap();
        let near = embedder.embed("gdpr data retention schedule").unwrap();
        let far = embedder.embed("kubernetes pod scheduling latency").unwrap();
        assert!(cosine_similarity(&base, &near) > cosine_similarity(&base, &far));
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("some text to embed here").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text() {
        let embedder = HashEmbedder::new();
        let v = embedder.embed("").unwrap();
        assert_eq!(v.len(), HashEmbedder::DEFAULT_DIMENSIONS);
        assert!(v.iter().all(|x| x.abs() < f32::EPSILON));
    }
}
