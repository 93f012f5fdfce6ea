use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed dimensionality of every stored and query embedding.
pub const EMBEDDING_DIM: usize = 384;

/// A validated 384-dimension embedding vector.
///
/// Constructing one outside this module always goes through [`Embedding384::new`],
/// which rejects the wrong dimensionality — invariant 3 in the data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding384(Vec<f32>);

impl Embedding384 {
    /// Validate and wrap a vector as a 384-dim embedding.
    ///
    /// # Errors
    /// Returns [`Error::Encoder`] if `values.len() != EMBEDDING_DIM`.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.len() != EMBEDDING_DIM {
            return Err(Error::Encoder(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                values.len()
            )));
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    /// Cosine similarity against another embedding of the same dimension.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Embedding384) -> f32 {
        cosine_similarity(&self.0, &other.0)
    }
}

/// Cosine similarity between two equal-length vectors, clamped to `[-1, 1]`.
/// Returns `0.0` for a zero-magnitude vector rather than dividing by zero.
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
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// An episode's embedding state: either waiting on the worker pool, or
/// present with the identity of the encoder that produced it.
///
/// This is the sum-type re-architecture of an `Option<Vec<f32>>`: the queue
/// state is the single source of truth for the transition (invariant 4/5),
/// and matching on this type forces callers to handle both cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EmbeddingState {
    Pending,
    Ready {
        vector: Embedding384,
        embedding_version: String,
    },
}

impl EmbeddingState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, EmbeddingState::Ready { .. })
    }

    #[must_use]
    pub fn vector(&self) -> Option<&Embedding384> {
        match self {
            EmbeddingState::Ready { vector, .. } => Some(vector),
            EmbeddingState::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_dimension() {
        assert!(Embedding384::new(vec![0.0; 10]).is_err());
        assert!(Embedding384::new(vec![0.0; EMBEDDING_DIM]).is_ok());
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
