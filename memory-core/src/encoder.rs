//! The text encoder used by both the ingestion-time query path (API) and the
//! embedding worker pool must be the *same* encoder identity, per the §9
//! cross-transaction correctness requirement: mixing `embedding_version`s
//! would silently degrade recall. Implementations stamp their identity via
//! [`TextEncoder::version`] so callers can detect a mismatch.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Embedding384;

/// Produces a fixed-dimension embedding from text. An external dependency in
/// production (an ONNX/HTTP-backed model); a deterministic stub in tests.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encode `text` (already truncated by the caller) into a 384-dim vector.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Encoder`] on malformed output and
    /// [`crate::error::Error::TransientDependencyFailure`] if the encoder is
    /// momentarily unreachable.
    async fn encode(&self, text: &str) -> Result<Embedding384>;

    /// Identity of this encoder and its configuration, stamped onto every
    /// embedding it produces as `embedding_version`.
    fn version(&self) -> &str;
}

/// A deterministic, dependency-free encoder for tests and local development:
/// hashes the input with SHA-256 and expands the digest into a unit-norm
/// 384-dim vector via a seeded PRNG. Same content always yields the same
/// vector (spec §4.C idempotency requirement), and semantically similar
/// inputs do *not* cluster — this stub trades recall quality for
/// reproducibility without a model dependency.
pub struct HashEncoder {
    version: String,
}

impl HashEncoder {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new("local-hash-v1")
    }
}

#[async_trait]
impl TextEncoder for HashEncoder {
    async fn encode(&self, text: &str) -> Result<Embedding384> {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(text.as_bytes());
        let seed: [u8; 32] = digest.into();
        let mut rng = ChaCha8Rng::from_seed(seed);

        let mut values: Vec<f32> = (0..crate::types::EMBEDDING_DIM)
            .map(|_| rng.gen_range(-1.0_f32..1.0_f32))
            .collect();

        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }

        Embedding384::new(values)
    }

    fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_content_yields_same_embedding() {
        let encoder = HashEncoder::default();
        let a = encoder.encode("hello world").await.unwrap();
        let b = encoder.encode("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_content_yields_different_embedding() {
        let encoder = HashEncoder::default();
        let a = encoder.encode("hello world").await.unwrap();
        let b = encoder.encode("goodbye world").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embedding_is_unit_norm() {
        let encoder = HashEncoder::default();
        let v = encoder.encode("norm check").await.unwrap();
        let norm: f32 = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
