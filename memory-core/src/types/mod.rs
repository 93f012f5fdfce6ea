//! Well-known types shared across the ingestion, retrieval, decay and
//! consolidation modules.

mod embedding;
mod facts;
mod metadata;

pub use embedding::{cosine_similarity, Embedding384, EmbeddingState, EMBEDDING_DIM};
pub use facts::{FactStatus, Facts};
pub use metadata::{
    AccessTracking, ConsolidationOutputs, Emotional8d, Metadata, RelationshipLabel, Somatic7d,
    TemporalRef,
};
