#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

//! # Memory Core
//!
//! Core data model and business logic for an autonomous agent's episodic
//! memory service.
//!
//! ## Core Concepts
//!
//! - **Episodes**: timestamped records of an agent's actions, each with an
//!   importance score, a tag set, and an asynchronously computed embedding.
//! - **Embedding jobs**: the queue that drives episodes from `Pending` to
//!   `Ready` embeddings, processed by a bounded worker pool with retry and
//!   poison handling.
//! - **Facts**: structured scalars extracted from episode content by a fixed
//!   regex pipeline, answering scalar lookups without a semantic search.
//! - **Decay**: an importance/recency/access-weighted score used to preview
//!   (and, deliberately, not yet execute) pruning of low-value episodes.
//! - **Consolidation**: a nightly batch job that scores "breakthrough"
//!   episodes, traces backward chains of related episodes, boosts their
//!   salience, and emits Narrative Traces plus interleaved-replay samples.
//!
//! ## Module Organization
//!
//! - [`episode`], [`job`], [`narrative`], [`types`]: the data model.
//! - [`error`]: the crate-wide error taxonomy.
//! - [`config`]: environment-driven configuration.
//! - [`encoder`]: the [`encoder::TextEncoder`] trait and its deterministic
//!   stub implementation.
//! - [`storage`]: the [`storage::StorageBackend`] trait separating this
//!   crate's logic from any particular database.
//! - [`extraction`]: the fact-extraction regex pipeline.
//! - [`ingestion`]: episode creation.
//! - [`worker`]: the embedding worker pool.
//! - [`retrieval`]: the five read operations plus the recent-episodes cache.
//! - [`decay`]: decay scoring and pruning preview.
//! - [`consolidation`]: the nightly consolidation batch job.
//! - [`monitoring`]: the Prometheus metrics registry.

pub mod config;
pub mod consolidation;
pub mod decay;
pub mod encoder;
pub mod episode;
pub mod error;
pub mod extraction;
pub mod ingestion;
pub mod job;
pub mod monitoring;
pub mod narrative;
pub mod retrieval;
pub mod storage;
pub mod types;
pub mod worker;

pub use config::Config;
pub use encoder::{HashEncoder, TextEncoder};
pub use episode::Episode;
pub use error::{Error, Result};
pub use ingestion::{create_episode, CreateEpisodeRequest, CreateEpisodeResult};
pub use job::{EmbeddingJob, JobState};
pub use monitoring::MetricsRegistry;
pub use narrative::NarrativeTrace;
pub use retrieval::{HybridAnswer, HybridPreference, RetrievalEngine};
pub use storage::{SemanticHit, SemanticSearchParams, StorageBackend, StorageStats, WindowOrder};
pub use types::{
    AccessTracking, Embedding384, EmbeddingState, Emotional8d, Facts, FactStatus, Metadata,
    RelationshipLabel, Somatic7d, TemporalRef, EMBEDDING_DIM,
};
pub use worker::{WorkerPool, WorkerPoolConfig, WorkerPoolStats};
