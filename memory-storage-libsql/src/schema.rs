//! Table definitions for the libSQL storage substrate.
//!
//! `temporal_refs` live authoritatively inside an episode's `metadata` JSON
//! (data-model invariant 6); `temporal_edges` mirrors them into a relational
//! table purely so [`crate::LibsqlStorage::get_related_episodes`] can use an
//! index instead of scanning every episode's JSON metadata.

pub const CREATE_EPISODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS episodes (
    episode_id TEXT PRIMARY KEY NOT NULL,
    content TEXT NOT NULL,
    importance REAL NOT NULL,
    tags TEXT NOT NULL,
    created_at TEXT NOT NULL,
    embedding_state TEXT NOT NULL,
    embedding BLOB,
    embedding_version TEXT,
    metadata TEXT NOT NULL
)
"#;

pub const CREATE_EPISODES_CREATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_episodes_created_at ON episodes(created_at DESC)
"#;

pub const CREATE_EMBEDDING_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS embedding_jobs (
    job_id TEXT PRIMARY KEY NOT NULL,
    episode_id TEXT NOT NULL REFERENCES episodes(episode_id),
    state TEXT NOT NULL,
    priority INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    enqueued_at TEXT NOT NULL,
    processed_at TEXT,
    claimed_at TEXT
)
"#;

pub const CREATE_EMBEDDING_JOBS_CLAIM_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_embedding_jobs_claim
ON embedding_jobs(state, priority DESC, enqueued_at ASC)
"#;

pub const CREATE_NARRATIVE_TRACES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS narrative_traces (
    trace_id TEXT PRIMARY KEY NOT NULL,
    source_episode_id TEXT NOT NULL,
    target_episode_id TEXT NOT NULL,
    trace_type TEXT NOT NULL,
    strength REAL NOT NULL,
    narrative_id TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_TEMPORAL_EDGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS temporal_edges (
    source_episode_id TEXT NOT NULL,
    target_episode_id TEXT NOT NULL,
    relationship TEXT NOT NULL,
    PRIMARY KEY (source_episode_id, target_episode_id, relationship)
)
"#;

pub const CREATE_TEMPORAL_EDGES_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_temporal_edges_source ON temporal_edges(source_episode_id)
"#;

/// Every statement run by [`crate::LibsqlStorage::initialize_schema`], in
/// dependency order.
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_EPISODES_TABLE,
    CREATE_EPISODES_CREATED_AT_INDEX,
    CREATE_EMBEDDING_JOBS_TABLE,
    CREATE_EMBEDDING_JOBS_CLAIM_INDEX,
    CREATE_NARRATIVE_TRACES_TABLE,
    CREATE_TEMPORAL_EDGES_TABLE,
    CREATE_TEMPORAL_EDGES_SOURCE_INDEX,
];
