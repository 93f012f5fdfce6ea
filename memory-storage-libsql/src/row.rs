//! Row <-> domain-type conversions shared by every query in [`crate::storage`].

use chrono::{DateTime, SecondsFormat, Utc};
use memory_core::{Embedding384, EmbeddingState, Episode, Error, Metadata, Result};
use uuid::Uuid;

/// Format a timestamp so that lexical ordering of the stored string matches
/// chronological ordering: fixed-width nanosecond precision, always UTC.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("invalid stored timestamp {raw:?}: {e}")))
}

/// Encode a 384-dim embedding as little-endian `f32` bytes.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Validation("embedding blob length not a multiple of 4".to_string()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
            f32::from_le_bytes(arr)
        })
        .collect())
}

/// The `episodes` row in column order, ready for a libSQL parameter list.
pub struct EpisodeRow {
    pub episode_id: String,
    pub content: String,
    pub importance: f64,
    pub tags: String,
    pub created_at: String,
    pub embedding_state: &'static str,
    pub embedding: Option<Vec<u8>>,
    pub embedding_version: Option<String>,
    pub metadata: String,
}

pub fn episode_to_row(episode: &Episode) -> Result<EpisodeRow> {
    let tags: Vec<&String> = episode.tags.iter().collect();
    let (embedding_state, embedding, embedding_version) = match &episode.embedding {
        EmbeddingState::Pending => ("pending", None, None),
        EmbeddingState::Ready { vector, embedding_version } => {
            ("ready", Some(encode_embedding(vector.as_slice())), Some(embedding_version.clone()))
        }
    };

    Ok(EpisodeRow {
        episode_id: episode.episode_id.to_string(),
        content: episode.content.clone(),
        importance: episode.importance,
        tags: serde_json::to_string(&tags)?,
        created_at: format_timestamp(episode.created_at),
        embedding_state,
        embedding,
        embedding_version,
        metadata: serde_json::to_string(&episode.metadata)?,
    })
}

/// Reconstruct an [`Episode`] from the 9 `episodes` columns in table-definition
/// order: episode_id, content, importance, tags, created_at, embedding_state,
/// embedding, embedding_version, metadata.
pub fn row_to_episode(row: &libsql::Row) -> Result<Episode> {
    let episode_id: String = row.get(0).map_err(storage_err)?;
    let content: String = row.get(1).map_err(storage_err)?;
    let importance: f64 = row.get(2).map_err(storage_err)?;
    let tags_json: String = row.get(3).map_err(storage_err)?;
    let created_at: String = row.get(4).map_err(storage_err)?;
    let embedding_state: String = row.get(5).map_err(storage_err)?;
    let embedding_blob: Option<Vec<u8>> = row.get(6).ok();
    let embedding_version: Option<String> = row.get(7).ok();
    let metadata_json: String = row.get(8).map_err(storage_err)?;

    let tags: Vec<String> = serde_json::from_str(&tags_json)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)?;

    let embedding = match embedding_state.as_str() {
        "ready" => {
            let blob = embedding_blob
                .ok_or_else(|| Error::Validation("ready episode missing embedding blob".to_string()))?;
            let version = embedding_version
                .ok_or_else(|| Error::Validation("ready episode missing embedding_version".to_string()))?;
            EmbeddingState::Ready {
                vector: Embedding384::new(decode_embedding(&blob)?)?,
                embedding_version: version,
            }
        }
        _ => EmbeddingState::Pending,
    };

    Ok(Episode {
        episode_id: Uuid::parse_str(&episode_id)
            .map_err(|e| Error::Validation(format!("invalid stored episode_id: {e}")))?,
        content,
        importance,
        tags: tags.into_iter().collect(),
        created_at: parse_timestamp(&created_at)?,
        embedding,
        metadata,
    })
}

pub fn storage_err(e: libsql::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}
