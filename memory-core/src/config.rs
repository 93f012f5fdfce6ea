//! Environment-driven configuration, assembled once at process startup and
//! injected into the server, worker pool and CLI — never read ad hoc deeper
//! in the call stack.

use std::env;
use std::time::Duration;

/// Storage connection settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_url: String,
    pub db_auth_token: Option<String>,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            db_url: env::var("MEMORY_DB_URL").unwrap_or_else(|_| "file:memory.db".to_string()),
            db_auth_token: env::var("MEMORY_DB_AUTH_TOKEN").ok(),
        }
    }
}

/// Read-through cache sizing.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl CacheConfig {
    fn from_env() -> Self {
        Self {
            ttl: Duration::from_secs(env_u64("MEMORY_CACHE_TTL_SECS", 60)),
            max_entries: env_usize("MEMORY_CACHE_MAX_ENTRIES", 10_000),
        }
    }
}

/// Embedding worker pool tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub encoder_id: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub max_retries: u32,
    pub reaper_timeout: Duration,
}

impl WorkerConfig {
    fn from_env() -> Self {
        Self {
            encoder_id: env::var("MEMORY_ENCODER_ID").unwrap_or_else(|_| "local-hash-v1".to_string()),
            batch_size: env_usize("MEMORY_WORKER_BATCH_SIZE", 10),
            poll_interval: Duration::from_millis(env_u64("MEMORY_WORKER_POLL_MS", 500)),
            max_retries: env_u64("MEMORY_WORKER_MAX_RETRIES", 3) as u32,
            reaper_timeout: Duration::from_secs(env_u64(
                "MEMORY_WORKER_REAPER_TIMEOUT_SECS",
                60,
            )),
        }
    }
}

/// Decay/pruning model parameters, deliberately kept configurable rather
/// than frozen constants per the open question on half-life and weights.
/// `importance_weight + recency_weight + access_weight` is expected to sum
/// to `1.0`, matching the documented `0.5/0.3/0.2` split, but callers are
/// free to retune it operationally.
#[derive(Debug, Clone, Copy)]
pub struct DecayConfig {
    pub half_life_days: f64,
    pub importance_weight: f64,
    pub recency_weight: f64,
    pub access_weight: f64,
}

impl DecayConfig {
    fn from_env() -> Self {
        Self {
            half_life_days: env_f64("MEMORY_HALF_LIFE_DAYS", 30.0),
            importance_weight: env_f64("MEMORY_DECAY_IMPORTANCE_WEIGHT", 0.5),
            recency_weight: env_f64("MEMORY_DECAY_RECENCY_WEIGHT", 0.3),
            access_weight: env_f64("MEMORY_DECAY_ACCESS_WEIGHT", 0.2),
        }
    }
}

/// HTTP surface ports.
#[derive(Debug, Clone, Copy)]
pub struct ApiConfig {
    pub port: u16,
    pub metrics_port: Option<u16>,
}

impl ApiConfig {
    fn from_env() -> Self {
        let port = env_u64("MEMORY_API_PORT", 8080) as u16;
        let metrics_port = env::var("MEMORY_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok());
        Self { port, metrics_port }
    }
}

/// Top-level configuration, composed of the sub-configs above. Unknown
/// environment variables are ignored, as specified.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
    pub decay: DecayConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Build configuration from the process environment, applying documented
    /// defaults for every variable that is absent or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            storage: StorageConfig::from_env(),
            cache: CacheConfig::from_env(),
            worker: WorkerConfig::from_env(),
            decay: DecayConfig::from_env(),
            api: ApiConfig::from_env(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_absent() {
        // SAFETY: single-threaded test, no concurrent env mutation.
        unsafe {
            env::remove_var("MEMORY_CACHE_TTL_SECS");
        }
        let cache = CacheConfig::from_env();
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.max_entries, 10_000);
    }

    #[test]
    fn decay_half_life_defaults_to_thirty_days() {
        // SAFETY: single-threaded test, no concurrent env mutation.
        unsafe {
            env::remove_var("MEMORY_HALF_LIFE_DAYS");
        }
        assert!((DecayConfig::from_env().half_life_days - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_weights_default_to_the_documented_split() {
        // SAFETY: single-threaded test, no concurrent env mutation.
        unsafe {
            env::remove_var("MEMORY_DECAY_IMPORTANCE_WEIGHT");
            env::remove_var("MEMORY_DECAY_RECENCY_WEIGHT");
            env::remove_var("MEMORY_DECAY_ACCESS_WEIGHT");
        }
        let decay = DecayConfig::from_env();
        assert!((decay.importance_weight - 0.5).abs() < f64::EPSILON);
        assert!((decay.recency_weight - 0.3).abs() < f64::EPSILON);
        assert!((decay.access_weight - 0.2).abs() < f64::EPSILON);
    }
}
