//! Configuration management.
//!
//! `GraphConfig::from_env` loads `.env` (via `dotenvy`) then reads the
//! environment, applying `${VAR}` expansion to string values. Validation
//! that can only be checked once all values are known (e.g. the
//! retention-days range) runs at the end of `from_env`, so a misconfigured
//! deployment fails at startup rather than on first use.

use std::borrow::Cow;
use std::env;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::storage::traits::Similarity;
use crate::{Error, Result};

/// Expands `${VAR_NAME}` references in a string using the process
/// environment. Unset variables are left as-is.
fn expand_env_vars(input: &str) -> Cow<'_, str> {
    if !input.contains("${") {
        return Cow::Borrowed(input);
    }

    let mut result = input.to_string();
    let mut start = 0;

    while let Some(var_start) = result[start..].find("${") {
        let var_start = start + var_start;
        if let Some(var_end) = result[var_start..].find('}') {
            let var_end = var_start + var_end;
            let var_name = &result[var_start + 2..var_end];
            if let Ok(value) = env::var(var_name) {
                result.replace_range(var_start..=var_end, &value);
                start = var_start + value.len();
            } else {
                start = var_end + 1;
            }
        } else {
            break;
        }
    }

    Cow::Owned(result)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).map_or_else(|_| default.to_string(), |v| expand_env_vars(&v).into_owned())
}

fn env_opt_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| expand_env_vars(&v).into_owned())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| Error::ConfigError(format!("{key} is not a valid value: {v}"))),
        Err(_) => Ok(default),
    }
}

/// Configuration for the knowledge-graph service, loaded from the environment.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// `SQLite` file path for the graph database, or `:memory:`.
    pub store_uri: String,
    /// Graph database file stem.
    pub graph_db_name: String,
    /// `SQLite` file path/directory for the job database.
    pub job_db_uri: String,
    /// Job database file stem.
    pub job_db_name: String,
    /// Name recorded for the vector index (diagnostics/logging only).
    pub vector_index_name: String,
    /// Vector dimensionality every embedding must match.
    pub vector_dimensions: usize,
    /// Similarity metric used by the vector index.
    pub similarity: Similarity,
    /// API key for the embedding provider, if semantic search is enabled.
    pub embedding_provider_api_key: Option<SecretString>,
    /// Embedding provider HTTP endpoint.
    pub embedding_provider_endpoint: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Days to retain terminal (`completed`/`failed`) jobs; must be in `[7, 30]`.
    pub embed_job_retention_days: u32,
    /// Interval between stale-lease recovery sweeps, in ms (`0` disables).
    pub embed_job_recovery_interval_ms: i64,
    /// Lease duration handed to `JobQueue::lease`, in ms.
    pub embed_job_lock_duration_ms: i64,
    /// Heartbeat interval for in-flight leases, in ms.
    pub embed_job_heartbeat_interval_ms: i64,
    /// Maximum lease attempts before a job becomes permanently failed.
    pub embed_job_max_retries: u32,
    /// Rate-limiter bucket capacity.
    pub embedding_rate_limit_tokens: u32,
    /// Rate-limiter refill interval, in ms.
    pub embedding_rate_limit_interval_ms: u64,
    /// Port for the `/health` HTTP listener.
    pub health_port: u16,
    /// `tracing-subscriber` log format: `json` or `pretty`.
    pub log_format: String,
    /// `tracing-subscriber` log level filter (e.g. `info`, `debug`).
    pub log_level: String,
    /// Port for the Prometheus metrics exporter.
    pub metrics_port: u16,
}

impl GraphConfig {
    /// Loads configuration from `.env` (if present) and the process
    /// environment, validating cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a numeric value fails to parse or
    /// `EMBED_JOB_RETENTION_DAYS` is outside `[7, 30]`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let store_uri = env_string("STORE_URI", "graph.db");
        let job_db_uri = env_opt_string("JOB_DB_URI").unwrap_or_else(|| default_job_db_uri(&store_uri));

        let similarity = match env_string("SIMILARITY", "cosine").to_lowercase().as_str() {
            "euclidean" => Similarity::Euclidean,
            _ => Similarity::Cosine,
        };

        let embed_job_retention_days: u32 = env_parsed("EMBED_JOB_RETENTION_DAYS", 0)?;
        if !(7..=30).contains(&embed_job_retention_days) {
            return Err(Error::ConfigError(format!(
                "EMBED_JOB_RETENTION_DAYS must be in [7, 30], got {embed_job_retention_days}"
            )));
        }

        Ok(Self {
            store_uri,
            graph_db_name: env_string("GRAPH_DB_NAME", "graph"),
            job_db_uri,
            job_db_name: env_string("JOB_DB_NAME", "embedding-jobs"),
            vector_index_name: env_string("VECTOR_INDEX_NAME", "entity_embeddings"),
            vector_dimensions: env_parsed("VECTOR_DIMENSIONS", 1536usize)?,
            similarity,
            embedding_provider_api_key: env_opt_string("EMBEDDING_PROVIDER_API_KEY").map(SecretString::from),
            embedding_provider_endpoint: env_string(
                "EMBEDDING_PROVIDER_ENDPOINT",
                "https://api.openai.com/v1/embeddings",
            ),
            embedding_model: env_string("EMBEDDING_MODEL", "text-embedding-3-small"),
            embed_job_retention_days,
            embed_job_recovery_interval_ms: env_parsed("EMBED_JOB_RECOVERY_INTERVAL_MS", 60_000)?,
            embed_job_lock_duration_ms: env_parsed("EMBED_JOB_LOCK_DURATION_MS", 300_000)?,
            embed_job_heartbeat_interval_ms: env_parsed("EMBED_JOB_HEARTBEAT_INTERVAL_MS", 120_000)?,
            embed_job_max_retries: env_parsed("EMBED_JOB_MAX_RETRIES", 3)?,
            embedding_rate_limit_tokens: env_parsed("EMBEDDING_RATE_LIMIT_TOKENS", 20)?,
            embedding_rate_limit_interval_ms: env_parsed("EMBEDDING_RATE_LIMIT_INTERVAL_MS", 60_000)?,
            health_port: env_parsed("HEALTH_PORT", 3001)?,
            log_format: env_string("SUBCOG_GRAPH_LOG_FORMAT", "pretty"),
            log_level: env_string("SUBCOG_GRAPH_LOG_LEVEL", "info"),
            metrics_port: env_parsed("SUBCOG_GRAPH_METRICS_PORT", 9090)?,
        })
    }

    /// Full path to the graph database file (`:memory:` passes through unchanged).
    #[must_use]
    pub fn graph_db_path(&self) -> PathBuf {
        if self.store_uri == ":memory:" {
            return PathBuf::from(":memory:");
        }
        PathBuf::from(&self.store_uri)
    }

    /// Full path to the job database file.
    #[must_use]
    pub fn job_db_path(&self) -> PathBuf {
        PathBuf::from(&self.job_db_uri).join(format!("{}.db", self.job_db_name))
    }
}

fn default_job_db_uri(store_uri: &str) -> String {
    PathBuf::from(store_uri)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| ".".to_string(), |p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_vars_leaves_plain_strings_untouched() {
        assert_eq!(expand_env_vars("plain"), Cow::Borrowed("plain"));
    }

    #[test]
    fn expand_env_vars_substitutes_known_variable() {
        // SAFETY: test-only, single-threaded access to this specific key.
        unsafe {
            env::set_var("SUBCOG_GRAPH_TEST_VAR", "expanded");
        }
        assert_eq!(expand_env_vars("prefix-${SUBCOG_GRAPH_TEST_VAR}-suffix"), "prefix-expanded-suffix");
        unsafe {
            env::remove_var("SUBCOG_GRAPH_TEST_VAR");
        }
    }

    #[test]
    fn default_job_db_uri_falls_back_to_store_dir() {
        assert_eq!(default_job_db_uri("/data/graph.db"), "/data");
        assert_eq!(default_job_db_uri("graph.db"), ".");
    }
}
