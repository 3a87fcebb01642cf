// src/config/mod.rs
// All tunables come from the environment (.env supported), with sane defaults.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct KeepsakeConfig {
    // ── Database Configuration
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Qdrant Configuration
    pub qdrant_url: String,
    pub namespace_prefix: String,
    pub qdrant_timeout_secs: u64,

    // ── Embedding Provider Configuration
    pub embedding_base_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_timeout_secs: u64,
    pub embed_max_attempts: usize,
    pub embed_backoff_ms: u64,

    // ── Retrieval Ranking Configuration
    pub recall_similarity_weight: f32,
    pub recall_importance_weight: f32,
    pub recall_recency_weight: f32,
    pub recall_half_life_hours: f32,
    pub recall_candidate_multiplier: usize,

    // ── API Defaults
    pub list_default_limit: usize,
    pub list_max_limit: usize,

    // ── Background Reconciliation
    pub backfill_interval_secs: u64,
    pub backfill_batch_size: usize,

    // ── Server Configuration
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub request_timeout_secs: u64,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Tolerate trailing comments and whitespace in .env values
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {key} = '{val}' (parse failed, using default)");
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl KeepsakeConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            database_url: env_var_or("DATABASE_URL", "sqlite:./keepsake.db".to_string()),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 10),
            qdrant_url: env_var_or("QDRANT_URL", "http://localhost:6333".to_string()),
            namespace_prefix: env_var_or("KEEPSAKE_NAMESPACE_PREFIX", "keepsake-user".to_string()),
            qdrant_timeout_secs: env_var_or("KEEPSAKE_QDRANT_TIMEOUT", 10),
            embedding_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com".to_string()),
            embedding_api_key: env_var_or("OPENAI_API_KEY", String::new()),
            embedding_model: env_var_or("KEEPSAKE_EMBED_MODEL", "text-embedding-3-small".to_string()),
            embedding_dimensions: env_var_or("KEEPSAKE_EMBED_DIM", 1536),
            embedding_timeout_secs: env_var_or("KEEPSAKE_EMBED_TIMEOUT", 30),
            embed_max_attempts: env_var_or("KEEPSAKE_EMBED_MAX_ATTEMPTS", 3),
            embed_backoff_ms: env_var_or("KEEPSAKE_EMBED_BACKOFF_MS", 500),
            recall_similarity_weight: env_var_or("KEEPSAKE_RECALL_W_SIM", 0.5),
            recall_importance_weight: env_var_or("KEEPSAKE_RECALL_W_IMP", 0.3),
            recall_recency_weight: env_var_or("KEEPSAKE_RECALL_W_REC", 0.2),
            recall_half_life_hours: env_var_or("KEEPSAKE_RECALL_HALF_LIFE_HOURS", 24.0),
            recall_candidate_multiplier: env_var_or("KEEPSAKE_RECALL_CANDIDATE_MULTIPLIER", 3),
            list_default_limit: env_var_or("KEEPSAKE_LIST_DEFAULT_LIMIT", 50),
            list_max_limit: env_var_or("KEEPSAKE_LIST_MAX_LIMIT", 200),
            backfill_interval_secs: env_var_or("KEEPSAKE_BACKFILL_INTERVAL", 300),
            backfill_batch_size: env_var_or("KEEPSAKE_BACKFILL_BATCH", 100),
            host: env_var_or("KEEPSAKE_HOST", "0.0.0.0".to_string()),
            port: env_var_or("KEEPSAKE_PORT", 3100),
            cors_origin: env_var_or("KEEPSAKE_CORS_ORIGIN", "http://localhost:3000".to_string()),
            request_timeout_secs: env_var_or("KEEPSAKE_REQUEST_TIMEOUT", 30),
            log_level: env_var_or("KEEPSAKE_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ranking weights as a (similarity, importance, recency) triple
    pub fn recall_weights(&self) -> (f32, f32, f32) {
        (
            self.recall_similarity_weight,
            self.recall_importance_weight,
            self.recall_recency_weight,
        )
    }

    /// Clamp a caller-supplied limit to the configured bounds
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.list_default_limit)
            .min(self.list_max_limit)
            .max(1)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<KeepsakeConfig> = Lazy::new(KeepsakeConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = KeepsakeConfig::from_env();

        assert!(config.embedding_dimensions > 0);
        assert!(config.recall_candidate_multiplier >= 1);
        assert!(!config.namespace_prefix.is_empty());
    }

    #[test]
    fn test_clamp_limit() {
        let config = KeepsakeConfig::from_env();

        assert_eq!(config.clamp_limit(None), config.list_default_limit);
        assert_eq!(config.clamp_limit(Some(0)), 1);
        assert_eq!(config.clamp_limit(Some(usize::MAX)), config.list_max_limit);
    }

    #[test]
    fn test_recall_weights_sum_to_one() {
        let config = KeepsakeConfig::from_env();

        let (sim, imp, rec) = config.recall_weights();
        assert!((sim + imp + rec - 1.0).abs() < 1e-5);
    }
}
