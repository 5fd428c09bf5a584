// src/config/mod.rs
// Central configuration for the ingestion-and-consistency engine.
//
// Every component (§1.1) is constructed from a slice of this struct rather
// than reading the environment itself. Loaded once, validated once, then
// passed around as an `Arc<AppConfig>`.

pub mod attachments;
pub mod database;
pub mod embedder;
pub mod helpers;
pub mod jobs;
pub mod reconciler;
pub mod session;
pub mod vector_store;
pub mod vision;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: database::DatabaseConfig,
    pub logging: database::LoggingConfig,
    pub vector_store: vector_store::VectorStoreConfig,
    pub embedder: embedder::EmbedderConfig,
    pub session: session::SessionConfig,
    pub jobs: jobs::JobConfig,
    pub attachments: attachments::AttachmentConfig,
    pub reconciler: reconciler::ReconcilerConfig,
    pub vision: vision::VisionConfig,
}

impl AppConfig {
    /// Load configuration from the environment (optionally via a `.env`
    /// file), then validate. An invalid configuration is a fatal startup
    /// error — never a silently-clamped default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            database: database::DatabaseConfig::from_env(),
            logging: database::LoggingConfig::from_env(),
            vector_store: vector_store::VectorStoreConfig::from_env(),
            embedder: embedder::EmbedderConfig::from_env(),
            session: session::SessionConfig::from_env(),
            jobs: jobs::JobConfig::from_env(),
            attachments: attachments::AttachmentConfig::from_env(),
            reconciler: reconciler::ReconcilerConfig::from_env(),
            vision: vision::VisionConfig::from_env(),
        };

        config.validate().expect("invalid configuration");
        config
    }

    fn validate(&self) -> Result<(), String> {
        if self.jobs.backoff_base_secs > self.jobs.backoff_cap_secs {
            return Err(format!(
                "job_backoff_base ({}) must not exceed job_backoff_cap ({})",
                self.jobs.backoff_base_secs, self.jobs.backoff_cap_secs
            ));
        }
        if self.jobs.max_attempts == 0 {
            return Err("job_max_attempts must be at least 1".into());
        }
        if !(0.0..100.0).contains(&self.session.semantic_percentile) {
            return Err("session_semantic_percentile must be in [0, 100)".into());
        }
        if self.session.semantic_min_messages < 1 {
            return Err("session_semantic_min_messages must be at least 1".into());
        }
        if self.embedder.dimension == 0 {
            return Err("vector_dim must be non-zero".into());
        }
        if self.jobs.worker_concurrency == 0 {
            return Err("worker_concurrency must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        // Construct without touching the real environment or `.env`.
        let config = AppConfig {
            database: database::DatabaseConfig {
                url: "sqlite::memory:".into(),
                max_connections: 4,
            },
            logging: database::LoggingConfig { level: "info".into() },
            vector_store: vector_store::VectorStoreConfig {
                url: "http://localhost:6334".into(),
                collection: "chat_index".into(),
                timeout_secs: 10,
            },
            embedder: embedder::EmbedderConfig {
                model: "test".into(),
                dimension: 8,
                api_base: "http://localhost".into(),
                api_key: None,
                max_batch_size: 16,
                timeout_secs: 10,
            },
            session: session::SessionConfig {
                time_gap_secs: 900,
                max_tokens: 480,
                semantic_refine_threshold_messages: 20,
                semantic_percentile: 5.0,
                semantic_min_messages: 2,
                semantic_refine_enabled: true,
                window_size: 200,
            },
            jobs: jobs::JobConfig {
                max_attempts: 5,
                backoff_base_secs: 1,
                backoff_cap_secs: 600,
                visibility_timeout_secs: 300,
                worker_concurrency: 4,
                queue_backpressure_hi: 10_000,
                dedup_window_secs: 300,
            },
            attachments: attachments::AttachmentConfig {
                max_size_text: 1024,
                max_size_pdf: 1024,
                max_size_image: 1024,
                blocked_extensions: vec![".exe".into()],
                min_chunk_tokens: 32,
                fetch_timeout_secs: 30,
                vision_timeout_secs: 60,
            },
            reconciler: reconciler::ReconcilerConfig {
                interval_secs: 900,
                batch_limit_per_class: 500,
                healthy_threshold: 0.95,
            },
            vision: vision::VisionConfig {
                api_base: "http://localhost".into(),
                api_key: None,
                model: "test".into(),
            },
        };
        assert!(config.validate().is_ok());
    }
}
