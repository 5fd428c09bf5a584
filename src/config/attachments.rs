// src/config/attachments.rs
// Attachment ingestion limits (§4.7, §6)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    pub max_size_text: u64,
    pub max_size_pdf: u64,
    pub max_size_image: u64,
    pub blocked_extensions: Vec<String>,
    pub min_chunk_tokens: usize,
    pub fetch_timeout_secs: u64,
    pub vision_timeout_secs: u64,
}

impl AttachmentConfig {
    pub fn from_env() -> Self {
        Self {
            max_size_text: super::helpers::env_or_parsed("ATTACHMENT_MAX_SIZE_TEXT", 2 * 1024 * 1024),
            max_size_pdf: super::helpers::env_or_parsed("ATTACHMENT_MAX_SIZE_PDF", 20 * 1024 * 1024),
            max_size_image: super::helpers::env_or_parsed("ATTACHMENT_MAX_SIZE_IMAGE", 10 * 1024 * 1024),
            blocked_extensions: super::helpers::env_list(
                "BLOCKED_ATTACHMENT_EXTENSIONS",
                &[".exe", ".bat", ".sh", ".ps1", ".cmd"],
            ),
            min_chunk_tokens: super::helpers::env_or_parsed("ATTACHMENT_MIN_CHUNK_TOKENS", 32),
            fetch_timeout_secs: super::helpers::env_or_parsed("ATTACHMENT_FETCH_TIMEOUT_SECS", 30),
            vision_timeout_secs: super::helpers::env_or_parsed("ATTACHMENT_VISION_TIMEOUT_SECS", 60),
        }
    }

    pub fn is_blocked(&self, source_url: &str) -> bool {
        let lower = source_url.to_lowercase();
        self.blocked_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_lowercase()))
    }
}
