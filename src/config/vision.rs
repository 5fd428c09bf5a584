// src/config/vision.rs
// External vision collaborator used to describe image attachments (§4.7, §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl VisionConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: super::helpers::env_or("VISION_API_BASE", "https://api.openai.com/v1"),
            api_key: std::env::var("VISION_API_KEY").ok(),
            model: super::helpers::env_or("VISION_MODEL", "gpt-4o-mini"),
        }
    }
}
