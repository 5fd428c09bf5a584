// src/testing/fake_vision.rs
// Deterministic VisionDescriber double: returns a fixed description without
// a live vision API, mirroring FakeEmbedder's shape.

use async_trait::async_trait;

use crate::embedder::EmbedderResult;
use crate::worker::VisionDescriber;

pub struct FakeVisionDescriber {
    description: String,
}

impl FakeVisionDescriber {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into() }
    }
}

impl Default for FakeVisionDescriber {
    fn default() -> Self {
        Self::new("a described image")
    }
}

#[async_trait]
impl VisionDescriber for FakeVisionDescriber {
    async fn describe(&self, _image_bytes: &[u8], _mime: &str) -> EmbedderResult<String> {
        Ok(self.description.clone())
    }
}
