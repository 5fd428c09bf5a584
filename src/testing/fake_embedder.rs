// src/testing/fake_embedder.rs
// Deterministic embedder double: hashes text into a fixed-dimension vector
// so identical text always produces an identical vector without a live API.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};

use crate::embedder::{Embedder, EmbedderResult};

pub struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vec = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            vec.push(((bits % 2000) as f32 / 1000.0) - 1.0);
        }
        vec
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn identity(&self) -> String {
        format!("fake-embedder-{}", self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
