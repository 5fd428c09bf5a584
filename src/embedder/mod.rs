// src/embedder/mod.rs
// Embedder (§4.4): turns canonical session/chunk text into vectors.

pub mod error;
pub mod remote;

pub use error::{EmbedderError, EmbedderResult};

use async_trait::async_trait;

/// Storage-agnostic embedding seam, mirroring the teacher's
/// `GeminiEmbeddings` provider shape but expressed as a trait so the
/// Indexing Worker never depends on a concrete HTTP client.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model in use, recorded alongside vectors
    /// so a future model change can be detected during reconciliation.
    fn identity(&self) -> String;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>>;

    /// Embed a batch in as few upstream calls as the configured max batch
    /// size allows; order of the output matches the order of `texts`.
    async fn embed_batch(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>>;
}
