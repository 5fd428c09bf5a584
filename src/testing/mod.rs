// src/testing/mod.rs
// In-memory test doubles for the three external-I/O seams (VS, JB, Embedder)
// so component and integration tests can exercise real RS logic against a
// real SQLite file without a live Qdrant instance or embedding API.

pub mod fake_embedder;
pub mod fake_job_broker;
pub mod fake_vector_store;
pub mod fake_vision;

pub use fake_embedder::FakeEmbedder;
pub use fake_job_broker::FakeJobBroker;
pub use fake_vector_store::FakeVectorStore;
pub use fake_vision::FakeVisionDescriber;
