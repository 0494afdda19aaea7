//! Semantic search over screenshot text.
//!
//! Embeddings come from fastembed-rs; vectors live in memory for the
//! lifetime of the session.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` trait and the fastembed-backed model
//! - `index`: In-memory vector index with cosine similarity search
//! - `preprocess`: OCR cleanup, text combination and previews
//! - `engine`: Lazy-loading search engine used by the session

pub mod embeddings;
mod engine;
mod index;
mod preprocess;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use engine::{EngineStats, SearchEngine, SearchEngineError};
pub use index::{IndexError, ScoredId, VectorIndex};
pub use preprocess::{combine_text, normalize_ocr_text, preview};
