mod document;
mod embedding;

pub use document::{chunk_text, Record, SearchHit, DEFAULT_CHUNK_CHARS, DEFAULT_CHUNK_OVERLAP};
pub use embedding::Embedding;
