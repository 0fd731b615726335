pub mod catalog;
pub mod embeddings;
pub mod index_meta;
pub mod indexer;
pub mod rate_limiter;
pub mod response_cache;
pub mod retriever;
pub mod summarizer;
pub mod vector_database;

#[cfg(feature = "ml-features")]
pub mod lancedb;
