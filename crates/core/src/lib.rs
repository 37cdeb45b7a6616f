//! Core library: tabular loading, chunking, indexing, semantic search and row retrieval.

pub mod chunker;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod indexer;
pub mod pipeline;
pub mod query_terms;
pub mod rows;
pub mod schema;
pub mod search;
pub mod vectorstore;
