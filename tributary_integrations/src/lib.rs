//! Built-in Tributary plugins: sources, the pgvector destination, the local
//! text2vec embedding model, the text chunker, entity definitions and
//! credential schemas. `register_builtins` wires them into a registry.

pub mod builtins;
pub mod configs;
pub mod connectors;
pub mod embedding;
pub mod entities;
pub mod transformers;
pub mod vector;

pub use builtins::register_builtins;
