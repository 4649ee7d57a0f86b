//! A log of fnord sightings: when and where something odd was noticed, and
//! in what context.
//!
//! `sightings` persists [`Sighting`](sighting::Sighting) records to SQLite or
//! PostgreSQL and searches them either by substring or, when an embedding
//! endpoint is configured, by cosine similarity over stored vectors.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for vectors, or PostgreSQL with pgvector
//! - **Embeddings**: any OpenAI-compatible `/embeddings` endpoint (optional)
//! - **Search**: case-insensitive substring match, or cosine distance with a cutoff
//! - **Transport**: a CLI, plus an MCP server over stdio or Streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: Schema, migrations and health checks for both engines
//! - [`embedding`]: Text-to-vector embedding over HTTP
//! - [`error`]: Validation, not-found, conflict and dependency errors
//! - [`sighting`]: Sighting types, validation, id policies and the store

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod sighting;
