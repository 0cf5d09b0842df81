/// Stateway: state-language definition repository
///
/// An in-memory, lazily-filled cache of workflow state-machine definitions in
/// front of a durable store, with dedup-on-write registration.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by every layer
pub mod error;

// Definition types, parsers and charsets
pub mod definition;

// Durable store abstraction and SQLite implementation
pub mod store;

// Id generation for new definitions
pub mod sequence;

// Raw definition sources for bulk registration
pub mod resource;

// Two-index cache, registration pipeline and bulk loader
pub mod repository;

// HTTP API layer - lookup and registration endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use definition::{Definition, DefinitionKey, StateDefinition};
pub use error::{DefinitionParseError, EncodingError, RepositoryError};
pub use repository::{BulkLoadReport, DefinitionRepository};
pub use server::start_server;
