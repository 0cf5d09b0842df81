/// HTTP API Layer
///
/// REST endpoints for definition lookup and registration.

// Definition lookup and registration endpoints
pub mod definitions;

// Re-export router builder
pub use definitions::{create_definition_routes, AppState};
