/// Error types for the definition repository
///
/// Parse and encoding failures get their own types so collaborators (parsers,
/// the bulk loader) can report them without pulling in the whole repository
/// error. Store, id-generator and loader failures arrive as `anyhow::Error`
/// from their trait implementations and are wrapped, never retried.

use thiserror::Error;

/// Raw definition text could not be turned into a valid state machine.
#[derive(Debug, Error)]
pub enum DefinitionParseError {
    /// The text is not well-formed for the selected parser.
    #[error("malformed {format} definition: {message}")]
    Syntax { format: &'static str, message: String },

    /// The text parsed but a required field is missing or empty.
    #[error("definition is missing required field '{0}'")]
    MissingField(&'static str),

    /// `StartState` does not name a declared state.
    #[error("start state '{0}' is not declared in States")]
    UnknownStartState(String),

    /// A state's `Next` points at an undeclared state.
    #[error("state '{state}' transitions to undeclared state '{next}'")]
    UnknownTransition { state: String, next: String },

    /// Stored content failed to parse during a cache fill.
    #[error("parse state language failed, id: {id}, name: {name}: {source}")]
    Stored {
        id: String,
        name: String,
        #[source]
        source: Box<DefinitionParseError>,
    },
}

/// Text could not be converted between bytes and a string in the configured charset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported charset '{0}'")]
    UnsupportedCharset(String),

    #[error("character {ch:?} cannot be encoded as {charset}")]
    Unencodable { charset: &'static str, ch: char },

    #[error("input is not valid {charset}: {message}")]
    Undecodable { charset: &'static str, message: String },
}

/// Errors surfaced by `DefinitionRepository` operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Parse(#[from] DefinitionParseError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Lookup of a specific historical version is not offered; distinct from "not found".
    #[error("lookup by version is not supported (name: {name}, tenant: {tenant_id}, version: {version})")]
    VersionLookupUnsupported {
        name: String,
        tenant_id: String,
        version: String,
    },

    #[error("no definition parser registered under '{0}'")]
    UnknownParser(String),

    #[error("definition store failure: {0:#}")]
    Store(anyhow::Error),

    #[error("id generation failure: {0:#}")]
    IdGeneration(anyhow::Error),

    #[error("resource loading failure: {0:#}")]
    ResourceLoad(anyhow::Error),
}

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;
