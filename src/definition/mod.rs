/// State-machine definition layer
///
/// - Type definitions (Definition, StateDefinition, DefinitionKey)
/// - Named state-language parsers
/// - Charset handling for raw sources and dedup comparison

pub mod types;

pub mod parser;

pub mod charset;

pub use charset::Charset;
pub use parser::{DefinitionParser, JsonDefinitionParser, ParsedDefinition, ParserRegistry, YamlDefinitionParser};
pub use types::{Definition, DefinitionKey, EntityKind, StateDefinition};
