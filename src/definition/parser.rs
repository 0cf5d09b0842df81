/// State-language parsers
///
/// A parser turns raw definition text into its metadata plus the state graph.
/// Parsers are looked up by name through `ParserRegistry`, so the repository
/// can be configured with `parser_name` without knowing the concrete type.
///
/// Documents use the PascalCase state-language layout:
///
/// ```json
/// {
///   "Name": "ship-order",
///   "Version": "1.0",
///   "StartState": "Reserve",
///   "States": {
///     "Reserve": { "Type": "ServiceTask", "Next": "Done" },
///     "Done": { "Type": "Succeed" }
///   }
/// }
/// ```

use crate::definition::types::{Definition, StateDefinition};
use crate::error::DefinitionParseError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Parser used when no `parser_name` is configured
pub const DEFAULT_PARSER: &str = "json";

/// Parses raw definition text
pub trait DefinitionParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<ParsedDefinition, DefinitionParseError>;
}

/// Output of a successful parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDefinition {
    pub name: String,
    /// Tenant declared by the source itself, if any
    pub tenant_id: Option<String>,
    pub version: Option<String>,
    pub app_name: Option<String>,
    pub comment: Option<String>,
    pub start_state: String,
    pub states: BTreeMap<String, StateDefinition>,
}

impl ParsedDefinition {
    /// Build an unregistered `Definition` carrying `content` as its source.
    ///
    /// The declared tenant wins; `fallback_tenant` is used only when the
    /// document names none.
    pub fn into_definition(self, content: String, fallback_tenant: &str) -> Definition {
        let tenant_id = self
            .tenant_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| fallback_tenant.to_string());
        let mut definition = Definition::new(self.name, tenant_id, self.version, content);
        definition.app_name = self.app_name;
        definition.comment = self.comment;
        definition.attach_states(self.start_state, self.states);
        definition
    }
}

/// Raw document shape shared by the JSON and YAML parsers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    name: Option<String>,
    tenant_id: Option<String>,
    version: Option<Value>,
    app_name: Option<String>,
    comment: Option<String>,
    start_state: Option<String>,
    states: Option<Map<String, Value>>,
}

impl Document {
    fn validate(self) -> Result<ParsedDefinition, DefinitionParseError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(DefinitionParseError::MissingField("Name"))?;
        let start_state = self
            .start_state
            .filter(|s| !s.trim().is_empty())
            .ok_or(DefinitionParseError::MissingField("StartState"))?;
        let raw_states = self
            .states
            .filter(|s| !s.is_empty())
            .ok_or(DefinitionParseError::MissingField("States"))?;

        let mut states = BTreeMap::new();
        for (state_name, body) in raw_states {
            states.insert(state_name.clone(), build_state(state_name, body)?);
        }

        if !states.contains_key(&start_state) {
            return Err(DefinitionParseError::UnknownStartState(start_state));
        }
        for state in states.values() {
            for next in transitions(state) {
                if !states.contains_key(next) {
                    return Err(DefinitionParseError::UnknownTransition {
                        state: state.name.clone(),
                        next: next.to_string(),
                    });
                }
            }
        }

        // Versions are opaque tags; accept `Version: 1.0` as well as `"1.0"`
        let version = self.version.and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(ParsedDefinition {
            name,
            tenant_id: self.tenant_id,
            version,
            app_name: self.app_name,
            comment: self.comment,
            start_state,
            states,
        })
    }
}

fn build_state(name: String, body: Value) -> Result<StateDefinition, DefinitionParseError> {
    let Value::Object(mut properties) = body else {
        return Err(DefinitionParseError::Syntax {
            format: "state",
            message: format!("state '{name}' must be an object"),
        });
    };
    let state_type = match properties.remove("Type") {
        Some(Value::String(t)) if !t.is_empty() => t,
        _ => return Err(DefinitionParseError::MissingField("Type")),
    };
    let next = match properties.remove("Next") {
        Some(Value::String(n)) => Some(n),
        _ => None,
    };
    Ok(StateDefinition {
        name,
        state_type,
        next,
        properties,
    })
}

/// Every state name a state can move to: `Next`, a Choice's `Default` and
/// each `Choices[].Next`.
fn transitions(state: &StateDefinition) -> Vec<&str> {
    let mut targets: Vec<&str> = state.next.iter().map(String::as_str).collect();
    if let Some(Value::String(default)) = state.properties.get("Default") {
        targets.push(default);
    }
    if let Some(Value::Array(choices)) = state.properties.get("Choices") {
        targets.extend(
            choices
                .iter()
                .filter_map(|c| c.get("Next").and_then(Value::as_str)),
        );
    }
    targets
}

/// JSON state-language parser (the default)
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDefinitionParser;

impl DefinitionParser for JsonDefinitionParser {
    fn parse(&self, raw: &str) -> Result<ParsedDefinition, DefinitionParseError> {
        let document: Document =
            serde_json::from_str(raw).map_err(|e| DefinitionParseError::Syntax {
                format: "JSON",
                message: e.to_string(),
            })?;
        document.validate()
    }
}

/// YAML rendition of the same document layout
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlDefinitionParser;

impl DefinitionParser for YamlDefinitionParser {
    fn parse(&self, raw: &str) -> Result<ParsedDefinition, DefinitionParseError> {
        let document: Document =
            serde_yaml_ng::from_str(raw).map_err(|e| DefinitionParseError::Syntax {
                format: "YAML",
                message: e.to_string(),
            })?;
        document.validate()
    }
}

/// Named parser implementations
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DefinitionParser>>,
}

impl ParserRegistry {
    /// Registry with the built-in "json" and "yaml" parsers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("json", Arc::new(JsonDefinitionParser));
        registry.register("yaml", Arc::new(YamlDefinitionParser));
        registry
    }

    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Add or replace the parser registered under `name`.
    pub fn register(&mut self, name: &str, parser: Arc<dyn DefinitionParser>) {
        self.parsers.insert(name.to_ascii_lowercase(), parser);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DefinitionParser>> {
        self.parsers.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parsers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.names())
            .finish()
    }
}
