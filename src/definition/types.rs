/// Core state-machine definition types
///
/// A `Definition` is the unit the repository caches, persists and deduplicates.
/// The parsed state graph (`start_state`, `states`) is derived from `content`
/// and is never persisted on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A named, versioned state-machine definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Unique identifier. Assigned by the registration pipeline when absent;
    /// always present once the definition is published into the cache.
    pub id: Option<String>,
    /// Logical definition name (e.g. "ship-order")
    pub name: String,
    /// Tenant namespace; (name, tenant_id) identifies the logical definition
    pub tenant_id: String,
    /// Caller-asserted version tag, compared textually during dedup only
    pub version: Option<String>,
    /// Raw source text, authoritative for dedup comparison
    pub content: String,
    /// Name of the entry state, populated by parsing `content`
    #[serde(default)]
    pub start_state: Option<String>,
    /// State name -> state definition, populated by parsing `content`
    #[serde(default)]
    pub states: BTreeMap<String, StateDefinition>,
    /// Creation timestamp; preserved when a registration is deduplicated
    pub created_at: Option<DateTime<Utc>>,
    /// Owning application, if the source declares one
    #[serde(default)]
    pub app_name: Option<String>,
    /// Free-form description from the source
    #[serde(default)]
    pub comment: Option<String>,
}

impl Definition {
    /// New unregistered definition around raw content.
    pub fn new(
        name: impl Into<String>,
        tenant_id: impl Into<String>,
        version: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            tenant_id: tenant_id.into(),
            version,
            content: content.into(),
            start_state: None,
            states: BTreeMap::new(),
            created_at: None,
            app_name: None,
            comment: None,
        }
    }

    /// Composite key used by the name/tenant index.
    pub fn key(&self) -> DefinitionKey {
        DefinitionKey::new(&self.name, &self.tenant_id)
    }

    /// Whether the state graph has been attached by a parser.
    pub fn is_parsed(&self) -> bool {
        self.start_state.is_some()
    }

    /// Attach the result of parsing `content`.
    pub fn attach_states(&mut self, start_state: String, states: BTreeMap<String, StateDefinition>) {
        self.start_state = Some(start_state);
        self.states = states;
    }
}

/// A single state in the state graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    /// Name of the state (its key in `Definition::states`)
    pub name: String,
    /// State kind, e.g. "ServiceTask", "Choice", "Succeed", "Fail"
    pub state_type: String,
    /// Name of the following state, if the state declares one
    pub next: Option<String>,
    /// Every other attribute of the state, kept verbatim
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Composite (name, tenant) key for latest-version lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionKey {
    pub name: String,
    pub tenant_id: String,
}

impl DefinitionKey {
    pub fn new(name: &str, tenant_id: &str) -> Self {
        Self {
            name: name.to_string(),
            tenant_id: tenant_id.to_string(),
        }
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.tenant_id)
    }
}

/// Entity kinds handed to the id generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    StateMachine,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::StateMachine => "STATE_MACHINE",
        }
    }
}
