/// Identifier generation for newly registered definitions

use crate::definition::EntityKind;
use anyhow::Result;

/// Produces unique identifiers per entity kind
pub trait IdGenerator: Send + Sync {
    fn generate(&self, kind: EntityKind) -> Result<String>;
}

/// Random UUIDs in simple (hyphen-less) form
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self, kind: EntityKind) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        tracing::debug!("Generated {} id {}", kind.as_str(), id);
        Ok(id)
    }
}
