/// Durable definition store
///
/// The repository only needs three operations from persistence: fetch by id,
/// fetch the latest version for a (name, tenant) pair, and save. Records come
/// back unparsed; the repository attaches the state graph itself.

use crate::definition::Definition;
use anyhow::Result;
use async_trait::async_trait;

// SQLite implementation backed by sqlx
pub mod sqlite;

pub use sqlite::SqliteDefinitionStore;

/// Backing store for definition records
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Record with the given id, if any.
    async fn get_by_id(&self, id: &str) -> Result<Option<Definition>>;

    /// Most recently saved record for (name, tenant_id), if any.
    async fn get_latest_by_name_tenant(&self, name: &str, tenant_id: &str) -> Result<Option<Definition>>;

    /// Persist a record. The definition must already carry an id.
    async fn save(&self, definition: &Definition) -> Result<()>;
}
