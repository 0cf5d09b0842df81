/// SQLite persistence layer for definition records
///
/// Every registration that is not deduplicated becomes a new row; rows are
/// never rewritten except by saving the same id again. The latest version of a
/// (name, tenant) pair is the row with the greatest `created_at`, ties broken
/// by insertion order.

use crate::definition::Definition;
use crate::store::DefinitionStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use std::str::FromStr;

const SELECT_COLUMNS: &str =
    "SELECT id, name, tenant_id, version, content, app_name, comment, created_at FROM state_machine_def";

/// sqlx-backed `DefinitionStore`
#[derive(Debug, Clone)]
pub struct SqliteDefinitionStore {
    /// SQLite connection pool for the definition database
    pool: SqlitePool,
}

impl SqliteDefinitionStore {
    /// Create new store instance over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url` and initialise the schema
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// otherwise every pooled connection would see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?
            .create_if_missing(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory '{}'", parent.display())
                    })?;
                }
            }
            SqlitePool::connect_with(options).await?
        };

        let store = Self::new(pool);
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the definition table and lookup index
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state_machine_def (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                version TEXT,
                content TEXT NOT NULL,
                app_name TEXT,
                comment TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_state_machine_def_name_tenant
            ON state_machine_def(name, tenant_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored rows for (name, tenant_id), across all versions
    pub async fn count_versions(&self, name: &str, tenant_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM state_machine_def WHERE name = ? AND tenant_id = ?",
        )
        .bind(name)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    fn row_to_definition(row: &SqliteRow) -> Result<Definition> {
        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("corrupt created_at '{created_at}'"))?
            .with_timezone(&Utc);

        let mut definition = Definition::new(
            row.get::<String, _>("name"),
            row.get::<String, _>("tenant_id"),
            row.get("version"),
            row.get::<String, _>("content"),
        );
        definition.id = Some(row.get("id"));
        definition.app_name = row.get("app_name");
        definition.comment = row.get("comment");
        definition.created_at = Some(created_at);
        Ok(definition)
    }
}

/// Fixed-width timestamps so text ordering matches time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl DefinitionStore for SqliteDefinitionStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Definition>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_definition).transpose()
    }

    async fn get_latest_by_name_tenant(&self, name: &str, tenant_id: &str) -> Result<Option<Definition>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE name = ? AND tenant_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .bind(name)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_definition).transpose()
    }

    async fn save(&self, definition: &Definition) -> Result<()> {
        let id = definition
            .id
            .as_deref()
            .context("cannot save a definition without an id")?;
        let created_at = format_timestamp(definition.created_at.unwrap_or_else(Utc::now));

        sqlx::query(
            r#"
            INSERT INTO state_machine_def (id, name, tenant_id, version, content, app_name, comment, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                tenant_id = excluded.tenant_id,
                version = excluded.version,
                content = excluded.content,
                app_name = excluded.app_name,
                comment = excluded.comment,
                created_at = excluded.created_at
            "#,
        )
        .bind(id)
        .bind(&definition.name)
        .bind(&definition.tenant_id)
        .bind(&definition.version)
        .bind(&definition.content)
        .bind(&definition.app_name)
        .bind(&definition.comment)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Saved definition {} ({}@{})", id, definition.name, definition.tenant_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn memory_store() -> SqliteDefinitionStore {
        SqliteDefinitionStore::connect("sqlite::memory:").await.unwrap()
    }

    fn record(id: &str, version: &str, content: &str, secs: i64) -> Definition {
        let mut def = Definition::new("ship-order", "t1", Some(version.to_string()), content);
        def.id = Some(id.to_string());
        def.created_at = Some(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap());
        def
    }

    #[tokio::test]
    async fn save_and_get_by_id() {
        let store = memory_store().await;
        let mut def = record("sm-1", "v1", "{\"a\":1}", 0);
        def.comment = Some("first".into());
        store.save(&def).await.unwrap();

        let loaded = store.get_by_id("sm-1").await.unwrap().unwrap();
        assert_eq!(loaded, def);
        assert!(!loaded.is_parsed());
        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_is_most_recent_created_at() {
        let store = memory_store().await;
        store.save(&record("sm-2", "v2", "B", 10)).await.unwrap();
        store.save(&record("sm-1", "v1", "A", 0)).await.unwrap();

        let latest = store
            .get_latest_by_name_tenant("ship-order", "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id.as_deref(), Some("sm-2"));
        assert_eq!(store.count_versions("ship-order", "t1").await.unwrap(), 2);
        assert!(store
            .get_latest_by_name_tenant("ship-order", "other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn identical_timestamps_fall_back_to_insertion_order() {
        let store = memory_store().await;
        store.save(&record("sm-1", "v1", "A", 5)).await.unwrap();
        store.save(&record("sm-2", "v2", "B", 5)).await.unwrap();

        let latest = store
            .get_latest_by_name_tenant("ship-order", "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id.as_deref(), Some("sm-2"));
    }

    #[tokio::test]
    async fn save_without_id_fails() {
        let store = memory_store().await;
        let def = Definition::new("n", "t", None, "x");
        assert!(store.save(&def).await.is_err());
    }
}
