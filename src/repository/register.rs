/// Dedup-on-write registration
///
/// Re-registering the store's latest content under the same version tag is a
/// no-op for the store: the prior id and creation time are reused, so loading
/// the same bundled definitions at every start does not mint new versions.

use super::DefinitionRepository;
use crate::definition::{Definition, EntityKind};
use crate::error::{RepositoryError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;

impl DefinitionRepository {
    /// Register a definition, persisting it unless it duplicates the latest.
    ///
    /// The definition is published into both indices either way and returned
    /// with its final id and creation time.
    pub async fn register(&self, mut definition: Definition) -> Result<Arc<Definition>> {
        if let Some(store) = &self.store {
            let prior = store
                .get_latest_by_name_tenant(&definition.name, &definition.tenant_id)
                .await
                .map_err(RepositoryError::Store)?;

            if let Some(prior) = prior {
                if self.is_same_version(&prior, &definition)? {
                    tracing::info!(
                        "Definition {} already exists with version {}",
                        definition.key(),
                        prior.version.as_deref().unwrap_or_default()
                    );
                    definition.id = prior.id;
                    definition.created_at = prior.created_at;
                    return Ok(self.publish(definition));
                }
            }

            self.ensure_id(&mut definition)?;
            definition.created_at = Some(created_now());
            store.save(&definition).await.map_err(RepositoryError::Store)?;

            tracing::info!(
                "Stored definition {} as {}",
                definition.key(),
                definition.id.as_deref().unwrap_or_default()
            );
        } else {
            self.ensure_id(&mut definition)?;
            definition.created_at.get_or_insert_with(created_now);
        }

        Ok(self.publish(definition))
    }

    /// Parse raw text with the configured parser and register the result.
    ///
    /// The tenant declared in the text wins, then `tenant_id`, then the
    /// configured default tenant.
    pub async fn register_content(&self, raw: &str, tenant_id: Option<&str>) -> Result<Arc<Definition>> {
        let parsed = self.parser.parse(raw)?;
        let fallback = tenant_id.unwrap_or(&self.default_tenant_id);
        self.register(parsed.into_definition(raw.to_string(), fallback)).await
    }

    /// Same content bytes (in the configured charset) and the same non-absent version tag.
    fn is_same_version(&self, prior: &Definition, incoming: &Definition) -> Result<bool> {
        let same_version = matches!(
            (&incoming.version, &prior.version),
            (Some(incoming), Some(prior)) if incoming == prior
        );
        if !same_version {
            return Ok(false);
        }
        let prior_bytes = self.charset.encode(&prior.content)?;
        let incoming_bytes = self.charset.encode(&incoming.content)?;
        Ok(prior_bytes == incoming_bytes)
    }

    fn ensure_id(&self, definition: &mut Definition) -> Result<()> {
        let blank = definition.id.as_deref().map_or(true, |id| id.trim().is_empty());
        if blank {
            let id = self
                .id_generator
                .generate(EntityKind::StateMachine)
                .map_err(RepositoryError::IdGeneration)?;
            definition.id = Some(id);
        }
        Ok(())
    }

    fn publish(&self, definition: Definition) -> Arc<Definition> {
        let definition = Arc::new(definition);
        self.cache.publish(&definition);
        definition
    }
}

/// Registration time truncated to the microsecond precision stores keep
fn created_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::definition::ParserRegistry;
    use crate::error::{DefinitionParseError, EncodingError};
    use crate::sequence::IdGenerator;
    use anyhow::bail;
    use chrono::Timelike;

    fn ship_order(version: &str, content: &str) -> Definition {
        Definition::new("ship-order", "t1", Some(version.to_string()), content)
    }

    #[tokio::test]
    async fn identical_registration_is_deduplicated() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let first = repo.register(ship_order("v1", "A")).await.unwrap();
        let second = repo.register(ship_order("v1", "A")).await.unwrap();

        assert_eq!(first.id.as_deref(), Some("sm-1"));
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn changed_version_or_content_creates_new_id() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let x = repo.register(ship_order("v1", "A")).await.unwrap();
        let y = repo.register(ship_order("v2", "A")).await.unwrap();
        let z = repo.register(ship_order("v2", "B")).await.unwrap();

        assert_eq!(x.id.as_deref(), Some("sm-1"));
        assert_eq!(y.id.as_deref(), Some("sm-2"));
        assert_eq!(z.id.as_deref(), Some("sm-3"));
        assert_eq!(store.save_count(), 3);
    }

    #[tokio::test]
    async fn absent_version_never_dedups() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let a = repo
            .register(Definition::new("ship-order", "t1", None, "A"))
            .await
            .unwrap();
        let b = repo
            .register(Definition::new("ship-order", "t1", None, "A"))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn registration_updates_both_indices() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let registered = repo.register(ship_order("v1", "A")).await.unwrap();
        let by_id = repo.get_by_id("sm-1").await.unwrap().unwrap();
        let by_name = repo.get_by_name_tenant("ship-order", "t1").await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&registered, &by_id));
        assert!(Arc::ptr_eq(&registered, &by_name));
        // the registration lookup is the only store read
        assert_eq!(store.fetch_count(), 1);

        let newer = repo.register(ship_order("v2", "B")).await.unwrap();
        let by_name = repo.get_by_name_tenant("ship-order", "t1").await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&newer, &by_name));
    }

    #[tokio::test]
    async fn caller_supplied_id_is_kept() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let mut def = ship_order("v1", "A");
        def.id = Some("custom".into());
        let registered = repo.register(def).await.unwrap();
        assert_eq!(registered.id.as_deref(), Some("custom"));

        let mut blank = ship_order("v2", "A");
        blank.id = Some("  ".into());
        let registered = repo.register(blank).await.unwrap();
        assert_eq!(registered.id.as_deref(), Some("sm-1"));
    }

    #[tokio::test]
    async fn dedup_reuses_prior_created_at_from_store() {
        let store = Arc::new(CountingStore::default());
        store.seed("sm-old", "ship-order", "t1", "v1", "A");
        let repo = repository(store.clone());

        let registered = repo.register(ship_order("v1", "A")).await.unwrap();
        assert_eq!(registered.id.as_deref(), Some("sm-old"));
        assert!(registered.created_at.is_some());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn created_at_is_stamped_in_whole_microseconds() {
        let repo = repository(Arc::new(CountingStore::default()));
        let stored = repo.register(ship_order("v1", "A")).await.unwrap();
        assert_eq!(stored.created_at.unwrap().nanosecond() % 1_000, 0);

        let in_memory = DefinitionRepository::new(&RepositoryConfig::default(), &ParserRegistry::new()).unwrap();
        let registered = in_memory.register(ship_order("v1", "A")).await.unwrap();
        assert_eq!(registered.created_at.unwrap().nanosecond() % 1_000, 0);
    }

    #[tokio::test]
    async fn works_without_store() {
        let repo = DefinitionRepository::new(&RepositoryConfig::default(), &ParserRegistry::new()).unwrap();
        let registered = repo.register(ship_order("v1", "A")).await.unwrap();

        let id = registered.id.clone().unwrap();
        assert!(!id.is_empty());
        assert!(registered.created_at.is_some());
        let found = repo.get_by_id(&id).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &registered));
    }

    #[tokio::test]
    async fn unencodable_content_is_an_error() {
        let config = RepositoryConfig {
            charset: "ISO-8859-1".into(),
            ..RepositoryConfig::default()
        };
        let store = Arc::new(CountingStore::default());
        store.seed("sm-1", "ship-order", "t1", "v1", "\u{4e2d}");
        let repo = DefinitionRepository::new(&config, &ParserRegistry::new())
            .unwrap()
            .with_store(store.clone());

        let err = repo.register(ship_order("v1", "\u{4e2d}")).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Encoding(EncodingError::Unencodable { .. })
        ));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let repo = repository(Arc::new(CountingStore::failing()));
        assert!(matches!(
            repo.register(ship_order("v1", "A")).await,
            Err(RepositoryError::Store(_))
        ));
    }

    #[tokio::test]
    async fn id_generator_failure_propagates() {
        struct Broken;
        impl IdGenerator for Broken {
            fn generate(&self, _kind: EntityKind) -> anyhow::Result<String> {
                bail!("sequence exhausted")
            }
        }

        let repo = repository(Arc::new(CountingStore::default())).with_id_generator(Arc::new(Broken));
        assert!(matches!(
            repo.register(ship_order("v1", "A")).await,
            Err(RepositoryError::IdGeneration(_))
        ));
    }

    #[tokio::test]
    async fn register_content_parses_and_defaults_tenant() {
        let store = Arc::new(CountingStore::default());
        let repo = repository(store.clone());

        let registered = repo.register_content(SHIP_ORDER_V1, None).await.unwrap();
        assert_eq!(registered.tenant_id, "000001");
        assert_eq!(registered.version.as_deref(), Some("v1"));
        assert_eq!(registered.start_state.as_deref(), Some("A"));
        assert_eq!(registered.content, SHIP_ORDER_V1);

        let other = repo.register_content(SHIP_ORDER_V1, Some("t7")).await.unwrap();
        assert_eq!(other.tenant_id, "t7");
        assert_ne!(other.id, registered.id);

        assert!(matches!(
            repo.register_content("{}", None).await,
            Err(RepositoryError::Parse(DefinitionParseError::MissingField("Name")))
        ));
    }
}
