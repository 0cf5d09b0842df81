/// Definition repository
///
/// The in-memory front of the definition store. Lookups fill lazily from the
/// store, one fetch and parse per key no matter how many callers race on it.
/// Registration deduplicates against the store's latest version before writing.
///
/// Collaborators are passed in explicitly, so independent repositories can
/// coexist (one per test, one per engine instance).

use crate::config::RepositoryConfig;
use crate::definition::{Charset, Definition, DefinitionKey, DefinitionParser, ParserRegistry};
use crate::error::{DefinitionParseError, RepositoryError, Result};
use crate::sequence::{IdGenerator, UuidIdGenerator};
use crate::store::DefinitionStore;
use std::fmt;
use std::sync::Arc;

// Entry cells and the two indices
mod cache;

// Dedup-on-write registration pipeline
mod register;

// Bulk registration from raw sources
mod bulk;

pub use bulk::{BulkLoadReport, SkippedSource};

use cache::{CacheEntry, DefinitionCache};

/// Which store query resolves a cache miss
#[derive(Debug, Clone, Copy)]
enum Lookup<'a> {
    Id(&'a str),
    Latest(&'a DefinitionKey),
}

/// Lazily-filled, dedup-on-write definition repository
pub struct DefinitionRepository {
    cache: DefinitionCache,
    /// Durable store; without one the repository is a pure in-memory registry
    store: Option<Arc<dyn DefinitionStore>>,
    parser: Arc<dyn DefinitionParser>,
    parser_name: String,
    id_generator: Arc<dyn IdGenerator>,
    charset: Charset,
    default_tenant_id: String,
}

impl DefinitionRepository {
    /// Build a repository from configuration, resolving the parser by name.
    ///
    /// Starts without a store and with UUID ids; see `with_store` and
    /// `with_id_generator`.
    pub fn new(config: &RepositoryConfig, parsers: &ParserRegistry) -> Result<Self> {
        let charset: Charset = config.charset.parse()?;
        let parser = parsers
            .get(&config.parser_name)
            .ok_or_else(|| RepositoryError::UnknownParser(config.parser_name.clone()))?;

        Ok(Self {
            cache: DefinitionCache::new(),
            store: None,
            parser,
            parser_name: config.parser_name.clone(),
            id_generator: Arc::new(UuidIdGenerator),
            charset,
            default_tenant_id: config.default_tenant_id.clone(),
        })
    }

    /// Attach the durable store used for miss fills and registration.
    pub fn with_store(mut self, store: Arc<dyn DefinitionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn default_tenant_id(&self) -> &str {
        &self.default_tenant_id
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Definition with the given id, loading it from the store on a miss.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Arc<Definition>>> {
        let entry = self.cache.entry_by_id(id);
        self.resolve(&entry, Lookup::Id(id)).await
    }

    /// Latest definition for (name, tenant_id), loading it from the store on a miss.
    pub async fn get_by_name_tenant(&self, name: &str, tenant_id: &str) -> Result<Option<Arc<Definition>>> {
        let key = DefinitionKey::new(name, tenant_id);
        let entry = self.cache.entry_by_key(&key);
        self.resolve(&entry, Lookup::Latest(&key)).await
    }

    /// Lookup of a specific historical version. Always fails: only "latest"
    /// lookups are offered.
    pub async fn get_by_version(
        &self,
        name: &str,
        tenant_id: &str,
        version: &str,
    ) -> Result<Option<Arc<Definition>>> {
        Err(RepositoryError::VersionLookupUnsupported {
            name: name.to_string(),
            tenant_id: tenant_id.to_string(),
            version: version.to_string(),
        })
    }

    /// Double-checked fill of a single cache entry.
    ///
    /// Nothing is cached when the store has no record, so a later lookup
    /// queries the store again.
    async fn resolve(&self, entry: &CacheEntry, lookup: Lookup<'_>) -> Result<Option<Arc<Definition>>> {
        if let Some(definition) = entry.get() {
            return Ok(Some(definition));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let _fill = entry.lock_fill().await;
        if let Some(definition) = entry.get() {
            return Ok(Some(definition));
        }

        let record = match lookup {
            Lookup::Id(id) => store.get_by_id(id).await,
            Lookup::Latest(key) => store.get_latest_by_name_tenant(&key.name, &key.tenant_id).await,
        }
        .map_err(RepositoryError::Store)?;

        let Some(mut record) = record else {
            tracing::debug!("Definition not found in store: {:?}", lookup);
            return Ok(None);
        };

        let parsed = self.parser.parse(&record.content).map_err(|e| DefinitionParseError::Stored {
            id: record.id.clone().unwrap_or_default(),
            name: record.name.clone(),
            source: Box::new(e),
        })?;
        record.attach_states(parsed.start_state, parsed.states);

        // a registration may have published a newer value while the store was read
        let definition = entry.fill(Arc::new(record));
        self.cache.publish_if_empty(&definition);

        tracing::info!(
            "Loaded definition {} ({}) from store",
            definition.id.as_deref().unwrap_or("?"),
            definition.key()
        );

        Ok(Some(definition))
    }
}

impl fmt::Debug for DefinitionRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionRepository")
            .field("has_store", &self.store.is_some())
            .field("parser", &self.parser_name)
            .field("charset", &self.charset)
            .field("default_tenant_id", &self.default_tenant_id)
            .field("entries", &self.cache.entry_counts())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Instrumented collaborators shared by the repository tests

    use super::*;
    use crate::definition::{EntityKind, ParsedDefinition};
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub(crate) const SHIP_ORDER_V1: &str = r#"{"Name":"ship-order","Version":"v1","StartState":"A","States":{"A":{"Type":"ServiceTask","Next":"B"},"B":{"Type":"Succeed"}}}"#;
    pub(crate) const SHIP_ORDER_V2: &str = r#"{"Name":"ship-order","Version":"v2","StartState":"B","States":{"B":{"Type":"Succeed"}}}"#;

    /// In-memory store counting every call, with an optional fetch delay
    ///
    /// A delayed fetch reads its result first and returns it after the delay,
    /// like a slow round trip.
    #[derive(Default)]
    pub(crate) struct CountingStore {
        records: Mutex<Vec<Definition>>,
        pub(crate) fetches: AtomicUsize,
        pub(crate) saves: AtomicUsize,
        pub(crate) delay: Option<Duration>,
        /// Only the first fetch is delayed
        pub(crate) delay_first_only: bool,
        pub(crate) fail: bool,
    }

    impl CountingStore {
        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        pub(crate) fn slow_first(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                delay_first_only: true,
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        /// Insert a record directly, bypassing the counters.
        pub(crate) fn seed(&self, id: &str, name: &str, tenant_id: &str, version: &str, content: &str) {
            let mut def = Definition::new(name, tenant_id, Some(version.to_string()), content);
            def.id = Some(id.to_string());
            def.created_at = Some(chrono::Utc::now());
            self.records.lock().unwrap().push(def);
        }

        pub(crate) fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub(crate) fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        async fn finish_fetch(&self) -> anyhow::Result<()> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                if n == 0 || !self.delay_first_only {
                    tokio::time::sleep(delay).await;
                }
            }
            if self.fail {
                bail!("store unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DefinitionStore for CountingStore {
        async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Definition>> {
            let found = self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.id.as_deref() == Some(id))
                .cloned();
            self.finish_fetch().await?;
            Ok(found)
        }

        async fn get_latest_by_name_tenant(&self, name: &str, tenant_id: &str) -> anyhow::Result<Option<Definition>> {
            let found = self
                .records
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|d| d.name == name && d.tenant_id == tenant_id)
                .cloned();
            self.finish_fetch().await?;
            Ok(found)
        }

        async fn save(&self, definition: &Definition) -> anyhow::Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("store unavailable");
            }
            let mut stored = definition.clone();
            stored.start_state = None;
            stored.states.clear();
            self.records.lock().unwrap().push(stored);
            Ok(())
        }
    }

    /// Wraps another parser and counts invocations
    pub(crate) struct CountingParser<P> {
        inner: P,
        pub(crate) calls: AtomicUsize,
    }

    impl<P> CountingParser<P> {
        pub(crate) fn new(inner: P) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<P: DefinitionParser> DefinitionParser for CountingParser<P> {
        fn parse(&self, raw: &str) -> std::result::Result<ParsedDefinition, DefinitionParseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.parse(raw)
        }
    }

    /// Sequential ids "sm-1", "sm-2", ...
    #[derive(Default)]
    pub(crate) struct SequentialIds {
        next: AtomicUsize,
    }

    impl IdGenerator for SequentialIds {
        fn generate(&self, _kind: EntityKind) -> anyhow::Result<String> {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("sm-{n}"))
        }
    }

    /// Repository over `store` using the default JSON parser and sequential ids.
    pub(crate) fn repository(store: Arc<CountingStore>) -> DefinitionRepository {
        DefinitionRepository::new(&RepositoryConfig::default(), &ParserRegistry::new())
            .unwrap()
            .with_store(store)
            .with_id_generator(Arc::new(SequentialIds::default()))
    }
}
