/// Two-index definition cache
///
/// Both indices map a key to a shared `CacheEntry`. Entries are created empty
/// on first touch and published into their index straight away, so every
/// caller racing on a key sees the same entry and therefore the same fill
/// lock. Reads of a filled entry never take a lock.

use crate::definition::{Definition, DefinitionKey};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// A cache slot holding at most one published definition
#[derive(Debug, Default)]
pub(crate) struct CacheEntry {
    value: ArcSwapOption<Definition>,
    /// Serialises fills of this slot only
    fill_lock: Mutex<()>,
}

impl CacheEntry {
    pub(crate) fn get(&self) -> Option<Arc<Definition>> {
        self.value.load_full()
    }

    pub(crate) fn set(&self, definition: Arc<Definition>) {
        self.value.store(Some(definition));
    }

    /// Fill only if nothing is published yet; returns whether it was stored.
    pub(crate) fn set_if_empty(&self, definition: Arc<Definition>) -> bool {
        let previous = self
            .value
            .compare_and_swap(&None::<Arc<Definition>>, Some(definition));
        previous.is_none()
    }

    /// Fill from the store unless a value was published meanwhile, and return
    /// whatever the slot holds afterwards.
    pub(crate) fn fill(&self, definition: Arc<Definition>) -> Arc<Definition> {
        if self.set_if_empty(Arc::clone(&definition)) {
            return definition;
        }
        self.get().unwrap_or(definition)
    }

    pub(crate) async fn lock_fill(&self) -> MutexGuard<'_, ()> {
        self.fill_lock.lock().await
    }
}

/// Definition cache indexed by id and by (name, tenant)
#[derive(Debug, Default)]
pub(crate) struct DefinitionCache {
    by_id: DashMap<String, Arc<CacheEntry>>,
    by_name_tenant: DashMap<DefinitionKey, Arc<CacheEntry>>,
}

impl DefinitionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Get-or-insert the entry for `id`.
    pub(crate) fn entry_by_id(&self, id: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self.by_id.get(id) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.by_id.entry(id.to_string()).or_default().value())
    }

    /// Get-or-insert the entry for (name, tenant).
    pub(crate) fn entry_by_key(&self, key: &DefinitionKey) -> Arc<CacheEntry> {
        if let Some(entry) = self.by_name_tenant.get(key) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.by_name_tenant.entry(key.clone()).or_default().value())
    }

    /// Publish `definition` as the current value under its id and as the
    /// latest version of its (name, tenant).
    pub(crate) fn publish(&self, definition: &Arc<Definition>) {
        if let Some(id) = definition.id.as_deref() {
            self.entry_by_id(id).set(Arc::clone(definition));
        }
        self.entry_by_key(&definition.key()).set(Arc::clone(definition));
    }

    /// Publish a definition read from the store into whichever index slots
    /// are still empty.
    ///
    /// A store read may be older than a concurrent registration, and a record
    /// fetched by id may be an older version, so neither displaces a value
    /// already published.
    pub(crate) fn publish_if_empty(&self, definition: &Arc<Definition>) {
        if let Some(id) = definition.id.as_deref() {
            self.entry_by_id(id).set_if_empty(Arc::clone(definition));
        }
        self.entry_by_key(&definition.key())
            .set_if_empty(Arc::clone(definition));
    }

    /// Currently published value for `id`, without creating an entry.
    #[cfg(test)]
    pub(crate) fn peek_id(&self, id: &str) -> Option<Arc<Definition>> {
        self.by_id.get(id).and_then(|entry| entry.get())
    }

    /// Currently published value for `key`, without creating an entry.
    #[cfg(test)]
    pub(crate) fn peek_key(&self, key: &DefinitionKey) -> Option<Arc<Definition>> {
        self.by_name_tenant.get(key).and_then(|entry| entry.get())
    }

    /// Number of entries in (id index, name/tenant index), filled or not.
    pub(crate) fn entry_counts(&self) -> (usize, usize) {
        (self.by_id.len(), self.by_name_tenant.len())
    }
}
