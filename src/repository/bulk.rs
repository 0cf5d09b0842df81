/// Bulk registration of raw definition sources
///
/// A source that cannot be decoded or parsed is skipped and reported; the
/// rest of the batch still registers. Store and id-generation failures abort
/// the batch since they would fail every remaining source too.

use super::DefinitionRepository;
use crate::definition::Definition;
use crate::error::{RepositoryError, Result};
use crate::resource::{RawSource, ResourceLoader};
use std::sync::Arc;

/// Outcome of a bulk registration
#[derive(Debug, Default)]
pub struct BulkLoadReport {
    /// Definitions registered (or deduplicated) in source order
    pub registered: Vec<Arc<Definition>>,
    /// Sources that were skipped, with the reason
    pub skipped: Vec<SkippedSource>,
}

/// A source left out of a bulk registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub name: String,
    pub reason: String,
}

impl DefinitionRepository {
    /// Decode, parse and register every source.
    ///
    /// Tenant precedence: the tenant declared in the text, then the source's
    /// own tenant, then `default_tenant_id`.
    pub async fn register_all<I>(&self, sources: I, default_tenant_id: &str) -> Result<BulkLoadReport>
    where
        I: IntoIterator<Item = RawSource>,
    {
        let mut report = BulkLoadReport::default();

        for source in sources {
            let text = match self.charset.decode(&source.bytes) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping definition source {}: {}", source.name, e);
                    report.skip(source.name, e);
                    continue;
                }
            };

            let parsed = match self.parser.parse(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Skipping definition source {}: {}", source.name, e);
                    report.skip(source.name, e);
                    continue;
                }
            };

            let fallback = source.tenant_id.as_deref().unwrap_or(default_tenant_id);
            let definition = self.register(parsed.into_definition(text, fallback)).await?;

            tracing::debug!("===== Definition loaded from {}: \n{}", source.name, definition.content);

            report.registered.push(definition);
        }

        tracing::info!(
            "Bulk registration finished: {} registered, {} skipped",
            report.registered.len(),
            report.skipped.len()
        );

        Ok(report)
    }

    /// Register everything `loader` yields, defaulting to the configured tenant.
    pub async fn load_resources(&self, loader: &dyn ResourceLoader) -> Result<BulkLoadReport> {
        let sources = loader.load().map_err(RepositoryError::ResourceLoad)?;
        self.register_all(sources, &self.default_tenant_id).await
    }
}

impl BulkLoadReport {
    fn skip(&mut self, name: String, reason: impl std::fmt::Display) {
        self.skipped.push(SkippedSource {
            name,
            reason: reason.to_string(),
        });
    }
}
