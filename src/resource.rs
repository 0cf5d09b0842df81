/// Raw definition sources for bulk registration
///
/// A loader yields every source it knows about each time `load` is called, so
/// the same loader can be replayed at every process start.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// One named raw-text source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    /// Display name used in logs and skip reports (file name, bundle key, ...)
    pub name: String,
    /// Undecoded bytes; decoded with the repository's configured charset
    pub bytes: Vec<u8>,
    /// Tenant the source belongs to, if the loader knows it
    pub tenant_id: Option<String>,
}

impl RawSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            tenant_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Supplies a finite, restartable collection of raw sources
pub trait ResourceLoader: Send + Sync {
    fn load(&self) -> Result<Vec<RawSource>>;
}

/// Sources that are already in memory
impl ResourceLoader for Vec<RawSource> {
    fn load(&self) -> Result<Vec<RawSource>> {
        Ok(self.clone())
    }
}

/// Loads every definition file from a directory (non-recursive)
///
/// Recognised extensions: `.json`, `.yaml`, `.yml`. Files are returned in
/// name order so repeated loads register in a stable sequence.
#[derive(Debug, Clone)]
pub struct DirectoryResourceLoader {
    dir: PathBuf,
    tenant_id: Option<String>,
}

const EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

impl DirectoryResourceLoader {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            tenant_id: None,
        }
    }

    /// Tag every source from this directory with a tenant.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

impl ResourceLoader for DirectoryResourceLoader {
    fn load(&self) -> Result<Vec<RawSource>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read definitions directory '{}'", self.dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let recognised = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && recognised {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read definition file '{}'", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            sources.push(RawSource {
                name,
                bytes,
                tenant_id: self.tenant_id.clone(),
            });
        }

        tracing::debug!("Found {} definition files in {}", sources.len(), self.dir.display());

        Ok(sources)
    }
}
