//! Stem sources that do not need the network.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stemix_core::{Result, StemPayload, StemSource};
use tracing::debug;

/// Reads stems from the local filesystem.
///
/// Locators are plain paths or `file://` URLs. Relative paths are resolved
/// against the optional root directory.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative locators against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Filesystem path a locator refers to.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator.strip_prefix("file://").unwrap_or(locator));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl StemSource for FileSource {
    async fn fetch(&self, locator: &str) -> Result<StemPayload> {
        let path = self.resolve(locator);
        let data = tokio::fs::read(&path).await?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(StemPayload::new(data))
    }
}
