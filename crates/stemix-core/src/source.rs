//! Where stem audio comes from.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Raw, still-encoded audio for one stem.
#[derive(Debug, Clone)]
pub struct StemPayload {
    pub data: Bytes,
    /// Content type reported by the source, if any.
    pub mime_type: Option<String>,
}

impl StemPayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            mime_type: None,
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Resolves a stem locator to its encoded bytes.
///
/// Authentication, URL resolution and caching are the implementor's concern;
/// the engine only hands over the locator found in the stem set.
#[async_trait]
pub trait StemSource: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<StemPayload>;
}
