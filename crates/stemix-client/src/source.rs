//! Stem source backed by the separation API.

use async_trait::async_trait;
use stemix_core::{Result, StemPayload, StemSource};

use crate::ApiClient;

/// Fetches stem audio through an [`ApiClient`], so relative stem paths from
/// a job result carry the client's credentials.
#[derive(Clone)]
pub struct HttpStemSource {
    client: ApiClient,
}

impl HttpStemSource {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl StemSource for HttpStemSource {
    async fn fetch(&self, locator: &str) -> Result<StemPayload> {
        let fetched = self.client.fetch_stem(locator).await?;
        let payload = StemPayload::new(fetched.body);
        Ok(match fetched.content_type {
            Some(content_type) => payload.with_mime_type(content_type),
            None => payload,
        })
    }
}
