//! `http`/`https` built-ins: resource-only, one `HttpHandler` instance
//! registered per scheme. Each `scheme://…` id already carries the full
//! URL (the scheme prefix IS the URL's own scheme), so `create_resource`
//! simply refetches the original string.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::storable::{FileStorable, Storable, StorableId, StorableNode};

use super::ProtocolHandler;

pub struct HttpHandler {
    scheme: &'static str,
    client: reqwest::Client,
}

impl HttpHandler {
    pub fn new(scheme: &'static str) -> Self {
        Self { scheme, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl ProtocolHandler for HttpHandler {
    fn scheme(&self) -> &str {
        self.scheme
    }

    fn has_browsable_root(&self) -> bool {
        false
    }

    async fn create_resource(&self, resource_uri: &StorableId) -> CoreResult<Storable> {
        let url = resource_uri.as_str().to_string();
        Ok(Storable::File(Arc::new(HttpResource { url, client: self.client.clone() })))
    }
}

pub struct HttpResource {
    url: String,
    client: reqwest::Client,
}

impl StorableNode for HttpResource {
    fn id(&self) -> StorableId {
        StorableId::new(self.url.clone())
    }

    fn name(&self) -> String {
        self.url.rsplit('/').next().unwrap_or(&self.url).to_string()
    }
}

#[async_trait]
impl FileStorable for HttpResource {
    fn is_modifiable(&self) -> bool {
        false
    }

    async fn read_bytes(&self) -> CoreResult<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CoreError::Unavailable(format!("GET {}: {e}", self.url)))?;
        if !response.status().is_success() {
            return Err(CoreError::not_found(format!("{} ({})", self.url, response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Unavailable(format!("reading body of {}: {e}", self.url)))?;
        Ok(bytes.to_vec())
    }
}
