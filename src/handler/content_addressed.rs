//! `immutable-cid` and `mutable-name` built-ins: resource-only handlers
//! over a content-addressed store. The store client library itself is an
//! external collaborator (spec §1 non-goal); this module defines the seam
//! (`ContentAddressedStoreClient`) and ships an in-memory test double so
//! the handlers are exercisable without a real backing service.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{CoreError, CoreResult};
use crate::storable::{FileStorable, Storable, StorableId, StorableNode};

use super::ProtocolHandler;

/// The external content-addressed store client interface. A real
/// implementation would speak to a local daemon or a remote pinning
/// service; this crate only specifies the seam.
#[async_trait]
pub trait ContentAddressedStoreClient: Send + Sync {
    /// Fetches the bytes behind an immutable content id (a CID/hash).
    async fn get_immutable(&self, cid: &str) -> CoreResult<Vec<u8>>;

    /// Resolves a mutable name to the CID it currently points at.
    async fn resolve_name(&self, name: &str) -> CoreResult<String>;
}

/// An in-memory stand-in for a real content-addressed store, useful for
/// tests and local demos.
#[derive(Default)]
pub struct InMemoryCasClient {
    blobs: DashMap<String, Vec<u8>>,
    names: DashMap<String, String>,
}

impl InMemoryCasClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_immutable(&self, cid: impl Into<String>, data: Vec<u8>) {
        self.blobs.insert(cid.into(), data);
    }

    pub fn publish_name(&self, name: impl Into<String>, cid: impl Into<String>) {
        self.names.insert(name.into(), cid.into());
    }
}

#[async_trait]
impl ContentAddressedStoreClient for InMemoryCasClient {
    async fn get_immutable(&self, cid: &str) -> CoreResult<Vec<u8>> {
        self.blobs.get(cid).map(|b| b.clone()).ok_or_else(|| CoreError::not_found(cid))
    }

    async fn resolve_name(&self, name: &str) -> CoreResult<String> {
        self.names.get(name).map(|c| c.clone()).ok_or_else(|| CoreError::not_found(name))
    }
}

pub struct ImmutableCidHandler {
    client: Arc<dyn ContentAddressedStoreClient>,
}

impl ImmutableCidHandler {
    pub fn new(client: Arc<dyn ContentAddressedStoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProtocolHandler for ImmutableCidHandler {
    fn scheme(&self) -> &str {
        "immutable-cid"
    }

    fn has_browsable_root(&self) -> bool {
        false
    }

    async fn create_resource(&self, resource_uri: &StorableId) -> CoreResult<Storable> {
        let cid = resource_uri
            .tail()
            .ok_or_else(|| CoreError::invalid_argument(format!("'{resource_uri}' has no cid")))?
            .to_string();
        Ok(Storable::File(Arc::new(CasResource {
            id: resource_uri.clone(),
            name: cid,
            client: self.client.clone(),
            resolve: ResolveStrategy::Direct,
        })))
    }
}

pub struct MutableNameHandler {
    client: Arc<dyn ContentAddressedStoreClient>,
}

impl MutableNameHandler {
    pub fn new(client: Arc<dyn ContentAddressedStoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProtocolHandler for MutableNameHandler {
    fn scheme(&self) -> &str {
        "mutable-name"
    }

    fn has_browsable_root(&self) -> bool {
        false
    }

    async fn create_resource(&self, resource_uri: &StorableId) -> CoreResult<Storable> {
        let name = resource_uri
            .tail()
            .ok_or_else(|| CoreError::invalid_argument(format!("'{resource_uri}' has no name")))?
            .to_string();
        Ok(Storable::File(Arc::new(CasResource {
            id: resource_uri.clone(),
            name: name.clone(),
            client: self.client.clone(),
            resolve: ResolveStrategy::ByName(name),
        })))
    }
}

enum ResolveStrategy {
    Direct,
    ByName(String),
}

struct CasResource {
    id: StorableId,
    name: String,
    client: Arc<dyn ContentAddressedStoreClient>,
    resolve: ResolveStrategy,
}

impl StorableNode for CasResource {
    fn id(&self) -> StorableId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FileStorable for CasResource {
    fn is_modifiable(&self) -> bool {
        false
    }

    async fn read_bytes(&self) -> CoreResult<Vec<u8>> {
        match &self.resolve {
            ResolveStrategy::Direct => self.client.get_immutable(&self.name).await,
            ResolveStrategy::ByName(name) => {
                let cid = self.client.resolve_name(name).await?;
                self.client.get_immutable(&cid).await
            }
        }
    }
}
