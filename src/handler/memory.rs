//! `memory` built-in: a browsable, synthetic root backed by an in-process
//! tree. Unlike `local-file`/`mfs`, its native ids are not filesystem
//! paths; they are `mem-heap:/...` strings private to one `MemoryHandler`
//! instance, so the alias engine still has real substitution work to do
//! (native id differs from the `memory://` alias).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::storable::{DriveInfo, FileStorable, FolderStorable, Storable, StorableId, StorableNode};

use super::ProtocolHandler;

const NATIVE_PREFIX: &str = "mem-heap:";

#[derive(Clone)]
enum Node {
    File(Vec<u8>),
    Folder,
}

/// Shared in-memory tree. Keyed by native path (`"/a/b"`, root is `""`).
struct Heap {
    nodes: DashMap<String, Node>,
    children: RwLock<BTreeMap<String, Vec<String>>>,
}

impl Heap {
    fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(String::new(), Node::Folder);
        Self { nodes, children: RwLock::new(BTreeMap::new()) }
    }
}

pub struct MemoryHandler {
    heap: Arc<Heap>,
}

impl Default for MemoryHandler {
    fn default() -> Self {
        Self { heap: Arc::new(Heap::new()) }
    }
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProtocolHandler for MemoryHandler {
    fn scheme(&self) -> &str {
        "memory"
    }

    fn has_browsable_root(&self) -> bool {
        true
    }

    async fn create_root(&self, root_uri: &StorableId) -> CoreResult<Storable> {
        if !root_uri.is_root_of("memory") {
            return Err(CoreError::invalid_argument(format!("'{root_uri}' is not memory://")));
        }
        Ok(Storable::Folder(Arc::new(MemoryFolder {
            heap: self.heap.clone(),
            native_path: String::new(),
            name: "memory://".to_string(),
        })))
    }

    fn create_child_id(&self, parent_id: &StorableId, child_name: &str) -> StorableId {
        StorableId::new(format!("{}/{child_name}", parent_id.as_str().trim_end_matches('/')))
    }

    async fn drive_info(&self, root_uri: &StorableId) -> CoreResult<Option<DriveInfo>> {
        if !root_uri.is_root_of("memory") {
            return Ok(None);
        }
        Ok(Some(DriveInfo {
            id: "memory://".to_string(),
            name: "memory".to_string(),
            type_: "Ramdisk".to_string(),
            drive_type: "Memory".to_string(),
            is_ready: true,
            total_size: DriveInfo::UNKNOWN_SIZE,
            available_free_space: DriveInfo::UNKNOWN_SIZE,
        }))
    }

    fn needs_registration(&self, _id: &StorableId) -> bool {
        false
    }
}

fn native_path_for(heap_prefix: &str, native_path: &str) -> String {
    format!("{heap_prefix}{native_path}")
}

pub struct MemoryFolder {
    heap: Arc<Heap>,
    /// Path relative to the heap root, e.g. `""` for root, `"/a"` for a child.
    native_path: String,
    name: String,
}

impl StorableNode for MemoryFolder {
    fn id(&self) -> StorableId {
        StorableId::new(native_path_for(NATIVE_PREFIX, &self.native_path))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FolderStorable for MemoryFolder {
    fn is_modifiable(&self) -> bool {
        true
    }

    async fn list_children(&self) -> CoreResult<Vec<Storable>> {
        let children = self.heap.children.read().await;
        let names = children.get(&self.native_path).cloned().unwrap_or_default();
        drop(children);
        let mut out = Vec::new();
        for name in names {
            let child_path = format!("{}/{}", self.native_path, name);
            match self.heap.nodes.get(&child_path).map(|n| n.clone()) {
                Some(Node::Folder) => out.push(Storable::Folder(Arc::new(MemoryFolder {
                    heap: self.heap.clone(),
                    native_path: child_path,
                    name,
                }))),
                Some(Node::File(_)) => out.push(Storable::File(Arc::new(MemoryFile {
                    heap: self.heap.clone(),
                    native_path: child_path,
                    name,
                }))),
                None => {}
            }
        }
        Ok(out)
    }

    async fn create_file(&self, name: &str) -> CoreResult<Storable> {
        let child_path = format!("{}/{}", self.native_path, name);
        self.heap.nodes.insert(child_path.clone(), Node::File(Vec::new()));
        let mut children = self.heap.children.write().await;
        children.entry(self.native_path.clone()).or_default().push(name.to_string());
        Ok(Storable::File(Arc::new(MemoryFile {
            heap: self.heap.clone(),
            native_path: child_path,
            name: name.to_string(),
        })))
    }

    async fn create_folder(&self, name: &str) -> CoreResult<Storable> {
        let child_path = format!("{}/{}", self.native_path, name);
        self.heap.nodes.insert(child_path.clone(), Node::Folder);
        let mut children = self.heap.children.write().await;
        children.entry(self.native_path.clone()).or_default().push(name.to_string());
        Ok(Storable::Folder(Arc::new(MemoryFolder {
            heap: self.heap.clone(),
            native_path: child_path,
            name: name.to_string(),
        })))
    }

    async fn delete(&self, name: &str) -> CoreResult<()> {
        let child_path = format!("{}/{}", self.native_path, name);
        self.heap.nodes.remove(&child_path);
        let mut children = self.heap.children.write().await;
        if let Some(list) = children.get_mut(&self.native_path) {
            list.retain(|n| n != name);
        }
        Ok(())
    }
}

pub struct MemoryFile {
    heap: Arc<Heap>,
    native_path: String,
    name: String,
}

impl StorableNode for MemoryFile {
    fn id(&self) -> StorableId {
        StorableId::new(native_path_for(NATIVE_PREFIX, &self.native_path))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FileStorable for MemoryFile {
    fn is_modifiable(&self) -> bool {
        true
    }

    async fn read_bytes(&self) -> CoreResult<Vec<u8>> {
        match self.heap.nodes.get(&self.native_path).map(|n| n.clone()) {
            Some(Node::File(data)) => Ok(data),
            _ => Err(CoreError::not_found(&self.native_path)),
        }
    }

    async fn write_bytes(&self, data: &[u8]) -> CoreResult<()> {
        self.heap.nodes.insert(self.native_path.clone(), Node::File(data.to_vec()));
        Ok(())
    }
}
