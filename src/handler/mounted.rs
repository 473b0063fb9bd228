//! The mounted-folder handler: materialized per mount, browsable, with
//! the mounted storable itself as its one root.

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::storable::{DriveInfo, Storable, StorableId};

use super::ProtocolHandler;

pub struct MountedFolderHandler {
    scheme: String,
    folder: Storable,
    display_name: String,
}

impl MountedFolderHandler {
    pub fn new(scheme: impl Into<String>, folder: Storable, display_name: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), folder, display_name: display_name.into() }
    }
}

#[async_trait]
impl ProtocolHandler for MountedFolderHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn has_browsable_root(&self) -> bool {
        true
    }

    async fn create_root(&self, root_uri: &StorableId) -> CoreResult<Storable> {
        if !root_uri.is_root_of(&self.scheme) {
            return Err(CoreError::invalid_argument(format!(
                "'{root_uri}' is not a root uri for mount '{}'",
                self.scheme
            )));
        }
        Ok(self.folder.clone())
    }

    fn create_child_id(&self, parent_id: &StorableId, child_name: &str) -> StorableId {
        let tail = parent_id.tail().unwrap_or("").trim_end_matches('/');
        if tail.is_empty() {
            StorableId::new(format!("{}://{child_name}", self.scheme))
        } else {
            StorableId::new(format!("{}://{tail}/{child_name}", self.scheme))
        }
    }

    async fn drive_info(&self, root_uri: &StorableId) -> CoreResult<Option<DriveInfo>> {
        if !root_uri.is_root_of(&self.scheme) {
            return Ok(None);
        }
        Ok(Some(DriveInfo {
            id: format!("{}://", self.scheme),
            name: self.display_name.clone(),
            type_: "Mount".to_string(),
            drive_type: "Mount".to_string(),
            is_ready: true,
            total_size: DriveInfo::UNKNOWN_SIZE,
            available_free_space: DriveInfo::UNKNOWN_SIZE,
        }))
    }
}

