//! Persisted mount configuration (spec §3/§6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountType {
    Folder,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountConfig {
    pub protocol_scheme: String,
    /// Must be in alias form if the target sits under another mount, so
    /// that restoration is self-sufficient (spec §3).
    pub original_storable_id: String,
    pub mount_name: String,
    pub created_at: DateTime<Utc>,
    pub depends_on: Vec<String>,
    pub mount_type: MountType,
}
