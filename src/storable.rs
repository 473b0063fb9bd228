//! The data model: storable identifiers and the `Storable` capability set.
//!
//! Mirrors the teacher's `FileHandle`/`FsPath` newtype style (see the
//! original `vfs::FileHandle`) but generalized to IDs that are not
//! filesystem paths: CIDs, opaque hashes, URLs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;

/// An opaque storable identifier.
///
/// Two syntactic forms are recognized: scheme form (`scheme://tail`) and
/// internal form (anything else). The core never decomposes internal-form
/// IDs as filesystem paths; only the protocol handler owning a scheme
/// interprets its own tail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorableId(pub String);

impl StorableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the scheme prefix if this ID is in scheme form.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme).filter(|s| !s.is_empty())
    }

    /// Returns the tail after `scheme://`, if this ID is in scheme form.
    pub fn tail(&self) -> Option<&str> {
        self.0.split_once("://").map(|(_, tail)| tail)
    }

    pub fn is_scheme_form(&self) -> bool {
        self.scheme().is_some()
    }

    /// True if this ID is exactly `scheme://` (a root URI).
    pub fn is_root_of(&self, scheme: &str) -> bool {
        self.0 == format!("{scheme}://")
    }

    pub fn root_of(scheme: &str) -> Self {
        Self(format!("{scheme}://"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt_display::Display for StorableId {
    fn fmt(&self, f: &mut fmt_display::Formatter<'_>) -> fmt_display::Result {
        write!(f, "{}", self.0)
    }
}

use std::fmt as fmt_display;

impl From<String> for StorableId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StorableId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Capabilities shared by every storable: an id and a display name.
pub trait StorableNode: Send + Sync {
    fn id(&self) -> StorableId;
    fn name(&self) -> String;

    /// Present on `StorableChild`s; `None` for roots.
    fn parent_id(&self) -> Option<StorableId> {
        None
    }
}

/// A readable (and, if `is_modifiable`, writable) file.
#[async_trait]
pub trait FileStorable: StorableNode {
    fn is_modifiable(&self) -> bool;

    async fn read_bytes(&self) -> CoreResult<Vec<u8>>;

    async fn read_text(&self) -> CoreResult<String> {
        let bytes = self.read_bytes().await?;
        String::from_utf8(bytes)
            .map_err(|e| crate::error::CoreError::invalid_argument(format!("not utf-8: {e}")))
    }

    async fn write_bytes(&self, _data: &[u8]) -> CoreResult<()> {
        Err(crate::error::CoreError::unsupported(format!(
            "'{}' is not modifiable",
            self.name()
        )))
    }
}

/// A folder exposing a lazy sequence of children and, if `is_modifiable`,
/// create/delete operations.
///
/// `list_children` returns a materialized `Vec` rather than a true lazy
/// stream; backends with enormous directories would want a
/// `Stream<Item = CoreResult<Storable>>` here instead, but none of the
/// built-in backends need it and this keeps the trait object-safe.
#[async_trait]
pub trait FolderStorable: StorableNode {
    fn is_modifiable(&self) -> bool;

    async fn list_children(&self) -> CoreResult<Vec<Storable>>;

    async fn create_file(&self, _name: &str) -> CoreResult<Storable> {
        Err(crate::error::CoreError::unsupported(format!(
            "'{}' is not modifiable",
            self.name()
        )))
    }

    async fn create_folder(&self, _name: &str) -> CoreResult<Storable> {
        Err(crate::error::CoreError::unsupported(format!(
            "'{}' is not modifiable",
            self.name()
        )))
    }

    async fn delete(&self, _name: &str) -> CoreResult<()> {
        Err(crate::error::CoreError::unsupported(format!(
            "'{}' is not modifiable",
            self.name()
        )))
    }

    /// Flushes any buffered writes to the backing store. Default no-op;
    /// overridden by the archive mount adapter's writable view.
    async fn flush(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Disposes backing resources after a flush (e.g. closing a handle).
    /// Default no-op.
    async fn dispose(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// A materialized item: either a file or a folder.
#[derive(Clone)]
pub enum Storable {
    File(Arc<dyn FileStorable>),
    Folder(Arc<dyn FolderStorable>),
}

impl Storable {
    pub fn id(&self) -> StorableId {
        match self {
            Storable::File(f) => f.id(),
            Storable::Folder(d) => d.id(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Storable::File(f) => f.name(),
            Storable::Folder(d) => d.name(),
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Storable::Folder(_))
    }

    pub fn as_folder(&self) -> Option<&Arc<dyn FolderStorable>> {
        match self {
            Storable::Folder(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<dyn FileStorable>> {
        match self {
            Storable::File(f) => Some(f),
            _ => None,
        }
    }

    pub async fn flush(&self) -> CoreResult<()> {
        match self {
            Storable::Folder(d) => d.flush().await,
            Storable::File(_) => Ok(()),
        }
    }

    pub async fn dispose(&self) -> CoreResult<()> {
        match self {
            Storable::Folder(d) => d.dispose().await,
            Storable::File(_) => Ok(()),
        }
    }
}

impl fmt_display::Debug for Storable {
    fn fmt(&self, f: &mut fmt_display::Formatter<'_>) -> fmt_display::Result {
        match self {
            Storable::File(file) => f.debug_tuple("Storable::File").field(&file.id()).finish(),
            Storable::Folder(dir) => f.debug_tuple("Storable::Folder").field(&dir.id()).finish(),
        }
    }
}

/// Drive/volume metadata reported by a browsable root's `drive_info`.
///
/// Unknown/unbounded sizes are reported as `-1`, matching the documented
/// external settings/DTO shape.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriveInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub drive_type: String,
    pub is_ready: bool,
    pub total_size: i64,
    pub available_free_space: i64,
}

impl DriveInfo {
    pub const UNKNOWN_SIZE: i64 = -1;
}
