//! Protocol Handler contract (spec §4.A) and the built-in handlers.
//!
//! A handler is polymorphic over `{create_root, create_resource,
//! create_child_id, drive_info, has_browsable_root, needs_registration}`.
//! It is either `BrowsableRoot` (a single root resolves `scheme://` to a
//! folder; resources are reached by navigation) or `ResourceOnly` (no
//! root; each `scheme://…` resolves to an individual storable). No
//! inheritance hierarchy is required; each backend is a standalone
//! `impl ProtocolHandler`, the same way the teacher gives every backend
//! its own standalone `impl Vfs`.

pub mod content_addressed;
pub mod http;
pub mod local;
pub mod memory;
pub mod mounted;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::storable::{DriveInfo, Storable, StorableId};

/// A scheme's backend implementation.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// The scheme this handler answers for (without `://`).
    fn scheme(&self) -> &str;

    /// `true` for a `BrowsableRoot` handler (root + navigation), `false`
    /// for a `ResourceOnly` handler (every id individually addresses a
    /// resource).
    fn has_browsable_root(&self) -> bool;

    /// Materializes the single root folder for a browsable scheme.
    /// Callers must only invoke this when `has_browsable_root()` is true;
    /// the default errs with `Unsupported`.
    async fn create_root(&self, _root_uri: &StorableId) -> CoreResult<Storable> {
        Err(crate::error::CoreError::unsupported(format!(
            "scheme '{}' has no browsable root",
            self.scheme()
        )))
    }

    /// Materializes an individual resource for a resource-only scheme.
    /// Callers must only invoke this when `has_browsable_root()` is
    /// false; the default errs with `Unsupported`.
    async fn create_resource(&self, _resource_uri: &StorableId) -> CoreResult<Storable> {
        Err(crate::error::CoreError::unsupported(format!(
            "scheme '{}' is not resource-only",
            self.scheme()
        )))
    }

    /// Coins the id of `child_name` under `parent_id`, using this
    /// scheme's own id shape. Only meaningful for browsable schemes.
    fn create_child_id(&self, parent_id: &StorableId, child_name: &str) -> StorableId {
        let parent = parent_id.as_str().trim_end_matches('/');
        StorableId::new(format!("{parent}/{child_name}"))
    }

    /// Drive/volume metadata for a browsable root. `None` iff this
    /// handler has no browsable root.
    async fn drive_info(&self, _root_uri: &StorableId) -> CoreResult<Option<DriveInfo>> {
        Ok(None)
    }

    /// Advises the cache that this handler lazily populates the cache on
    /// access, so the cache itself need not materialize and store the
    /// result. Most handlers return `false`.
    fn needs_registration(&self, _id: &StorableId) -> bool {
        false
    }
}

/// Fixed set of scheme names no mount may shadow.
pub const BUILTIN_SCHEMES: &[&str] =
    &["local-file", "mfs", "memory", "http", "https", "immutable-cid", "mutable-name"];
