//! Storable VFS core - protocol & mount registry for a unified virtual
//! filesystem over heterogeneous backends.
//!
//! Callers address everything through an opaque [`StorableId`]; the
//! [`Registry`] resolves it through protocol handlers, mounts, the alias
//! engine, and the storable cache to a materialized [`Storable`].

mod alias;
mod cache;

pub mod archive;
pub mod error;
pub mod handler;
pub mod mount;
pub mod registry;
pub mod storable;

pub use error::{CoreError, CoreResult};
pub use handler::ProtocolHandler;
pub use mount::{MountConfig, MountSummary, MountType, Settings};
pub use registry::Registry;
pub use storable::{DriveInfo, FileStorable, FolderStorable, Storable, StorableId, StorableNode};
