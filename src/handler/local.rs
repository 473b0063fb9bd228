//! `local-file` and `mfs` built-ins: both are browsable views over a real
//! directory on disk, distinguished only by scheme name and root path.
//! Kept as one implementation (`LocalDirHandler`) the way the teacher
//! reuses a single `Vfs` impl shape across backends rather than forking
//! code per scheme.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use crate::error::{CoreError, CoreResult};
use crate::storable::{DriveInfo, FileStorable, FolderStorable, Storable, StorableId, StorableNode};

use super::ProtocolHandler;

/// A browsable, disk-backed handler. `local-file` and `mfs` are both
/// instances of this with different `scheme`/`root` values.
pub struct LocalDirHandler {
    scheme: String,
    root: PathBuf,
}

impl LocalDirHandler {
    pub fn new(scheme: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { scheme: scheme.into(), root: root.into() }
    }

    fn resolve_path(&self, root_uri: &StorableId) -> CoreResult<PathBuf> {
        if !root_uri.is_root_of(&self.scheme) {
            return Err(CoreError::invalid_argument(format!(
                "'{}' is not a root uri for scheme '{}'",
                root_uri, self.scheme
            )));
        }
        Ok(self.root.clone())
    }
}

#[async_trait]
impl ProtocolHandler for LocalDirHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn has_browsable_root(&self) -> bool {
        true
    }

    async fn create_root(&self, root_uri: &StorableId) -> CoreResult<Storable> {
        let path = self.resolve_path(root_uri)?;
        let meta = fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::not_found(path.display()),
            _ => CoreError::from(e),
        })?;
        if !meta.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "root '{}' is not a directory",
                path.display()
            )));
        }
        Ok(Storable::Folder(Arc::new(LocalFolder {
            path: path.clone(),
            // The root's id() must report its real native path (e.g. "/"),
            // not the "scheme://" alias, so the alias engine's builtin-root
            // substitution (spec §4.C) has a working native id to key off.
            native_path: Some(path),
            name: format!("{}://", self.scheme),
        })))
    }

    fn create_child_id(&self, parent_id: &StorableId, child_name: &str) -> StorableId {
        let tail = parent_id.tail().unwrap_or("");
        let tail = tail.trim_end_matches('/');
        if tail.is_empty() {
            StorableId::new(format!("{}://{}", self.scheme, child_name))
        } else {
            StorableId::new(format!("{}://{}/{}", self.scheme, tail, child_name))
        }
    }

    async fn drive_info(&self, root_uri: &StorableId) -> CoreResult<Option<DriveInfo>> {
        let path = self.resolve_path(root_uri)?;
        let exists = fs::metadata(&path).await.is_ok();
        Ok(Some(DriveInfo {
            id: format!("{}://", self.scheme),
            name: self.scheme.clone(),
            type_: "Fixed".to_string(),
            drive_type: "Directory".to_string(),
            is_ready: exists,
            total_size: DriveInfo::UNKNOWN_SIZE,
            available_free_space: DriveInfo::UNKNOWN_SIZE,
        }))
    }
}

/// A real directory on disk, reachable either through a `local-file`/`mfs`
/// alias or directly by its native filesystem path.
pub struct LocalFolder {
    pub path: PathBuf,
    /// Its real native filesystem path, always populated. `id()` returns
    /// this rather than the scheme alias, so a browsable root's id is a
    /// usable prefix for the alias engine's substitution.
    pub native_path: Option<PathBuf>,
    pub name: String,
}

impl LocalFolder {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "/".into());
        Self { path: path.clone(), native_path: Some(path), name }
    }

    fn effective_id(&self) -> StorableId {
        match &self.native_path {
            Some(p) => StorableId::new(p.to_string_lossy().into_owned()),
            None => StorableId::new(self.name.clone()),
        }
    }
}

impl StorableNode for LocalFolder {
    fn id(&self) -> StorableId {
        self.effective_id()
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FolderStorable for LocalFolder {
    fn is_modifiable(&self) -> bool {
        true
    }

    async fn list_children(&self) -> CoreResult<Vec<Storable>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                out.push(Storable::Folder(Arc::new(LocalFolder::at_path(path))));
            } else {
                out.push(Storable::File(Arc::new(LocalFile::at_path(path))));
            }
        }
        Ok(out)
    }

    async fn create_file(&self, name: &str) -> CoreResult<Storable> {
        let path = self.path.join(name);
        fs::File::create(&path).await?;
        Ok(Storable::File(Arc::new(LocalFile::at_path(path))))
    }

    async fn create_folder(&self, name: &str) -> CoreResult<Storable> {
        let path = self.path.join(name);
        fs::create_dir(&path).await?;
        Ok(Storable::Folder(Arc::new(LocalFolder::at_path(path))))
    }

    async fn delete(&self, name: &str) -> CoreResult<()> {
        let path = self.path.join(name);
        let meta = fs::metadata(&path).await?;
        if meta.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
}

impl LocalFile {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self { path, name }
    }
}

impl StorableNode for LocalFile {
    fn id(&self) -> StorableId {
        StorableId::new(self.path.to_string_lossy().into_owned())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FileStorable for LocalFile {
    fn is_modifiable(&self) -> bool {
        true
    }

    async fn read_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(fs::read(&self.path).await?)
    }

    async fn write_bytes(&self, data: &[u8]) -> CoreResult<()> {
        fs::write(&self.path, data).await?;
        Ok(())
    }
}

/// Probes a bare (non-scheme) path directly against the local filesystem,
/// used by the storable cache's step 4 ("probe local filesystem").
pub async fn probe_path(path: &Path) -> CoreResult<Option<Storable>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(Some(Storable::Folder(Arc::new(LocalFolder::at_path(path))))),
        Ok(_) => Ok(Some(Storable::File(Arc::new(LocalFile::at_path(path))))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::from(e)),
    }
}
