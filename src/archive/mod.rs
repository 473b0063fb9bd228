//! Archive Mount Adapter (spec §4.E): presents an archive *file* as a
//! writable or read-only *folder*, with a deferred flush-on-disposal
//! write-back stream for the writable case.

mod gz_single;
mod state;
mod tar_codec;
mod zip_codec;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{CoreError, CoreResult};
use crate::storable::{FileStorable, FolderStorable, Storable, StorableId, StorableNode};

use state::FlatArchive;

/// Writable extensions actually decode/encode through a linked codec.
/// Read-only extensions are classified correctly (affecting `mount_type`
/// decisions and error messages) but their codec (rar/7z/xz/bz2) is an
/// external collaborator this crate does not vendor; opening one reports
/// `Unavailable` rather than silently misreading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveClass {
    Writable,
    ReadOnly,
}

const CLASSIFICATION: &[(&str, ArchiveClass)] = &[
    (".tar.gz", ArchiveClass::Writable),
    (".tar.bz2", ArchiveClass::ReadOnly),
    (".tar.xz", ArchiveClass::ReadOnly),
    (".tgz", ArchiveClass::Writable),
    (".txz", ArchiveClass::ReadOnly),
    (".tbz2", ArchiveClass::ReadOnly),
    (".zip", ArchiveClass::Writable),
    (".tar", ArchiveClass::Writable),
    (".gz", ArchiveClass::Writable),
    (".rar", ArchiveClass::ReadOnly),
    (".7z", ArchiveClass::ReadOnly),
    (".bz2", ArchiveClass::ReadOnly),
];

/// Longest-suffix match wins (`.tar.gz` over `.gz`).
pub fn classify(filename: &str) -> Option<ArchiveClass> {
    let lower = filename.to_lowercase();
    CLASSIFICATION
        .iter()
        .filter(|(suffix, _)| lower.ends_with(suffix))
        .max_by_key(|(suffix, _)| suffix.len())
        .map(|(_, class)| *class)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Zip,
    Tar,
    TarGz,
    Gz,
}

fn codec_for(filename: &str) -> Option<Codec> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Some(Codec::TarGz)
    } else if lower.ends_with(".tar") {
        Some(Codec::Tar)
    } else if lower.ends_with(".zip") {
        Some(Codec::Zip)
    } else if lower.ends_with(".gz") {
        Some(Codec::Gz)
    } else {
        None
    }
}

fn decode_bytes(filename: &str, bytes: &[u8]) -> CoreResult<FlatArchive> {
    match codec_for(filename) {
        Some(Codec::Zip) => zip_codec::decode(bytes),
        Some(Codec::Tar) => tar_codec::decode(bytes, false),
        Some(Codec::TarGz) => tar_codec::decode(bytes, true),
        Some(Codec::Gz) => gz_single::decode(filename, bytes),
        None => Err(CoreError::Unavailable(format!(
            "no archive codec linked for '{filename}' (read-only formats like rar/7z/xz/bz2 are \
             classified but not decoded by this crate)"
        ))),
    }
}

fn encode_bytes(filename: &str, state: &FlatArchive) -> CoreResult<Vec<u8>> {
    match codec_for(filename) {
        Some(Codec::Zip) => zip_codec::encode(state),
        Some(Codec::Tar) => tar_codec::encode(state, false),
        Some(Codec::TarGz) => tar_codec::encode(state, true),
        Some(Codec::Gz) => gz_single::encode(filename, state),
        None => Err(CoreError::Unavailable(format!("no archive codec linked for '{filename}'"))),
    }
}

/// The backing buffer plus the write-back policy described in spec §4.E:
/// mutations accumulate in `buffer` until `dispose` triggers one atomic
/// rewrite of `path`. This is the "delegated-disposal stream".
struct ArchiveBacking {
    path: PathBuf,
    filename: String,
    buffer: AsyncMutex<Vec<u8>>,
}

/// Presents an archive file on disk as a folder view.
///
/// `ArchiveMountAdapter::mount` is the single entry point: it classifies
/// the extension, reads the current bytes (or starts empty if the file
/// doesn't exist yet), and returns either a read-only or writable folder.
pub struct ArchiveMountAdapter;

impl ArchiveMountAdapter {
    pub async fn mount(path: PathBuf, parent_modifiable: bool) -> CoreResult<Storable> {
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let class = classify(&filename).ok_or_else(|| {
            CoreError::unsupported(format!("'{filename}' has no recognized archive extension"))
        })?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CoreError::from(e)),
        };

        let writable = matches!(class, ArchiveClass::Writable) && parent_modifiable;
        let flat = Arc::new(decode_bytes(&filename, &bytes)?);

        let backing = if writable {
            Some(Arc::new(ArchiveBacking {
                path,
                filename: filename.clone(),
                buffer: AsyncMutex::new(bytes),
            }))
        } else {
            None
        };

        Ok(Storable::Folder(Arc::new(ArchiveFolder {
            state: flat,
            prefix: String::new(),
            name: filename,
            writable,
            backing,
        })))
    }
}

pub struct ArchiveFolder {
    state: Arc<FlatArchive>,
    prefix: String,
    name: String,
    writable: bool,
    backing: Option<Arc<ArchiveBacking>>,
}

impl StorableNode for ArchiveFolder {
    fn id(&self) -> StorableId {
        StorableId::new(format!("archive-entry:{}", self.prefix))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FolderStorable for ArchiveFolder {
    fn is_modifiable(&self) -> bool {
        self.writable
    }

    async fn list_children(&self) -> CoreResult<Vec<Storable>> {
        let mut out = Vec::new();
        for (name, is_dir) in state::children_of(&self.state, &self.prefix) {
            let child_prefix =
                if self.prefix.is_empty() { name.clone() } else { format!("{}/{name}", self.prefix) };
            if is_dir {
                out.push(Storable::Folder(Arc::new(ArchiveFolder {
                    state: self.state.clone(),
                    prefix: child_prefix,
                    name,
                    writable: self.writable,
                    backing: self.backing.clone(),
                })));
            } else {
                out.push(Storable::File(Arc::new(ArchiveFile {
                    state: self.state.clone(),
                    path: child_prefix,
                    name,
                    writable: self.writable,
                })));
            }
        }
        Ok(out)
    }

    async fn create_file(&self, name: &str) -> CoreResult<Storable> {
        if !self.writable {
            return Err(CoreError::unsupported(format!("'{}' is read-only", self.name)));
        }
        let path = if self.prefix.is_empty() { name.to_string() } else { format!("{}/{name}", self.prefix) };
        self.state.insert(path.clone(), state::ArchiveEntry { is_dir: false, data: Vec::new() });
        Ok(Storable::File(Arc::new(ArchiveFile {
            state: self.state.clone(),
            path,
            name: name.to_string(),
            writable: true,
        })))
    }

    async fn create_folder(&self, name: &str) -> CoreResult<Storable> {
        if !self.writable {
            return Err(CoreError::unsupported(format!("'{}' is read-only", self.name)));
        }
        let path = if self.prefix.is_empty() { name.to_string() } else { format!("{}/{name}", self.prefix) };
        self.state.insert(path.clone(), state::ArchiveEntry { is_dir: true, data: Vec::new() });
        Ok(Storable::Folder(Arc::new(ArchiveFolder {
            state: self.state.clone(),
            prefix: path,
            name: name.to_string(),
            writable: true,
            backing: self.backing.clone(),
        })))
    }

    async fn delete(&self, name: &str) -> CoreResult<()> {
        if !self.writable {
            return Err(CoreError::unsupported(format!("'{}' is read-only", self.name)));
        }
        let path = if self.prefix.is_empty() { name.to_string() } else { format!("{}/{name}", self.prefix) };
        let prefix_with_slash = format!("{path}/");
        self.state.retain(|key, _| *key != path && !key.starts_with(&prefix_with_slash));
        Ok(())
    }

    /// Re-encodes the whole archive and stores it in the backing buffer.
    /// Mutations made through any nested folder view are visible here
    /// since every view shares the same `state` map.
    async fn flush(&self) -> CoreResult<()> {
        let Some(backing) = &self.backing else { return Ok(()) };
        let encoded = encode_bytes(&backing.filename, &self.state)?;
        *backing.buffer.lock().await = encoded;
        Ok(())
    }

    /// Copies the backing buffer back to the real file, truncating it
    /// first. Spawned onto its own task so that dropping the caller's
    /// future (the ordinary way tokio cancels an `async fn` mid-await)
    /// cannot interrupt the write partway through and leave a truncated
    /// archive on disk. Spec §5 requires cancellation to go unhonored
    /// once write-back begins.
    async fn dispose(&self) -> CoreResult<()> {
        let Some(backing) = self.backing.clone() else { return Ok(()) };
        let write = tokio::spawn(async move {
            let buffer = backing.buffer.lock().await;
            tokio::fs::write(&backing.path, buffer.as_slice()).await
        });
        write.await.map_err(|e| CoreError::Io { source: std::io::Error::other(e) })??;
        Ok(())
    }
}

pub struct ArchiveFile {
    state: Arc<FlatArchive>,
    path: String,
    name: String,
    writable: bool,
}

impl StorableNode for ArchiveFile {
    fn id(&self) -> StorableId {
        StorableId::new(format!("archive-entry:{}", self.path))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl FileStorable for ArchiveFile {
    fn is_modifiable(&self) -> bool {
        self.writable
    }

    async fn read_bytes(&self) -> CoreResult<Vec<u8>> {
        self.state.get(&self.path).map(|e| e.data.clone()).ok_or_else(|| CoreError::not_found(&self.path))
    }

    async fn write_bytes(&self, data: &[u8]) -> CoreResult<()> {
        if !self.writable {
            return Err(CoreError::unsupported(format!("'{}' is read-only", self.name)));
        }
        self.state.insert(self.path.clone(), state::ArchiveEntry { is_dir: false, data: data.to_vec() });
        Ok(())
    }
}
