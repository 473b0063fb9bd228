//! Flat, in-memory representation shared by every archive codec: a map
//! from full in-archive path to its bytes (or, for directories, an empty
//! marker). Listing a "folder" inside the archive means scanning this map
//! for paths under a given prefix, the same shape `MemoryFolder` uses for
//! the synthetic `memory://` tree.

use std::collections::BTreeMap;

use dashmap::DashMap;

#[derive(Clone, Default)]
pub struct ArchiveEntry {
    pub is_dir: bool,
    pub data: Vec<u8>,
}

pub type FlatArchive = DashMap<String, ArchiveEntry>;

pub fn new_flat_archive() -> FlatArchive {
    DashMap::new()
}

/// Direct children of `prefix` (`""` for the archive root), each paired
/// with whether it is itself a directory.
pub fn children_of(archive: &FlatArchive, prefix: &str) -> Vec<(String, bool)> {
    let prefix_with_slash = if prefix.is_empty() { String::new() } else { format!("{prefix}/") };
    let mut seen: BTreeMap<String, bool> = BTreeMap::new();
    for entry in archive.iter() {
        let path = entry.key();
        let Some(rest) = path.strip_prefix(prefix_with_slash.as_str()) else { continue };
        if rest.is_empty() {
            continue;
        }
        match rest.split_once('/') {
            Some((head, _)) => {
                seen.insert(head.to_string(), true);
            }
            None => {
                seen.entry(rest.to_string()).or_insert(entry.is_dir);
            }
        }
    }
    seen.into_iter().collect()
}
