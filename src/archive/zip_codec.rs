//! Zip codec: the writable half of the archive classification table that
//! actually needs a zip reader/writer, backed by the `zip` crate.

use std::io::{Cursor, Read, Write};

use crate::error::{CoreError, CoreResult};

use super::state::{new_flat_archive, ArchiveEntry, FlatArchive};

fn zip_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Io { source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()) }
}

pub fn decode(bytes: &[u8]) -> CoreResult<FlatArchive> {
    let map = new_flat_archive();
    if bytes.is_empty() {
        return Ok(map);
    }
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(zip_err)?;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(zip_err)?;
        let name = file.name().trim_end_matches('/').to_string();
        if file.is_dir() {
            map.insert(name, ArchiveEntry { is_dir: true, data: Vec::new() });
        } else {
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            map.insert(name, ArchiveEntry { is_dir: false, data });
        }
    }
    Ok(map)
}

pub fn encode(map: &FlatArchive) -> CoreResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options: zip::write::FileOptions =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in map.iter() {
            let path = entry.key();
            if entry.is_dir {
                writer.add_directory(format!("{path}/"), options).map_err(zip_err)?;
            } else {
                writer.start_file(path.clone(), options).map_err(zip_err)?;
                writer.write_all(&entry.data)?;
            }
        }
        writer.finish().map_err(zip_err)?;
    }
    Ok(cursor.into_inner())
}
