//! Tar/tar.gz codec, pairing the `tar` and `flate2` crates the same way
//! the pack's own content-addressed-store code does for archiving build
//! outputs.

use std::io::{Cursor, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CoreResult;

use super::state::{new_flat_archive, ArchiveEntry, FlatArchive};

pub fn decode(bytes: &[u8], gzip: bool) -> CoreResult<FlatArchive> {
    let map = new_flat_archive();
    if bytes.is_empty() {
        return Ok(map);
    }
    let cursor = Cursor::new(bytes);
    if gzip {
        decode_entries(tar::Archive::new(GzDecoder::new(cursor)), &map)?;
    } else {
        decode_entries(tar::Archive::new(cursor), &map)?;
    }
    Ok(map)
}

fn decode_entries<R: Read>(mut archive: tar::Archive<R>, map: &FlatArchive) -> CoreResult<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().trim_end_matches('/').to_string();
        if entry.header().entry_type().is_dir() {
            map.insert(path, ArchiveEntry { is_dir: true, data: Vec::new() });
        } else {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            map.insert(path, ArchiveEntry { is_dir: false, data });
        }
    }
    Ok(())
}

pub fn encode(map: &FlatArchive, gzip: bool) -> CoreResult<Vec<u8>> {
    if gzip {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        write_entries(&mut builder, map)?;
        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    } else {
        let mut builder = tar::Builder::new(Vec::new());
        write_entries(&mut builder, map)?;
        Ok(builder.into_inner()?)
    }
}

fn write_entries<W: Write>(builder: &mut tar::Builder<W>, map: &FlatArchive) -> CoreResult<()> {
    for entry in map.iter() {
        let path = entry.key();
        let mut header = tar::Header::new_gnu();
        header.set_mtime(0);
        header.set_mode(0o644);
        if entry.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            builder.append_data(&mut header, format!("{path}/"), std::io::empty())?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, path.clone(), entry.data.as_slice())?;
        }
    }
    Ok(())
}
