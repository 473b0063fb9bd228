//! Bare `.gz` files: per the classification table these are a writable
//! "archive" of exactly one entry (the decompressed payload) rather
//! than a multi-file container.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::CoreResult;

use super::state::{new_flat_archive, ArchiveEntry, FlatArchive};

fn inner_name(filename: &str) -> String {
    filename.strip_suffix(".gz").unwrap_or(filename).to_string()
}

pub fn decode(filename: &str, bytes: &[u8]) -> CoreResult<FlatArchive> {
    let map = new_flat_archive();
    if bytes.is_empty() {
        return Ok(map);
    }
    let mut data = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut data)?;
    map.insert(inner_name(filename), ArchiveEntry { is_dir: false, data });
    Ok(map)
}

pub fn encode(filename: &str, map: &FlatArchive) -> CoreResult<Vec<u8>> {
    let data = map.get(&inner_name(filename)).map(|e| e.data.clone()).unwrap_or_default();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&data)?;
    Ok(encoder.finish()?)
}
