//! Dataset files
//!
//! ```text
//! +----------+------------------+------------------------------------+
//! | magic(8) | sha256(32)       | gzip(bincode(DataSetFile))         |
//! +----------+------------------+------------------------------------+
//! ```
//!
//! The checksum covers the compressed payload. Files are written through a
//! temporary file and renamed into place.

use crate::{Error, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tonematch_core::{DataSet, Layout, Point};
use tracing::{debug, info};

const MAGIC: &[u8; 8] = b"TMDSET\x00\x01";
const CHECKSUM_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + CHECKSUM_LEN;
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct DataSetFile {
    version: u32,
    name: String,
    layout: Layout,
    points: Vec<Point>,
}

/// Load a dataset written by [`save_dataset`]
///
/// Any decoding failure, checksum mismatch or layout inconsistency is reported
/// as [`tonematch_core::Error::CorruptData`].
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DataSet> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::corrupt(path, "not a dataset file"));
    }
    let (checksum, payload) = bytes[MAGIC.len()..].split_at(CHECKSUM_LEN);
    if Sha256::digest(payload).as_slice() != checksum {
        return Err(Error::corrupt(path, "checksum mismatch"));
    }

    let mut raw = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut raw)
        .map_err(|e| Error::corrupt(path, e))?;
    let file: DataSetFile = bincode::deserialize(&raw).map_err(|e| Error::corrupt(path, e))?;
    if file.version != FORMAT_VERSION {
        return Err(Error::corrupt(path, format!("unsupported version {}", file.version)));
    }

    let layout = Layout::new(file.layout.descriptors().to_vec()).map_err(|e| Error::corrupt(path, e))?;
    if layout != file.layout {
        return Err(Error::corrupt(path, "layout descriptors are not sorted"));
    }
    let dataset = DataSet::from_parts(file.name, layout, file.points).map_err(|e| Error::corrupt(path, e))?;
    debug!(path = %path.display(), points = dataset.len(), "loaded dataset");
    Ok(dataset)
}

/// Save a dataset, replacing any existing file
///
/// A dataset without points is not written and `false` is returned.
pub fn save_dataset(dataset: &DataSet, path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if dataset.is_empty() {
        info!(dataset = dataset.name(), path = %path.display(), "dataset is empty, not saved");
        return Ok(false);
    }

    let file = DataSetFile {
        version: FORMAT_VERSION,
        name: dataset.name().to_string(),
        layout: dataset.layout().clone(),
        points: dataset.points().to_vec(),
    };
    let raw = bincode::serialize(&file)
        .map_err(|e| tonematch_core::Error::Serialization(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let payload = encoder.finish()?;
    let checksum = Sha256::digest(&payload);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(MAGIC)?;
            f.write_all(&checksum)?;
            f.write_all(&payload)
        })
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })?;

    debug!(
        dataset = dataset.name(),
        path = %path.display(),
        points = dataset.len(),
        bytes = HEADER_LEN + payload.len(),
        "saved dataset"
    );
    Ok(true)
}
