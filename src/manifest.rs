//! Ingestion manifest persistence.
//!
//! The manifest records, per source filename, the content hash and chunk
//! count at the last successful ingestion. It is read at the start of every
//! run to decide skip/update and written after each source commits. On-disk
//! shape: `{"files": {filename: {"hash": hex, "chunks": n}}}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// State of one source at its last successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// SHA-256 hex digest of the source file's content.
    pub hash: String,
    /// Number of chunks written for the source.
    pub chunks: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    files: BTreeMap<String, ManifestEntry>,
}

/// Load the manifest from `dir`. A missing file is a first run and yields
/// an empty map; an unreadable or unparseable file is a hard error.
pub fn load(dir: &Path) -> Result<BTreeMap<String, ManifestEntry>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| Error::Manifest {
        path: path.clone(),
        detail: e.to_string(),
    })?;

    let parsed: ManifestFile = serde_json::from_str(&contents).map_err(|e| Error::Manifest {
        path,
        detail: e.to_string(),
    })?;

    Ok(parsed.files)
}

/// Write the manifest to `dir`, creating the directory if needed.
pub fn save(dir: &Path, files: &BTreeMap<String, ManifestEntry>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let manifest = ManifestFile {
        files: files.clone(),
    };
    let body = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(dir.join(MANIFEST_FILE), body)?;
    Ok(())
}
