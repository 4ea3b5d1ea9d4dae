use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{Error, Result};
use crate::models::SourceFile;

/// Page separator in extracted plain text (form feed).
const PAGE_BREAK: char = '\u{0c}';

/// Discover corpus files under the configured root, in sorted filename
/// order for reproducible ingestion.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<SourceFile>> {
    let root = &config.root;
    if !root.exists() {
        return Err(Error::Corpus(format!(
            "corpus directory does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Corpus(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(rel_str);

        files.push(SourceFile {
            filename,
            path: path.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(files)
}

/// Read a source as page-indexed plain text. Pages are separated by form
/// feeds; a file without separators is a single page 0.
pub fn read_pages(path: &Path) -> Result<Vec<(u32, String)>> {
    let body = std::fs::read_to_string(path)?;
    Ok(body
        .split(PAGE_BREAK)
        .enumerate()
        .map(|(i, text)| (i as u32, text.to_string()))
        .collect())
}

/// Streaming SHA-256 hex digest of a file's content.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|e| Error::Config(format!("bad glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("bad glob set: {e}")))
}
