//! Incremental index construction.
//!
//! The builder diffs the corpus against the manifest by content hash and
//! re-embeds only sources whose hash changed. Per source: stale records are
//! deleted first, pages are re-chunked, all chunk texts go to the embedding
//! provider in one batch, all records are written in one batch, and only
//! then is the manifest entry committed; a failure partway through leaves
//! the manifest untouched so a retry re-attempts the full re-embedding.
//! Failures are per-source and never abort the rest of the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chunk::chunk_page;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::manifest::{self, ManifestEntry};
use crate::models::{IndexRecord, IngestStats, SourceFile};
use crate::sources::{read_pages, scan_corpus, sha256_file};
use crate::store::VectorStore;

pub const LOCK_FILE: &str = ".ingest.lock";

/// Deterministic chunk identity: source name, page index, sequence within
/// the page. Stable across re-ingestion as long as segmentation is
/// unchanged.
pub fn chunk_id(source: &str, page: u32, seq: usize) -> String {
    format!("{source}:::{page}:::{seq}")
}

/// Advisory lock held for the duration of one ingestion run. The store and
/// manifest are single-writer; concurrent runs fail fast instead of
/// interleaving writes.
struct IngestLock {
    path: PathBuf,
}

impl IngestLock {
    fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::IndexLocked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for IngestLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

enum SourceOutcome {
    Added,
    Updated,
    Skipped,
}

/// Drives ingestion of the corpus into the vector store.
pub struct IndexBuilder<'a> {
    config: &'a Config,
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a Config, embedder: &'a dyn Embedder, store: &'a dyn VectorStore) -> Self {
        Self {
            config,
            embedder,
            store,
        }
    }

    /// Ingest the full corpus, returning run statistics.
    ///
    /// Sources are processed in sorted filename order. An empty corpus is
    /// fatal only when there is zero prior state; with an existing manifest
    /// it returns all-zero stats and leaves the index untouched.
    pub fn build_index(&self) -> Result<IngestStats> {
        let _lock = IngestLock::acquire(&self.config.index.dir)?;

        let mut entries = manifest::load(&self.config.index.dir)?;
        let files = scan_corpus(&self.config.corpus)?;

        if files.is_empty() {
            if entries.is_empty() {
                return Err(Error::Corpus(format!(
                    "no documents found in {}",
                    self.config.corpus.root.display()
                )));
            }
            warn!(
                corpus = %self.config.corpus.root.display(),
                "no documents found; leaving existing index untouched"
            );
            return Ok(IngestStats {
                vectors: self.store.count()?,
                sources: entries.keys().cloned().collect(),
                ..IngestStats::default()
            });
        }

        let mut stats = IngestStats::default();

        for file in &files {
            match self.ingest_source(file, &mut entries) {
                Ok(SourceOutcome::Added) => stats.added_files += 1,
                Ok(SourceOutcome::Updated) => stats.updated_files += 1,
                Ok(SourceOutcome::Skipped) => stats.skipped_files += 1,
                Err(err) => {
                    warn!(
                        source = %file.filename,
                        error = %err,
                        "source failed to ingest; manifest entry left unchanged"
                    );
                }
            }
        }

        stats.vectors = self.store.count()?;
        stats.sources = entries.keys().cloned().collect();

        info!(
            added = stats.added_files,
            updated = stats.updated_files,
            skipped = stats.skipped_files,
            vectors = stats.vectors,
            "ingestion run complete"
        );

        Ok(stats)
    }

    fn ingest_source(
        &self,
        file: &SourceFile,
        entries: &mut BTreeMap<String, ManifestEntry>,
    ) -> Result<SourceOutcome> {
        let hash = sha256_file(&file.path)?;

        if let Some(entry) = entries.get(&file.filename) {
            if entry.hash == hash {
                // Unchanged content: existing records stay untouched.
                return Ok(SourceOutcome::Skipped);
            }
        }
        let had_entry = entries.contains_key(&file.filename);

        // Drop the old generation before writing the new one. Idempotent
        // for first-time sources.
        self.store.delete_source(&file.filename)?;

        let pages = read_pages(&file.path)?;
        let mut records = Vec::new();
        for (page, text) in &pages {
            let fragments = chunk_page(
                text,
                *page,
                self.config.chunking.target_tokens,
                self.config.chunking.overlap_tokens,
            );
            for (seq, fragment) in fragments.into_iter().enumerate() {
                records.push(IndexRecord {
                    chunk_id: chunk_id(&file.filename, *page, seq),
                    text: fragment.text,
                    source: file.filename.clone(),
                    page: Some(*page),
                    embedding: Vec::new(),
                });
            }
        }

        if records.is_empty() {
            return Err(Error::Corpus(format!(
                "no extractable text in {}",
                file.filename
            )));
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts)?;
        if embeddings.len() != records.len() {
            return Err(Error::InvalidResponse {
                provider: "embedding",
                detail: format!(
                    "expected {} vectors, got {}",
                    records.len(),
                    embeddings.len()
                ),
            });
        }
        for (record, embedding) in records.iter_mut().zip(embeddings) {
            record.embedding = embedding;
        }

        let chunk_count = records.len();
        self.store.upsert(records)?;

        // Commit the manifest only after the store write succeeded.
        entries.insert(file.filename.clone(), ManifestEntry { hash, chunks: chunk_count });
        manifest::save(&self.config.index.dir, entries)?;

        info!(source = %file.filename, chunks = chunk_count, "indexed source");

        Ok(if had_entry {
            SourceOutcome::Updated
        } else {
            SourceOutcome::Added
        })
    }
}
