//! Vector store interface and implementations.
//!
//! [`VectorStore`] covers the five operations the pipeline needs: batch
//! upsert, delete-by-source, nearest-neighbor query, full scan, and count.
//! The index builder is the sole mutator; the retrieval engine only reads.
//!
//! Two implementations ship with the crate:
//! - [`InMemoryVectorStore`]: brute-force cosine search, for tests and
//!   small transient corpora.
//! - [`FileVectorStore`]: the in-memory store persisted as JSON under the
//!   index directory, loaded at open and saved after each mutation.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{IndexRecord, ScoredRecord};

pub const STORE_FILE: &str = "vectors.json";

/// Abstract vector store holding one record per live chunk.
pub trait VectorStore: Send + Sync {
    /// Insert records, replacing any existing record with the same chunk id.
    fn upsert(&self, records: Vec<IndexRecord>) -> Result<()>;

    /// Delete every record whose `source` matches.
    fn delete_source(&self, source: &str) -> Result<()>;

    /// Top `top_n` records by cosine distance to `vector`, closest first.
    fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredRecord>>;

    /// Every stored record.
    fn get_all(&self) -> Result<Vec<IndexRecord>>;

    /// Number of stored records.
    fn count(&self) -> Result<usize>;
}

fn rank_by_distance(records: &[IndexRecord], vector: &[f32], top_n: usize) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .iter()
        .map(|record| ScoredRecord {
            distance: 1.0 - cosine_similarity(vector, &record.embedding),
            record: record.clone(),
        })
        .collect();
    scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);
    scored
}

fn replace_records(existing: &mut Vec<IndexRecord>, incoming: Vec<IndexRecord>) {
    existing.retain(|r| !incoming.iter().any(|n| n.chunk_id == r.chunk_id));
    existing.extend(incoming);
}

// ============ In-memory store ============

/// Brute-force in-memory store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        replace_records(&mut stored, records);
        Ok(())
    }

    fn delete_source(&self, source: &str) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        stored.retain(|r| r.source != source);
        Ok(())
    }

    fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().unwrap();
        Ok(rank_by_distance(&stored, vector, top_n))
    }

    fn get_all(&self) -> Result<Vec<IndexRecord>> {
        Ok(self.records.read().unwrap().clone())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap().len())
    }
}

// ============ File-backed store ============

/// JSON-file-backed store scoped to one index directory.
pub struct FileVectorStore {
    path: PathBuf,
    records: RwLock<Vec<IndexRecord>>,
}

impl FileVectorStore {
    /// Open (or create) the store under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let records = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    fn persist(&self, records: &[IndexRecord]) -> Result<()> {
        let body = serde_json::to_string(records)?;
        std::fs::write(&self.path, body)?;
        Ok(())
    }
}

impl VectorStore for FileVectorStore {
    fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        replace_records(&mut stored, records);
        self.persist(&stored)
    }

    fn delete_source(&self, source: &str) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        stored.retain(|r| r.source != source);
        self.persist(&stored)
    }

    fn query(&self, vector: &[f32], top_n: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().unwrap();
        Ok(rank_by_distance(&stored, vector, top_n))
    }

    fn get_all(&self) -> Result<Vec<IndexRecord>> {
        Ok(self.records.read().unwrap().clone())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chunk_id: &str, source: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            chunk_id: chunk_id.to_string(),
            text: format!("text of {chunk_id}"),
            source: source.to_string(),
            page: Some(0),
            embedding,
        }
    }

    #[test]
    fn upsert_replaces_same_chunk_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![record("a:::0:::0", "a", vec![1.0, 0.0])])
            .unwrap();
        store
            .upsert(vec![record("a:::0:::0", "a", vec![0.0, 1.0])])
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get_all().unwrap()[0].embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn delete_source_removes_only_that_source() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                record("a:::0:::0", "a.pdf", vec![1.0, 0.0]),
                record("a:::0:::1", "a.pdf", vec![1.0, 0.0]),
                record("b:::0:::0", "b.pdf", vec![0.0, 1.0]),
            ])
            .unwrap();

        store.delete_source("a.pdf").unwrap();

        let remaining = store.get_all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source, "b.pdf");
    }

    #[test]
    fn delete_missing_source_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.delete_source("never-ingested.pdf").unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn query_ranks_by_distance() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                record("far", "x", vec![0.0, 1.0]),
                record("near", "x", vec![1.0, 0.0]),
                record("mid", "x", vec![0.7, 0.7]),
            ])
            .unwrap();

        let results = store.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.chunk_id, "near");
        assert_eq!(results[1].record.chunk_id, "mid");
        assert!(results[0].distance < results[1].distance);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        {
            let store = FileVectorStore::open(tmp.path()).unwrap();
            store
                .upsert(vec![record("a:::0:::0", "a.pdf", vec![1.0, 0.0])])
                .unwrap();
        }

        let reopened = FileVectorStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.get_all().unwrap()[0].chunk_id, "a:::0:::0");
    }
}
