//! Core data types flowing through the indexing and retrieval pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A corpus file discovered on disk. Sources are identified by filename;
/// the file's content hash decides whether it needs re-ingestion.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub filename: String,
    pub path: PathBuf,
}

/// A chunk plus its embedding, as persisted in the vector store.
///
/// Exactly one live record exists per chunk; stale records for a changed
/// source are deleted before new ones are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Deterministic id: `"{source}:::{page}:::{seq}"`.
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub embedding: Vec<f32>,
}

/// A record returned from a vector-store query, ranked by cosine distance
/// (smaller is closer). The stored embedding rides along so the retrieval
/// engine can diversify the candidate pool without another store round-trip.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    pub distance: f32,
}

/// A transient retrieval result.
///
/// `score` semantics depend on the stage that produced the hit: cosine
/// similarity from the vector stage, BM25 score from the lexical stage, or
/// a reranker logit after reranking. Scores are used only for ordering
/// within their own stage and are never compared numerically across stages.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub chunk_id: String,
    pub score: f32,
}

/// The final synthesized answer.
///
/// `sources` is the sorted set of distinct source filenames among the
/// original retrieved hits: real documents, even when evidence compression
/// replaced the passages used for generation.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
    pub passages: Vec<Hit>,
}

/// Outcome of one ingestion run, produced for the serving layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub added_files: usize,
    pub updated_files: usize,
    pub skipped_files: usize,
    pub vectors: usize,
    pub sources: Vec<String>,
}

/// Outcome of one query, produced for the serving layer.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<String>,
    pub passages: Vec<Hit>,
    pub retrieved: usize,
}
