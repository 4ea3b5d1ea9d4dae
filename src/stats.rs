//! Corpus and index statistics.
//!
//! A quick summary of what is on disk and what is indexed, for the serving
//! layer's stats endpoint. Unlike ingestion, an empty or missing corpus is
//! reported as empty here, never an error.

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::sources::scan_corpus;
use crate::store::VectorStore;

/// One corpus file and its size in bytes.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub bytes: u64,
}

/// Corpus listing plus the vector store's record count.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub documents: Vec<DocumentInfo>,
    pub vectors: usize,
}

/// Summarize the corpus directory and the index.
pub fn corpus_stats(config: &Config, store: &dyn VectorStore) -> Result<CorpusStats> {
    let documents = if config.corpus.root.exists() {
        scan_corpus(&config.corpus)?
            .into_iter()
            .map(|file| {
                let bytes = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
                DocumentInfo {
                    filename: file.filename,
                    bytes,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(CorpusStats {
        documents,
        vectors: store.count()?,
    })
}
