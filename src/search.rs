use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::Config;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::lexical::{tokenize, Bm25Index};
use crate::models::{Hit, IndexRecord, ScoredRecord};
use crate::rerank::Reranker;
use crate::store::VectorStore;

/// Lower bound on the vector-stage candidate pool.
const PREFETCH_FLOOR: usize = 30;
const PREFETCH_FACTOR: usize = 5;

/// Hybrid retrieval engine over a read-only snapshot of the vector store.
///
/// Construction loads every stored record and builds the in-memory lexical
/// index; the snapshot is never invalidated, so a fresh engine must be
/// built after ingestion to observe new content.
pub struct HybridEngine<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    reranker: Option<&'a dyn Reranker>,
    mmr_lambda: f32,
    rerank_enabled: bool,
    chunks: Vec<IndexRecord>,
    lexical: Bm25Index,
}

impl<'a> HybridEngine<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        embedder: &'a dyn Embedder,
        reranker: Option<&'a dyn Reranker>,
        config: &Config,
    ) -> Result<Self> {
        let chunks = store.get_all()?;
        let lexical = Bm25Index::new(chunks.iter().map(|c| tokenize(&c.text)).collect());
        debug!(chunks = chunks.len(), "retrieval snapshot loaded");

        Ok(Self {
            store,
            embedder,
            reranker,
            mmr_lambda: config.retrieval.mmr_lambda,
            rerank_enabled: config.rerank.enabled,
            chunks,
            lexical,
        })
    }

    /// Retrieve up to `k` hits for the query.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        // ---- Vector stage ----
        let query_vec = self.embed_query(query)?;
        let prefetch = PREFETCH_FLOOR.max(k * PREFETCH_FACTOR);
        let pool = self.store.query(&query_vec, prefetch)?;
        let vector_hits = self.mmr_select(&pool, k);

        // ---- Lexical stage ----
        let lexical_hits = self.lexical_top(query, k);

        // ---- Fusion by chunk id; the vector stage inserted first wins ----
        let mut seen: HashSet<&str> = HashSet::new();
        let mut fused: Vec<Hit> = Vec::new();
        for hit in vector_hits.iter().chain(lexical_hits.iter()) {
            if seen.insert(hit.chunk_id.as_str()) {
                fused.push(hit.clone());
            }
        }

        // ---- Rerank: supersedes both stage orderings when enabled ----
        let ranked = match self.reranker {
            Some(reranker) if self.rerank_enabled && fused.len() > 1 => {
                self.rerank(reranker, query, fused)?
            }
            _ => fused,
        };

        // ---- Per-source representation cap ----
        Ok(cap_per_source(ranked, k))
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse {
                provider: "embedding",
                detail: "empty embedding batch for query".into(),
            })
    }

    /// Maximal Marginal Relevance re-selection over the prefetched pool.
    ///
    /// Greedy: the best query match first, then whichever candidate
    /// maximizes `λ·sim(query, c) − (1−λ)·max_{s∈selected} sim(c, s)`.
    /// A pool with missing embeddings falls back to the first `k` vector
    /// hits in store order.
    fn mmr_select(&self, pool: &[ScoredRecord], k: usize) -> Vec<Hit> {
        if pool.iter().any(|s| s.record.embedding.is_empty()) {
            debug!("candidate pool missing embeddings; skipping MMR re-selection");
            return pool.iter().take(k).map(vector_hit).collect();
        }

        let lambda = self.mmr_lambda;
        // The store ranks by distance; similarity to the query is 1 - d.
        let query_sims: Vec<f32> = pool.iter().map(|s| 1.0 - s.distance).collect();

        let mut selected: Vec<usize> = Vec::new();
        let mut candidates: Vec<usize> = (0..pool.len()).collect();

        while selected.len() < k && !candidates.is_empty() {
            let best_pos = if selected.is_empty() {
                // Pool arrives distance-sorted: the head is the best match.
                0
            } else {
                let mut best_pos = 0;
                let mut best_score = f32::NEG_INFINITY;
                for (pos, &idx) in candidates.iter().enumerate() {
                    let redundancy = selected
                        .iter()
                        .map(|&s| {
                            cosine_similarity(
                                &pool[idx].record.embedding,
                                &pool[s].record.embedding,
                            )
                        })
                        .fold(f32::NEG_INFINITY, f32::max);
                    let score = lambda * query_sims[idx] - (1.0 - lambda) * redundancy;
                    if score > best_score {
                        best_score = score;
                        best_pos = pos;
                    }
                }
                best_pos
            };

            let idx = candidates.remove(best_pos);
            selected.push(idx);
        }

        selected.into_iter().map(|i| vector_hit(&pool[i])).collect()
    }

    /// Top `k` chunks by BM25 score. Zero-score chunks share no query
    /// terms and are not candidates.
    fn lexical_top(&self, query: &str, k: usize) -> Vec<Hit> {
        if self.lexical.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let scores = self.lexical.score(&query_tokens);
        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(i, score)| {
                let chunk = &self.chunks[i];
                Hit {
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    page: chunk.page,
                    chunk_id: chunk.chunk_id.clone(),
                    score,
                }
            })
            .collect()
    }

    fn rerank(&self, reranker: &dyn Reranker, query: &str, mut hits: Vec<Hit>) -> Result<Vec<Hit>> {
        let documents: Vec<String> = hits.iter().map(|h| h.text.clone()).collect();
        let scores = reranker.score(query, &documents)?;

        for (hit, score) in hits.iter_mut().zip(&scores) {
            hit.score = *score;
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Ok(hits)
    }
}

fn vector_hit(scored: &ScoredRecord) -> Hit {
    Hit {
        text: scored.record.text.clone(),
        source: scored.record.source.clone(),
        page: scored.record.page,
        chunk_id: scored.record.chunk_id.clone(),
        score: 1.0 - scored.distance,
    }
}

/// Walk the ranked list keeping at most `max(2, k/2)` hits per source,
/// stopping once `k` hits are collected.
fn cap_per_source(hits: Vec<Hit>, k: usize) -> Vec<Hit> {
    let cap = (k / 2).max(2);
    let mut per_source: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(k);

    for hit in hits {
        let count = per_source.entry(hit.source.clone()).or_insert(0);
        if *count >= cap {
            continue;
        }
        *count += 1;
        out.push(hit);
        if out.len() >= k {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::InMemoryVectorStore;

    /// Embedder that looks up canned vectors by exact text.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.clone()))
                    .collect(),
            }
        }
    }

    impl Embedder for TableEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.table.get(t).cloned().unwrap_or_else(|| vec![0.0; 4]))
                .collect())
        }
    }

    fn record(chunk_id: &str, source: &str, text: &str, embedding: Vec<f32>) -> IndexRecord {
        IndexRecord {
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            source: source.to_string(),
            page: Some(0),
            embedding,
        }
    }

    fn no_rerank_config() -> Config {
        let mut config = Config::default();
        config.rerank.enabled = false;
        config
    }

    #[test]
    fn empty_index_returns_no_hits_without_provider_calls() {
        struct PanickingEmbedder;
        impl Embedder for PanickingEmbedder {
            fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                panic!("embedder must not be called for an empty index");
            }
        }

        let store = InMemoryVectorStore::new();
        let config = no_rerank_config();
        let engine = HybridEngine::new(&store, &PanickingEmbedder, None, &config).unwrap();

        let hits = engine.search("anything", 4).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn fusion_keeps_vector_only_and_lexical_only_chunks() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                // Semantically close to the query vector, shares no terms
                record("vec-only", "v.pdf", "azure firmament overhead", vec![1.0, 0.0, 0.0, 0.0]),
                // Shares query terms, orthogonal vector
                record("lex-only", "l.pdf", "sky color question", vec![0.0, 1.0, 0.0, 0.0]),
                // Filler so BM25 idf does not clamp to zero
                record("filler-1", "f.pdf", "pasta recipes tonight", vec![0.0, 0.0, 1.0, 0.0]),
                record("filler-2", "f.pdf", "ancient roman history", vec![0.0, 0.0, 0.0, 1.0]),
            ])
            .unwrap();

        let embedder = TableEmbedder::new(&[("sky color", vec![1.0, 0.0, 0.0, 0.0])]);
        let config = no_rerank_config();
        let engine = HybridEngine::new(&store, &embedder, None, &config).unwrap();

        let hits = engine.search("sky color", 4).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert!(ids.contains(&"vec-only"), "vector signal dropped: {ids:?}");
        assert!(ids.contains(&"lex-only"), "lexical signal dropped: {ids:?}");
    }

    #[test]
    fn mmr_prefers_distinct_over_near_duplicate() {
        let store = InMemoryVectorStore::new();
        // Two near-identical vectors close to the query, and a moderately
        // similar vector pointing away from the duplicates.
        store
            .upsert(vec![
                record("dup-1", "a.pdf", "first near duplicate", vec![0.9, 0.435, 0.0, 0.0]),
                record("dup-2", "a.pdf", "second near duplicate", vec![0.89, 0.44, 0.01, 0.0]),
                record("other", "b.pdf", "moderately similar but distinct", vec![0.8, -0.6, 0.0, 0.0]),
            ])
            .unwrap();

        let embedder = TableEmbedder::new(&[("query text", vec![1.0, 0.0, 0.0, 0.0])]);
        let config = no_rerank_config();
        let engine = HybridEngine::new(&store, &embedder, None, &config).unwrap();

        let hits = engine.search("query text", 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids[0], "dup-1");
        assert!(
            ids.contains(&"other"),
            "MMR should pick the distinct chunk over the duplicate: {ids:?}"
        );
    }

    #[test]
    fn rerank_order_supersedes_stage_scores() {
        struct ReverseReranker;
        impl Reranker for ReverseReranker {
            fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
                // Score documents in reverse of their incoming order
                Ok((0..documents.len()).map(|i| i as f32).collect())
            }
        }

        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![
                record("a", "a.pdf", "alpha text", vec![1.0, 0.0, 0.0, 0.0]),
                record("b", "b.pdf", "beta text", vec![0.9, 0.1, 0.0, 0.0]),
            ])
            .unwrap();

        let embedder = TableEmbedder::new(&[("q", vec![1.0, 0.0, 0.0, 0.0])]);
        let config = Config::default();
        let reranker = ReverseReranker;
        let engine = HybridEngine::new(&store, &embedder, Some(&reranker), &config).unwrap();

        let hits = engine.search("q", 2).unwrap();
        assert_eq!(hits[0].chunk_id, "b", "reranker order must win");
    }

    #[test]
    fn per_source_cap_limits_one_source() {
        let hits: Vec<Hit> = (0..5)
            .map(|i| Hit {
                text: format!("t{i}"),
                source: if i < 4 { "big.pdf".into() } else { "other.pdf".into() },
                page: None,
                chunk_id: format!("c{i}"),
                score: 1.0 - i as f32 * 0.1,
            })
            .collect();

        let capped = cap_per_source(hits, 4);
        let from_big = capped.iter().filter(|h| h.source == "big.pdf").count();
        assert!(from_big <= 2, "cap is max(2, k/2) = 2 for k=4");
        assert!(capped.iter().any(|h| h.source == "other.pdf"));
    }

    #[test]
    fn cap_stops_at_k() {
        let hits: Vec<Hit> = (0..10)
            .map(|i| Hit {
                text: format!("t{i}"),
                source: format!("s{i}.pdf"),
                page: None,
                chunk_id: format!("c{i}"),
                score: 0.5,
            })
            .collect();

        assert_eq!(cap_per_source(hits, 3).len(), 3);
    }

    #[test]
    fn fewer_candidates_than_k_returns_what_exists() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(vec![record("only", "a.pdf", "single chunk", vec![1.0, 0.0, 0.0, 0.0])])
            .unwrap();

        let embedder = TableEmbedder::new(&[("q", vec![1.0, 0.0, 0.0, 0.0])]);
        let config = no_rerank_config();
        let engine = HybridEngine::new(&store, &embedder, None, &config).unwrap();

        let hits = engine.search("q", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
