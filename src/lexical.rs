//! BM25 lexical scoring over whitespace-tokenized chunks.
//!
//! An approximate Okapi BM25 (k1 = 1.2, b = 0.75) over a fixed corpus of
//! token lists, with document frequencies and average length precomputed at
//! construction. Scores are comparable only within one index.

use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Lowercased whitespace tokenization, shared by indexing and querying.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// BM25 index over a fixed corpus of token lists.
pub struct Bm25Index {
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
}

impl Bm25Index {
    pub fn new(doc_tokens: Vec<Vec<String>>) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &doc_tokens {
            let mut seen = HashSet::new();
            for token in tokens {
                if seen.insert(token.as_str()) {
                    *doc_freq.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        let total: usize = doc_tokens.iter().map(|t| t.len()).sum();
        let avg_len = if doc_tokens.is_empty() {
            0.0
        } else {
            (total as f32 / doc_tokens.len() as f32).max(1.0)
        };

        Self {
            doc_tokens,
            doc_freq,
            avg_len,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_tokens.is_empty()
    }

    /// Score every document against the query tokens, in corpus order.
    pub fn score(&self, query_tokens: &[String]) -> Vec<f32> {
        let total_docs = self.doc_tokens.len() as f32;
        self.doc_tokens
            .iter()
            .map(|doc| self.score_doc(query_tokens, doc, total_docs))
            .collect()
    }

    fn score_doc(&self, query_tokens: &[String], doc: &[String], total_docs: f32) -> f32 {
        if doc.is_empty() {
            return 0.0;
        }

        let doc_len = doc.len() as f32;
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in doc {
            *tf.entry(token.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0;
        for token in query_tokens {
            let Some(freq) = tf.get(token.as_str()) else {
                continue;
            };
            let df = self.doc_freq.get(token).copied().unwrap_or(0) as f32;
            let idf = ((total_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
            let numerator = (*freq as f32) * (K1 + 1.0);
            let denominator =
                (*freq as f32) + K1 * (1.0 - B + B * (doc_len / self.avg_len.max(1e-3)));
            score += idf * (numerator / denominator.max(1e-6));
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(docs: &[&str]) -> Bm25Index {
        Bm25Index::new(docs.iter().map(|d| tokenize(d)).collect())
    }

    #[test]
    fn tokenize_lowercases() {
        assert_eq!(tokenize("The Sky IS blue"), vec!["the", "sky", "is", "blue"]);
    }

    #[test]
    fn empty_index_scores_nothing() {
        let index = index_of(&[]);
        assert!(index.is_empty());
        assert!(index.score(&tokenize("anything")).is_empty());
    }

    #[test]
    fn matching_document_outscores_non_matching() {
        let index = index_of(&[
            "kubernetes deployment rollout strategies",
            "gardening tips for spring flowers",
            "kubernetes orchestration pipelines",
            "cooking pasta at home",
            "ancient history of rome",
        ]);

        let scores = index.score(&tokenize("kubernetes deployment"));
        // Both query terms beat one, one beats none
        assert!(scores[0] > scores[2]);
        assert!(scores[2] > scores[1]);
        assert!((scores[1] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn rarer_terms_weigh_more() {
        // "common" appears everywhere, "rare" in one document; a document
        // matching only the rare term should beat one matching only the
        // common term.
        let index = index_of(&[
            "rare topic here",
            "common filler text",
            "common words again",
            "common stuff more",
        ]);

        let scores = index.score(&tokenize("rare common"));
        let rare_doc = scores[0];
        let common_docs = &scores[1..];
        for &s in common_docs {
            assert!(rare_doc > s, "rare-term doc should outrank common-term docs");
        }
    }

    #[test]
    fn term_repetition_saturates() {
        let index = index_of(&[
            "spark spark spark spark",
            "spark mention once only",
            "other text entirely here",
            "more unrelated words go",
            "and a final filler",
        ]);
        let scores = index.score(&tokenize("spark"));
        // Both match; the repeated doc scores higher but not 4x higher
        assert!(scores[0] > scores[1]);
        assert!(scores[0] < scores[1] * 4.0);
    }
}
