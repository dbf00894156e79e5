use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::corpus::DocumentCorpus;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// A retrieved chunk with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub text: String,
    pub score: f64,
}

/// Lexical retriever over the document corpus.
///
/// Okapi BM25 over lowercase whitespace tokens. No learned embeddings, no
/// network dependency; identical corpus and query always produce identical
/// rankings, with score ties broken by corpus order.
pub struct LexicalRetriever {
    corpus: DocumentCorpus,
    /// Token -> number of chunks containing it.
    doc_freq: HashMap<String, usize>,
    /// Per-chunk token counts, parallel to `corpus.chunks()`.
    term_freqs: Vec<HashMap<String, usize>>,
    /// Per-chunk token totals, parallel to `corpus.chunks()`.
    lengths: Vec<usize>,
    avg_length: f64,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

impl LexicalRetriever {
    /// Index the given corpus.
    pub fn new(corpus: DocumentCorpus) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freqs = Vec::with_capacity(corpus.len());
        let mut lengths = Vec::with_capacity(corpus.len());

        for chunk in corpus.chunks() {
            let tokens = tokenize(&chunk.text);
            lengths.push(tokens.len());

            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for token in tf.keys() {
                *doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
        };

        debug!(
            chunks = corpus.len(),
            vocabulary = doc_freq.len(),
            avg_chunk_tokens = avg_length,
            "Built lexical index"
        );

        Self {
            corpus,
            doc_freq,
            term_freqs,
            lengths,
            avg_length,
        }
    }

    /// Return the `top_k` most relevant chunks for the query, best first.
    ///
    /// Chunks scoring zero or below are never returned; an empty result is a
    /// valid outcome the pipeline treats as a degraded input.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.corpus.is_empty() {
            return Vec::new();
        }

        let n = self.corpus.len() as f64;
        let mut scored: Vec<(usize, f64)> = Vec::new();

        for (i, tf) in self.term_freqs.iter().enumerate() {
            let len_norm = 1.0 - BM25_B + BM25_B * (self.lengths[i] as f64 / self.avg_length);
            let mut score = 0.0;
            for token in &query_tokens {
                let freq = match tf.get(token) {
                    Some(f) => *f as f64,
                    None => continue,
                };
                let df = self.doc_freq.get(token).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                score += idf * (freq * (BM25_K1 + 1.0)) / (freq + BM25_K1 * len_norm);
            }
            if score > 0.0 {
                scored.push((i, score));
            }
        }

        // Stable sort: equal scores keep corpus order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let chunk = &self.corpus.chunks()[i];
                RetrievedChunk {
                    doc_id: chunk.doc_id.clone(),
                    chunk_id: chunk.chunk_id.clone(),
                    text: chunk.text.clone(),
                    score,
                }
            })
            .collect()
    }
}
