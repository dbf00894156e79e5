use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info};

use crate::retrieval::{LexicalRetriever, RetrievedChunk};

/// Fetches document chunks for a question and formats them for prompts.
///
/// Only invoked for rag/hybrid questions; the orchestrator never calls it
/// on the sql path. Zero hits is a valid degraded outcome, not an error.
pub struct RetrievalStage {
    retriever: Arc<LexicalRetriever>,
    top_k: usize,
}

impl RetrievalStage {
    pub fn new(retriever: Arc<LexicalRetriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }

    /// Retrieve the top chunks for the question text, best first.
    pub fn retrieve(&self, question_text: &str) -> Vec<RetrievedChunk> {
        let chunks = self.retriever.search(question_text, self.top_k);
        if chunks.is_empty() {
            info!("Retrieval found no matching chunks, proceeding unconstrained");
        } else {
            debug!(
                chunks = chunks.len(),
                top_chunk = %chunks[0].chunk_id,
                top_score = chunks[0].score,
                "Retrieved document chunks"
            );
        }
        chunks
    }

    /// Format chunks into the context block downstream prompts consume.
    ///
    /// Every chunk rendered here is citable; the synthesizer derives chunk
    /// citations from exactly this set.
    pub fn format_context(chunks: &[RetrievedChunk]) -> String {
        let mut context = String::new();
        for chunk in chunks {
            let _ = writeln!(
                context,
                "[{}] (score: {:.2}) {}\n",
                chunk.chunk_id, chunk.score, chunk.text
            );
        }
        context
    }
}
