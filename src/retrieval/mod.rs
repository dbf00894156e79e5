//! Lexical document retrieval: corpus loading, chunking and BM25 search.

mod corpus;
mod index;

pub use corpus::{CorpusChunk, DocumentCorpus};
pub use index::{LexicalRetriever, RetrievedChunk};
