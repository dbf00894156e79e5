use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::RetrievalError;

/// A bounded span of a source document, individually retrievable and citable.
#[derive(Debug, Clone)]
pub struct CorpusChunk {
    /// Source document file name, e.g. `kpi_definitions.md`.
    pub doc_id: String,
    /// Stable chunk identifier, e.g. `kpi_definitions.md::chunk2`.
    pub chunk_id: String,
    /// Chunk text.
    pub text: String,
}

/// The pre-chunked document corpus.
///
/// Markdown files are split on blank lines into paragraph chunks. Chunk ids
/// carry the raw paragraph index within the file so they stay stable when
/// empty paragraphs are skipped.
#[derive(Debug, Clone, Default)]
pub struct DocumentCorpus {
    chunks: Vec<CorpusChunk>,
}

impl DocumentCorpus {
    /// Load every `.md` file under `dir`, in file-name order.
    pub fn load_dir(dir: &Path) -> Result<Self, RetrievalError> {
        let entries = fs::read_dir(dir).map_err(|e| RetrievalError::CorpusUnreadable {
            dir: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        // File-name order keeps chunk indices and tie-breaking deterministic.
        paths.sort();

        let mut chunks = Vec::new();
        let mut files = 0usize;

        for path in paths {
            let doc_id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unreadable corpus file");
                    continue;
                }
            };
            files += 1;

            for (i, raw) in content.split("\n\n").enumerate() {
                let text = raw.trim();
                if text.is_empty() {
                    continue;
                }
                chunks.push(CorpusChunk {
                    doc_id: doc_id.clone(),
                    chunk_id: format!("{}::chunk{}", doc_id, i),
                    text: text.to_string(),
                });
            }
        }

        if chunks.is_empty() {
            return Err(RetrievalError::EmptyCorpus {
                dir: dir.display().to_string(),
            });
        }

        info!(chunks = chunks.len(), files, "Indexed document corpus");
        Ok(Self { chunks })
    }

    /// Build a corpus from pre-made chunks (used by tests).
    pub fn from_chunks(chunks: Vec<CorpusChunk>) -> Self {
        Self { chunks }
    }

    /// All chunks, in document order.
    pub fn chunks(&self) -> &[CorpusChunk] {
        &self.chunks
    }

    /// Number of chunks in the corpus.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when the corpus holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
