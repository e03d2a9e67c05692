//! Question validation and top-K retrieval.

use thiserror::Error;

use crate::embedding::{embed_query, Embedder};
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// No index has been built for this session yet.
    #[error("no documents have been processed")]
    NotReady,
    /// The question is too short to search for.
    #[error("question must be at least {min_chars} characters")]
    InsufficientInput { min_chars: usize },
    #[error("failed to embed question: {0}")]
    Embedding(anyhow::Error),
}

/// Return up to `k` chunks most similar to `question`, nearest first.
///
/// The index is checked before the question; neither the embedder nor the
/// index is touched for a rejected question.
pub async fn retrieve(
    question: &str,
    index: Option<&VectorIndex>,
    embedder: &dyn Embedder,
    k: usize,
    min_question_chars: usize,
) -> Result<Vec<ScoredChunk>, RetrievalError> {
    let index = index.ok_or(RetrievalError::NotReady)?;

    let question = question.trim();
    if question.chars().count() < min_question_chars {
        return Err(RetrievalError::InsufficientInput {
            min_chars: min_question_chars,
        });
    }

    let query = embed_query(embedder, question)
        .await
        .map_err(RetrievalError::Embedding)?;

    let results = index.search(&query, k);
    tracing::debug!(k, found = results.len(), "retrieved chunks");
    Ok(results)
}
