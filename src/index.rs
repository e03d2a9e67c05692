//! Flat in-memory vector index.
//!
//! Holds every chunk next to its embedding and answers top-K queries by
//! brute-force cosine similarity. The index is built wholesale from a chunk
//! list and never mutated afterwards; re-processing documents builds a new
//! one and drops the old.

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Chunk, ScoredChunk};

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Similarity-searchable collection of embedded chunks.
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("model", &self.model)
            .field("dims", &self.dims)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl VectorIndex {
    /// Embed `chunks` and build an index over them.
    ///
    /// Returns `None` for an empty chunk list, and also when embedding
    /// fails; the failure is logged, never propagated.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Option<VectorIndex> {
        if chunks.is_empty() {
            return None;
        }

        match Self::try_build(chunks, embedder).await {
            Ok(index) => {
                info!(
                    chunks = index.len(),
                    dims = index.dims,
                    model = %index.model,
                    "vector index built"
                );
                Some(index)
            }
            Err(e) => {
                error!(error = %e, "failed to create vector index");
                None
            }
        }
    }

    async fn try_build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<VectorIndex> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        Self::from_vectors(embedder.model_name(), chunks, vectors)
    }

    /// Assemble an index from pre-computed vectors, one per chunk.
    pub fn from_vectors(
        model: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<VectorIndex> {
        if chunks.len() != vectors.len() {
            bail!(
                "embedding count mismatch: {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if dims == 0 {
            bail!("embedding vectors are empty");
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != dims) {
            bail!(
                "embedding dimension mismatch at chunk {}: expected {}, got {}",
                bad,
                dims,
                vectors[bad].len()
            );
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(VectorIndex {
            model: model.to_string(),
            dims,
            entries,
        })
    }

    /// Up to `k` chunks ordered by descending cosine similarity to `query`.
    /// Equal scores keep insertion order; NaN scores sort last.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by counting a few marker words, so similarity is predictable.
    struct MarkerEmbedder {
        calls: AtomicUsize,
    }

    const MARKERS: [&str; 3] = ["cell", "planet", "poem"];

    #[async_trait]
    impl Embedder for MarkerEmbedder {
        fn model_name(&self) -> &str {
            "marker"
        }
        fn dims(&self) -> usize {
            MARKERS.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    MARKERS
                        .iter()
                        .map(|m| lower.matches(m).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("model unavailable")
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .flat_map(|(i, t)| {
                chunk_text(t, 1000, 200).into_iter().map(move |mut c| {
                    c.index = i;
                    c
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_input_builds_no_index() {
        let embedder = MarkerEmbedder {
            calls: AtomicUsize::new(0),
        };
        assert!(VectorIndex::build(Vec::new(), &embedder).await.is_none());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embedding_failure_builds_no_index() {
        let index = VectorIndex::build(chunks(&["a cell"]), &BrokenEmbedder).await;
        assert!(index.is_none());
    }

    #[tokio::test]
    async fn search_returns_nearest_first() {
        let embedder = MarkerEmbedder {
            calls: AtomicUsize::new(0),
        };
        let index = VectorIndex::build(
            chunks(&[
                "A poem about the sea",
                "The cell membrane and the cell wall",
                "Every planet orbits a star",
            ]),
            &embedder,
        )
        .await
        .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dims(), 3);
        assert_eq!(index.model(), "marker");

        let results = index.search(&[0.0, 1.0, 0.0], 10);
        assert_eq!(results.len(), 3);
        assert!(results[0].chunk.text.contains("planet"));
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn search_truncates_to_k_and_keeps_order_on_ties() {
        let embedder = MarkerEmbedder {
            calls: AtomicUsize::new(0),
        };
        let index = VectorIndex::build(
            chunks(&["one cell", "two cell", "three cell", "a planet"]),
            &embedder,
        )
        .await
        .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "one cell");
        assert_eq!(results[1].chunk.text, "two cell");
    }

    #[test]
    fn nan_scores_rank_last() {
        let index = VectorIndex::from_vectors(
            "m",
            chunks(&["poisoned", "near", "far"]),
            vec![vec![f32::NAN, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.1], 3);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "far", "poisoned"]);
        assert!(results[2].score.is_nan());
    }

    #[test]
    fn from_vectors_rejects_mismatches() {
        let c = chunks(&["x", "y"]);
        assert!(VectorIndex::from_vectors("m", c.clone(), vec![vec![1.0]]).is_err());
        assert!(VectorIndex::from_vectors("m", c.clone(), vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(VectorIndex::from_vectors("m", c, vec![vec![], vec![]]).is_err());
    }
}
