//! Embedding-based chunk retrieval.
//!
//! The constraint statement and every chunk are embedded with the injected
//! [`Embedder`]; chunks are ranked by cosine similarity, descending, with the
//! stable sort breaking ties in favor of original chunk order so results are
//! reproducible. Chunk embeddings are cached across constraints (the same
//! document is chunked identically for every soft constraint) and uncached
//! batches are embedded in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::WeightError;
use crate::model::Embedder;

use super::chunk::Chunk;

/// Sub-batch size for parallel embedding requests.
const EMBED_BATCH: usize = 64;

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Cache of chunk-text embeddings, shared across constraints and threads.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    map: DashMap<String, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Embed every chunk, consulting and filling `cache`. Uncached texts are
/// embedded in parallel sub-batches; each chunk's embedding is independent of
/// the others, so no ordering between batches matters.
fn embed_chunks<E: Embedder + Sync>(
    embedder: &E,
    cache: &EmbeddingCache,
    chunks: &[Chunk],
) -> Result<Vec<Arc<Vec<f32>>>, WeightError> {
    let uncached: Vec<&str> = {
        let mut seen = std::collections::HashSet::new();
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .filter(|t| !cache.map.contains_key(*t) && seen.insert(*t))
            .collect()
    };

    if !uncached.is_empty() {
        let batches: Vec<(&[&str], Vec<Vec<f32>>)> = uncached
            .par_chunks(EMBED_BATCH)
            .map(|batch| embedder.embed(batch).map(|vecs| (batch, vecs)))
            .collect::<Result<_, _>>()?;

        for (batch, vecs) in batches {
            if vecs.len() != batch.len() {
                return Err(WeightError::EmbeddingCount {
                    expected: batch.len(),
                    actual: vecs.len(),
                });
            }
            for (text, vec) in batch.iter().zip(vecs) {
                cache.map.insert((*text).to_string(), Arc::new(vec));
            }
        }
    }

    Ok(chunks
        .iter()
        .map(|c| {
            cache
                .map
                .get(c.text.as_str())
                .map(|entry| Arc::clone(entry.value()))
                .expect("chunk embedding was just cached")
        })
        .collect())
}

/// Rank `chunks` by similarity to `query` and return the `min(k, n)` best.
///
/// Descending similarity; ties keep original chunk order (stable sort).
pub fn retrieve_top_k<E: Embedder + Sync>(
    embedder: &E,
    cache: &EmbeddingCache,
    query: &str,
    chunks: &[Chunk],
    k: usize,
) -> Result<Vec<RetrievedChunk>, WeightError> {
    if chunks.is_empty() || k == 0 {
        return Ok(Vec::new());
    }

    let query_embedding = {
        let vecs = embedder.embed(&[query])?;
        vecs.into_iter().next().ok_or(WeightError::EmbeddingCount {
            expected: 1,
            actual: 0,
        })?
    };

    let chunk_embeddings = embed_chunks(embedder, cache, chunks)?;

    let mut scored: Vec<(usize, f32)> = chunk_embeddings
        .iter()
        .enumerate()
        .map(|(i, emb)| (i, cosine_similarity(&query_embedding, emb)))
        .collect();
    // Stable: equal similarities stay in original chunk order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(scored
        .into_iter()
        .take(k.min(chunks.len()))
        .map(|(i, similarity)| RetrievedChunk {
            chunk: chunks[i].clone(),
            similarity,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelError;

    /// Deterministic test embedder: maps known words to axis-aligned vectors.
    struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 3];
                    if t.contains("alpha") {
                        v[0] = 1.0;
                    }
                    if t.contains("beta") {
                        v[1] = 1.0;
                    }
                    if t.contains("gamma") {
                        v[2] = 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
            Err(ModelError::Unavailable {
                url: "http://localhost:0".into(),
            })
        }
    }

    fn chunk_of(text: &str, start: usize) -> Chunk {
        Chunk {
            text: text.into(),
            start,
            end: start + text.chars().count(),
        }
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]) - 0.7071).abs() < 1e-3);
    }

    #[test]
    fn ranks_by_similarity_descending() {
        let chunks = vec![
            chunk_of("all about gamma", 0),
            chunk_of("alpha here", 10),
            chunk_of("alpha and beta", 20),
        ];
        let cache = EmbeddingCache::new();
        let top = retrieve_top_k(&AxisEmbedder, &cache, "alpha", &chunks, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk.start, 10);
        assert_eq!(top[1].chunk.start, 20);
        assert!(top[0].similarity > top[1].similarity);
    }

    #[test]
    fn k_larger_than_n_returns_all_most_similar_first() {
        let chunks = vec![chunk_of("beta", 0), chunk_of("alpha", 5)];
        let cache = EmbeddingCache::new();
        let top = retrieve_top_k(&AxisEmbedder, &cache, "alpha", &chunks, 10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk.start, 5);
    }

    #[test]
    fn ties_keep_original_chunk_order() {
        let chunks = vec![
            chunk_of("alpha one", 0),
            chunk_of("alpha two", 9),
            chunk_of("alpha three", 18),
        ];
        let cache = EmbeddingCache::new();
        let top = retrieve_top_k(&AxisEmbedder, &cache, "alpha", &chunks, 3).unwrap();
        let starts: Vec<usize> = top.iter().map(|r| r.chunk.start).collect();
        assert_eq!(starts, vec![0, 9, 18]);
    }

    #[test]
    fn cache_fills_once_and_is_reused() {
        let chunks = vec![chunk_of("alpha", 0), chunk_of("beta", 5)];
        let cache = EmbeddingCache::new();
        retrieve_top_k(&AxisEmbedder, &cache, "alpha", &chunks, 1).unwrap();
        assert_eq!(cache.len(), 2);
        // Second retrieval against the same cache embeds only the query.
        retrieve_top_k(&AxisEmbedder, &cache, "beta", &chunks, 1).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn embedder_failure_propagates() {
        let chunks = vec![chunk_of("alpha", 0)];
        let cache = EmbeddingCache::new();
        assert!(matches!(
            retrieve_top_k(&FailingEmbedder, &cache, "alpha", &chunks, 1),
            Err(WeightError::Model(ModelError::Unavailable { .. }))
        ));
    }
}
