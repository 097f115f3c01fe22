//! Retrieval-grounded weight assignment for soft constraints.
//!
//! For each unweighted soft constraint: chunk the document, retrieve the
//! top-k most similar passages, ask the generative model whether the document
//! endorses the constraint (one YES/NO token with logprobs), and map the YES
//! probability to a violation weight. The whole step is a pure function of
//! (document text, constraint statement, retrieval model, generative model,
//! sampling settings): identical inputs reproduce identical weights.
//!
//! Constraints are verified concurrently (each retrieval + verification call
//! is independent) and the computed weights are written back serially, one
//! writer per constraint slot.

pub mod chunk;
pub mod retrieve;
pub mod verify;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::WeightError;
use crate::logic::LogicStructure;
use crate::model::{CompletionModel, Embedder};

use self::retrieve::EmbeddingCache;
pub use self::verify::VerificationResult;

/// Parameters for chunking, retrieval, and the weight transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightConfig {
    /// Chunk window size in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in characters.
    pub chunk_overlap: usize,
    /// How many chunks to retrieve per constraint.
    pub top_k: usize,
    /// Saturation cap for the probability-to-weight transform.
    pub weight_cap: f64,
    /// Maximum concurrent constraint verifications.
    pub concurrency: usize,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            top_k: 10,
            weight_cap: 10.0,
            concurrency: 4,
        }
    }
}

/// Map the endorsement probability to a violation cost:
/// `w = min(cap, -ln(max(1 - p, e^-cap)))`.
///
/// Non-negative, finite, and strictly increasing in `prob_yes` until it
/// saturates at `cap`; `w(0) = 0`. Violating a rule the document strongly
/// endorses is expensive; a rule the document does not endorse is nearly free
/// to violate.
pub fn weight_from_probability(prob_yes: f64, cap: f64) -> f64 {
    let p = prob_yes.clamp(0.0, 1.0);
    let floor = (-cap).exp();
    (-(1.0 - p).max(floor).ln()).min(cap)
}

/// The weight and the verification evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedWeight {
    pub weight: f64,
    pub verification: VerificationResult,
}

/// Assigns violation weights to soft constraints, one model call per
/// constraint. The embedder and completion model are injected; the assigner
/// holds no ambient state beyond its chunk-embedding cache.
pub struct WeightAssigner<'a, E, C>
where
    E: Embedder + Sync,
    C: CompletionModel + Sync,
{
    embedder: &'a E,
    completion: &'a C,
    config: WeightConfig,
    cache: EmbeddingCache,
}

impl<'a, E, C> WeightAssigner<'a, E, C>
where
    E: Embedder + Sync,
    C: CompletionModel + Sync,
{
    pub fn new(embedder: &'a E, completion: &'a C, config: WeightConfig) -> Self {
        Self {
            embedder,
            completion,
            config,
            cache: EmbeddingCache::new(),
        }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Compute the weight for one soft constraint against `document`.
    pub fn assign(&self, document: &str, gloss: &str) -> Result<AssignedWeight, WeightError> {
        let chunks = chunk::chunk(document, self.config.chunk_size, self.config.chunk_overlap)?;
        let retrieved = retrieve::retrieve_top_k(
            self.embedder,
            &self.cache,
            gloss,
            &chunks,
            self.config.top_k,
        )?;
        let verification = verify::verify(self.completion, &retrieved, gloss, chunks.len())?;
        let weight = weight_from_probability(verification.prob_yes, self.config.weight_cap);

        tracing::debug!(
            constraint = gloss,
            prob_yes = verification.prob_yes,
            weight,
            chunks = verification.chunks_total,
            "verified soft constraint"
        );

        Ok(AssignedWeight {
            weight,
            verification,
        })
    }

    /// Weight every unweighted soft constraint of `structure` against
    /// `document`.
    ///
    /// Verification runs concurrently across constraints; the computed
    /// weights are then written back serially in declaration order. On
    /// failure the successful weights are still written and the first error
    /// (in declaration order) is returned; failed constraints retain no
    /// weight, and the caller decides whether to retry them.
    ///
    /// Returns the number of constraints weighted.
    pub fn assign_all(
        &self,
        document: &str,
        structure: &mut LogicStructure,
    ) -> Result<usize, WeightError> {
        let pending: Vec<(String, String)> = structure
            .unweighted_soft()
            .map(|c| (c.id.clone(), c.gloss.clone()))
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        tracing::info!(constraints = pending.len(), "assigning soft-constraint weights");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency.max(1))
            .build()
            .expect("verification thread pool");
        let results: Vec<(String, Result<AssignedWeight, WeightError>)> = pool.install(|| {
            pending
                .par_iter()
                .map(|(id, gloss)| (id.clone(), self.assign(document, gloss)))
                .collect()
        });

        let mut assigned = 0;
        let mut first_error = None;
        for (id, result) in results {
            match result {
                Ok(outcome) => {
                    structure
                        .set_soft_weight(&id, outcome.weight)
                        .expect("weight computed for a declared soft constraint");
                    assigned += 1;
                }
                Err(e) => {
                    tracing::warn!(constraint = %id, error = %e, "weight assignment failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(assigned),
        }
    }
}
