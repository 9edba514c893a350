// Similarity engine trait: swap-ready abstraction.
//
// The clustering service only needs "which neighbor is closest, and how
// close". The default implementation is TF-IDF with cosine similarity, but
// anything that can score token bags against each other fits here.

use anyhow::Result;

/// The closest neighbor found by a similarity engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    /// Position of the neighbor in the slice passed to `best_match`
    pub index: usize,
    /// Similarity from 0.0 (nothing shared) to 1.0 (same weighted terms)
    pub score: f64,
}

/// Trait for scoring a target document against a set of neighbors.
///
/// Implementations hold no state between calls: each call models exactly
/// the documents it is given.
pub trait SimilarityEngine: Send + Sync {
    /// Return the best-scoring neighbor, or `None` when there are no
    /// neighbors. Ties go to the neighbor that appears first.
    fn best_match(&self, target: &[String], neighbors: &[Vec<String>])
        -> Result<Option<SimilarityMatch>>;
}
