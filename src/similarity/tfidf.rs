// TF-IDF similarity engine.
//
// The target and its neighbors form the corpus. Each document becomes a
// sparse vector of term frequency times smoothed inverse document frequency,
// and the target is compared to every neighbor by cosine similarity.
//
// Terms shared by the whole corpus get the minimum IDF weight, while terms
// that only the target and one neighbor share dominate the score. That is
// what separates "same story" from "same topic".

use std::collections::HashMap;
use std::iter;

use anyhow::Result;
use tracing::debug;

use super::cosine::cosine_from_weights;
use super::traits::{SimilarityEngine, SimilarityMatch};

/// TF-IDF + cosine similarity. The default engine.
///
/// Zero external calls and no cache: the model is rebuilt from the exact
/// neighbor snapshot on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfEngine;

/// Raw term counts for one document.
fn term_counts(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Smoothed IDF: `ln((1 + n) / (1 + df)) + 1`. Never zero, so a term present
/// everywhere still counts a little.
fn idf(doc_count: usize, doc_freq: usize) -> f64 {
    ((1.0 + doc_count as f64) / (1.0 + doc_freq as f64)).ln() + 1.0
}

impl SimilarityEngine for TfIdfEngine {
    fn best_match(
        &self,
        target: &[String],
        neighbors: &[Vec<String>],
    ) -> Result<Option<SimilarityMatch>> {
        if neighbors.is_empty() {
            return Ok(None);
        }

        let docs: Vec<HashMap<&str, f64>> = iter::once(target)
            .chain(neighbors.iter().map(Vec::as_slice))
            .map(term_counts)
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.keys() {
                *doc_freq.entry(*term).or_insert(0) += 1;
            }
        }

        let vectors: Vec<HashMap<&str, f64>> = docs
            .iter()
            .map(|doc| {
                doc.iter()
                    .map(|(term, tf)| (*term, tf * idf(docs.len(), doc_freq[term])))
                    .collect()
            })
            .collect();

        let Some((target_vec, neighbor_vecs)) = vectors.split_first() else {
            return Ok(None);
        };

        let mut best: Option<SimilarityMatch> = None;
        for (index, vector) in neighbor_vecs.iter().enumerate() {
            let score = cosine_from_weights(target_vec, vector);
            if !score.is_finite() {
                anyhow::bail!("Similarity score for neighbor {index} is not finite ({score})");
            }
            // Strictly greater: on ties the earlier neighbor keeps its place
            if best.map_or(true, |b| score > b.score) {
                best = Some(SimilarityMatch { index, score });
            }
        }

        debug!(
            corpus = docs.len(),
            terms = doc_freq.len(),
            best_index = best.map(|b| b.index),
            best_score = best.map(|b| b.score),
            "Scored neighbors"
        );

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &str) -> Vec<String> {
        words.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_no_neighbors() {
        let engine = TfIdfEngine;
        assert_eq!(engine.best_match(&doc("storm"), &[]).unwrap(), None);
    }

    #[test]
    fn test_picks_closest_neighbor() {
        let engine = TfIdfEngine;
        let target = doc("storm coast flooding evacuation");
        let neighbors = vec![
            doc("election ballot turnout"),
            doc("storm coast flooding evacuation shelters"),
            doc("storm season forecast"),
        ];
        let best = engine.best_match(&target, &neighbors).unwrap().unwrap();
        assert_eq!(best.index, 1);
        assert!(best.score > 0.7, "got {}", best.score);
    }

    #[test]
    fn test_identical_document_scores_one() {
        let engine = TfIdfEngine;
        let target = doc("storm coast flooding");
        let neighbors = vec![doc("election ballot"), doc("storm coast flooding")];
        let best = engine.best_match(&target, &neighbors).unwrap().unwrap();
        assert_eq!(best.index, 1);
        assert!((best.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_first_occurrence() {
        let engine = TfIdfEngine;
        let target = doc("storm coast");
        let neighbors = vec![doc("election"), doc("storm coast"), doc("storm coast")];
        let best = engine.best_match(&target, &neighbors).unwrap().unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn test_empty_target_scores_zero() {
        let engine = TfIdfEngine;
        let neighbors = vec![doc("storm"), doc("coast")];
        let best = engine.best_match(&[], &neighbors).unwrap().unwrap();
        assert_eq!(best.index, 0);
        assert_eq!(best.score, 0.0);
    }

    #[test]
    fn test_idf_downweights_common_terms() {
        assert!(idf(10, 10) < idf(10, 2));
        assert!((idf(10, 10) - 1.0).abs() < 1e-12);
    }
}
