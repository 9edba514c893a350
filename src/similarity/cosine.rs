// Cosine similarity over sparse weight vectors.
//
// Documents are represented as term -> weight maps. Only terms present on
// both sides contribute to the dot product, so we walk the smaller map.

use std::collections::HashMap;
use std::hash::Hash;

/// Cosine similarity between two sparse weight vectors.
///
/// Returns 0.0 when either side is empty or has zero magnitude.
pub fn cosine_from_weights<K: Eq + Hash>(a: &HashMap<K, f64>, b: &HashMap<K, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let dot: f64 = small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|other| w * other))
        .sum();

    let norm_a = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b = b.values().map(|w| w * w).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
