// Similarity engine: TF-IDF scoring of an article against its neighbors.

pub mod cosine;
pub mod tfidf;
pub mod tokens;
pub mod traits;
