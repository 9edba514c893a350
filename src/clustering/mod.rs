// Clustering: deciding which story an incoming article belongs to.
//
// The finder looks for an existing cluster (exact link, then title, then
// statistical similarity), assignment folds the article into what was found
// or starts a new cluster, and the service ties both together under a
// per-user lock.

pub mod assign;
pub mod error;
pub mod finder;
pub mod locks;
pub mod service;

pub use error::ClusterError;
pub use service::ClusterService;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::Cluster;

/// Per-category clustering settings, as seen by the clustering service.
#[async_trait]
pub trait CategoryLookup: Send + Sync {
    /// Whether title and similarity matching are enabled for a category.
    /// Unknown categories report false.
    async fn cluster_on_title(&self, user_id: i64, category_id: i64) -> Result<bool>;
}

/// Thresholds that shape candidate search.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringSettings {
    /// Half-width of the symmetric window around an article's date.
    pub time_window: Duration,
    /// Fewer qualifying neighbors than this and similarity matching is skipped.
    pub min_sample_size: usize,
    /// A similarity match must score strictly above this.
    pub min_score: f64,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            time_window: Duration::days(7),
            min_sample_size: 10,
            min_score: 0.45,
        }
    }
}

impl ClusteringSettings {
    /// Exclusive (after, before) bounds around a date, clamped to the
    /// representable range.
    pub fn window(&self, date: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let after = date
            .checked_sub_signed(self.time_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = date
            .checked_add_signed(self.time_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (after, before)
    }
}

/// Read/liked state requested for a new member.
///
/// `read: None` means "not specified": a new cluster starts unread and an
/// existing cluster's read state is left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFlags {
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub liked: bool,
}

/// How an article found its cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchStrategy {
    Link,
    Title,
    Similarity { score: f64 },
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::Link => write!(f, "link"),
            MatchStrategy::Title => write!(f, "title"),
            MatchStrategy::Similarity { score } => write!(f, "similarity ({score:.2})"),
        }
    }
}

/// A similarity search that couldn't run to completion. The article still
/// gets a cluster; only grouping quality suffers.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    /// Too few neighbors for the statistics to mean anything.
    InsufficientSample { found: usize, required: usize },
    /// The engine failed; treated as "no match".
    SimilarityFailed { reason: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::InsufficientSample { found, required } => {
                write!(f, "insufficient sample ({found} of {required} neighbors)")
            }
            Degradation::SimilarityFailed { reason } => {
                write!(f, "similarity failed: {reason}")
            }
        }
    }
}

/// Result of clustering one article.
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// The cluster as committed.
    pub cluster: Cluster,
    /// True when the article started a new cluster.
    pub created: bool,
    /// The strategy that matched, if an existing cluster was joined.
    pub matched_by: Option<MatchStrategy>,
    pub degraded: Option<Degradation>,
}
