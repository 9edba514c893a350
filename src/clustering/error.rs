// Errors surfaced by the clustering service.
//
// Insufficient samples and similarity failures are not here: they degrade
// to "no match" and are reported through `Degradation` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The article can't be clustered as delivered (missing link, date, user...).
    #[error("invalid article: {0}")]
    Input(String),

    /// Clustering an article twice is rejected rather than silently reassigned.
    #[error("article {article_id} already belongs to cluster {cluster_id}")]
    AlreadyClustered { article_id: i64, cluster_id: i64 },

    #[error("article {0} not found")]
    ArticleNotFound(i64),

    #[error("cluster {0} not found")]
    ClusterNotFound(i64),

    /// A read or transactional write failed. Nothing was committed; the
    /// whole operation can be retried.
    #[error("persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),

    /// The article was stored but its cluster write failed. Ingesting the
    /// same article again resumes from the stored copy.
    #[error("article {article_id} stored but not clustered: {source:#}")]
    Unclustered {
        article_id: i64,
        #[source]
        source: anyhow::Error,
    },
}

impl ClusterError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClusterError::Persistence(_) | ClusterError::Unclustered { .. }
        )
    }
}
