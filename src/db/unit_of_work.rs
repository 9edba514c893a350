// Unit of work: cluster mutations collected in memory, committed together.
//
// Assignment and enrichment record what they want written here; the caller
// hands the finished unit to `Database::commit`, which applies every write
// in one transaction or none of them.

use super::models::{Cluster, ClusterDraft};

/// One pending mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Insert a new cluster and point its representative article at it.
    CreateCluster(ClusterDraft),
    /// Overwrite a cluster's representative fields and aggregate flags.
    UpdateCluster(Cluster),
    /// Point an article at an existing cluster.
    LinkArticle { article_id: i64, cluster_id: i64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitOfWork {
    writes: Vec<PendingWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: PendingWrite) {
        self.writes.push(write);
    }

    pub fn writes(&self) -> &[PendingWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<PendingWrite> {
        self.writes
    }
}
