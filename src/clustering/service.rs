// Clustering service: the entry point ingestion talks to.
//
// Dependencies are passed in at construction; there is no global state.
// Every mutation for a user runs under that user's lock, and every
// clusterize call commits exactly one unit of work.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use crate::db::filters::{ArticleFilter, ClusterFilter};
use crate::db::models::{Article, ClusterSummary, IncomingArticle, NewArticle};
use crate::db::unit_of_work::UnitOfWork;
use crate::db::Database;
use crate::similarity::traits::SimilarityEngine;

use super::assign;
use super::finder::CandidateFinder;
use super::locks::UserLocks;
use super::{CategoryLookup, ClusterError, ClusterOutcome, ClusteringSettings, MemberFlags};

/// Check an incoming article before anything is written.
///
/// The member flags become the article's own read/liked state.
pub fn validate_article(
    incoming: IncomingArticle,
    flags: MemberFlags,
) -> Result<NewArticle, ClusterError> {
    if incoming.user_id <= 0 {
        return Err(ClusterError::Input("missing user".into()));
    }
    if incoming.feed_id <= 0 {
        return Err(ClusterError::Input("missing feed".into()));
    }
    let link = incoming.link.trim();
    if link.is_empty() {
        return Err(ClusterError::Input("missing link".into()));
    }
    let Some(date) = incoming.date else {
        return Err(ClusterError::Input(format!("missing date for {link}")));
    };

    Ok(NewArticle {
        user_id: incoming.user_id,
        feed_id: incoming.feed_id,
        category_id: incoming.category_id,
        link: link.to_string(),
        title: incoming.title,
        content: incoming.content,
        date,
        lang: incoming.lang,
        valuable_tokens: incoming.valuable_tokens,
        read: flags.read.unwrap_or(false),
        liked: flags.liked,
    })
}

pub struct ClusterService {
    db: Arc<dyn Database>,
    categories: Arc<dyn CategoryLookup>,
    engine: Arc<dyn SimilarityEngine>,
    settings: ClusteringSettings,
    locks: UserLocks,
}

impl ClusterService {
    pub fn new(
        db: Arc<dyn Database>,
        categories: Arc<dyn CategoryLookup>,
        engine: Arc<dyn SimilarityEngine>,
        settings: ClusteringSettings,
    ) -> Self {
        Self {
            db,
            categories,
            engine,
            settings,
            locks: UserLocks::new(),
        }
    }

    pub fn settings(&self) -> &ClusteringSettings {
        &self.settings
    }

    /// Validate, store, and cluster a freshly fetched article.
    ///
    /// Storing and clustering are separate writes. If the cluster write
    /// fails the error is `Unclustered`, and ingesting the same article again
    /// picks up the stored copy instead of inserting a second one.
    pub async fn ingest(
        &self,
        incoming: IncomingArticle,
        flags: MemberFlags,
    ) -> Result<ClusterOutcome, ClusterError> {
        let article = validate_article(incoming, flags)?;
        if self.db.get_feed(article.user_id, article.feed_id).await?.is_none() {
            return Err(ClusterError::Input(format!(
                "feed {} does not belong to user {}",
                article.feed_id, article.user_id
            )));
        }
        if let Some(category_id) = article.category_id {
            if self.db.get_category(article.user_id, category_id).await?.is_none() {
                return Err(ClusterError::Input(format!(
                    "category {category_id} does not belong to user {}",
                    article.user_id
                )));
            }
        }

        let _guard = self.locks.acquire(article.user_id).await;

        let article_id = match self.stored_copy(&article).await? {
            Some(article_id) => {
                info!(article_id, user_id = article.user_id, "Resuming stored article");
                article_id
            }
            None => self.db.insert_article(&article).await?,
        };

        self.clusterize_locked(article_id, flags)
            .await
            .map_err(|e| match e {
                ClusterError::Persistence(source) => ClusterError::Unclustered { article_id, source },
                other => other,
            })
    }

    /// An earlier attempt at this same article that was stored but never clustered.
    async fn stored_copy(&self, article: &NewArticle) -> Result<Option<i64>, ClusterError> {
        let filter = ArticleFilter::for_user(article.user_id)
            .feed(article.feed_id)
            .link(article.link.as_str())
            .dated_at(article.date)
            .unclustered()
            .limit(1);
        let found = self.db.find_articles(&filter).await?;
        Ok(found.first().map(|a| a.id))
    }

    /// Put a stored article into a matching cluster, or a new one.
    ///
    /// An article that already has a cluster is rejected with
    /// `AlreadyClustered`, so repeating a call never creates a second cluster.
    pub async fn clusterize(
        &self,
        article_id: i64,
        flags: MemberFlags,
    ) -> Result<ClusterOutcome, ClusterError> {
        let user_id = self
            .db
            .get_article(article_id)
            .await?
            .ok_or(ClusterError::ArticleNotFound(article_id))?
            .user_id;

        let _guard = self.locks.acquire(user_id).await;
        self.clusterize_locked(article_id, flags).await
    }

    /// Cluster one article. The caller holds the article owner's lock.
    async fn clusterize_locked(
        &self,
        article_id: i64,
        flags: MemberFlags,
    ) -> Result<ClusterOutcome, ClusterError> {
        // Re-read under the lock: a concurrent call may have clustered it
        let article = self
            .db
            .get_article(article_id)
            .await?
            .ok_or(ClusterError::ArticleNotFound(article_id))?;
        if let Some(cluster_id) = article.cluster_id {
            return Err(ClusterError::AlreadyClustered {
                article_id,
                cluster_id,
            });
        }

        let cluster_on_title = match article.category_id {
            Some(category_id) => {
                self.categories
                    .cluster_on_title(article.user_id, category_id)
                    .await?
            }
            None => false,
        };

        let finder = CandidateFinder::new(self.db.as_ref(), Arc::clone(&self.engine), &self.settings);
        let candidate = finder.find_cluster(&article, cluster_on_title).await?;

        let mut unit = UnitOfWork::new();
        let (created, matched_by) = match candidate.matched {
            Some((cluster, strategy)) => {
                assign::enrich(&mut unit, cluster, &article, flags, false);
                (false, Some(strategy))
            }
            None => {
                assign::create_cluster(&mut unit, &article, flags);
                (true, None)
            }
        };

        let touched = self.db.commit(unit).await?;
        let cluster_id = touched
            .last()
            .copied()
            .ok_or_else(|| anyhow!("Commit for article {article_id} wrote no cluster"))?;
        let cluster = self
            .db
            .get_cluster(article.user_id, cluster_id)
            .await?
            .ok_or(ClusterError::ClusterNotFound(cluster_id))?;

        info!(
            article_id,
            user_id = article.user_id,
            cluster_id,
            created,
            matched_by = matched_by.map(|m| m.to_string()),
            degraded = candidate.degraded.as_ref().map(|d| d.to_string()),
            "Article clustered"
        );

        Ok(ClusterOutcome {
            cluster,
            created,
            matched_by,
            degraded: candidate.degraded,
        })
    }

    /// Delete a cluster and every member article.
    pub async fn delete_cluster(&self, user_id: i64, cluster_id: i64) -> Result<(), ClusterError> {
        let _guard = self.locks.acquire(user_id).await;
        if !self.db.delete_cluster(user_id, cluster_id).await? {
            return Err(ClusterError::ClusterNotFound(cluster_id));
        }
        info!(user_id, cluster_id, "Cluster deleted");
        Ok(())
    }

    /// A cluster's members, oldest first.
    pub async fn cluster_members(
        &self,
        user_id: i64,
        cluster_id: i64,
    ) -> Result<Vec<Article>, ClusterError> {
        if self.db.get_cluster(user_id, cluster_id).await?.is_none() {
            return Err(ClusterError::ClusterNotFound(cluster_id));
        }
        let filter = ArticleFilter::for_user(user_id).in_cluster(cluster_id);
        Ok(self.db.find_articles(&filter).await?)
    }

    pub async fn list_clusters(
        &self,
        filter: &ClusterFilter,
    ) -> Result<Vec<ClusterSummary>, ClusterError> {
        Ok(self.db.list_clusters(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn incoming() -> IncomingArticle {
        IncomingArticle {
            user_id: 1,
            feed_id: 2,
            link: " http://a.com/1 ".to_string(),
            title: "Storm hits region".to_string(),
            date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            lang: "en".to_string(),
            ..IncomingArticle::default()
        }
    }

    #[test]
    fn test_validate_accepts_and_trims() {
        let flags = MemberFlags {
            read: Some(true),
            liked: true,
        };
        let article = validate_article(incoming(), flags).unwrap();
        assert_eq!(article.link, "http://a.com/1");
        assert!(article.read);
        assert!(article.liked);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let cases = [
            IncomingArticle {
                link: "  ".into(),
                ..incoming()
            },
            IncomingArticle {
                date: None,
                ..incoming()
            },
            IncomingArticle {
                user_id: 0,
                ..incoming()
            },
            IncomingArticle {
                feed_id: 0,
                ..incoming()
            },
        ];
        for case in cases {
            let err = validate_article(case, MemberFlags::default()).unwrap_err();
            assert!(matches!(err, ClusterError::Input(_)), "got {err}");
            assert!(!err.is_retryable());
        }
    }
}
