// Candidate finder: locate an existing cluster for an article.
//
// Three strategies run in a fixed order and the first hit wins:
//
//   1. Exact link: a cluster of the same user whose main link is the
//      article's link, dated within the time window.
//   2. Title: an already clustered article in the same category with the
//      same title, ignoring case. Only for categories with title clustering.
//   3. Similarity: TF-IDF over the clustered, same-language articles of the
//      category inside the window. Only after a title miss, only for articles
//      with a language, and only with enough neighbors to be meaningful.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::db::filters::{title_key, ArticleFilter};
use crate::db::models::{Article, Cluster};
use crate::db::Database;
use crate::similarity::tokens::primary_subtag;
use crate::similarity::traits::SimilarityEngine;

use super::{ClusteringSettings, Degradation, MatchStrategy};

/// What the finder came back with.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub matched: Option<(Cluster, MatchStrategy)>,
    /// Set when the similarity stage was reached but couldn't decide.
    pub degraded: Option<Degradation>,
}

impl Candidate {
    fn found(cluster: Cluster, strategy: MatchStrategy) -> Self {
        Self {
            matched: Some((cluster, strategy)),
            degraded: None,
        }
    }

    fn degraded(degradation: Degradation) -> Self {
        Self {
            matched: None,
            degraded: Some(degradation),
        }
    }
}

pub struct CandidateFinder<'a> {
    db: &'a dyn Database,
    engine: Arc<dyn SimilarityEngine>,
    settings: &'a ClusteringSettings,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(
        db: &'a dyn Database,
        engine: Arc<dyn SimilarityEngine>,
        settings: &'a ClusteringSettings,
    ) -> Self {
        Self {
            db,
            engine,
            settings,
        }
    }

    /// Run the strategies in order. `cluster_on_title` is the article
    /// category's setting and gates strategies 2 and 3.
    pub async fn find_cluster(&self, article: &Article, cluster_on_title: bool) -> Result<Candidate> {
        if let Some(cluster) = self.by_link(article).await? {
            return Ok(Candidate::found(cluster, MatchStrategy::Link));
        }
        if !cluster_on_title {
            return Ok(Candidate::default());
        }
        if let Some(cluster) = self.by_title(article).await? {
            return Ok(Candidate::found(cluster, MatchStrategy::Title));
        }
        self.by_similarity(article).await
    }

    async fn by_link(&self, article: &Article) -> Result<Option<Cluster>> {
        let (after, before) = self.settings.window(article.date);
        self.db
            .find_cluster_by_link(article.user_id, &article.link, after, before)
            .await
    }

    /// Articles of the same user and category inside the window that already
    /// belong to a cluster.
    fn scoped_neighbors(&self, article: &Article) -> ArticleFilter {
        let (after, before) = self.settings.window(article.date);
        ArticleFilter::for_user(article.user_id)
            .category(article.category_id)
            .dated_between(after, before)
            .clustered()
            .excluding(article.id)
    }

    async fn by_title(&self, article: &Article) -> Result<Option<Cluster>> {
        let key = title_key(&article.title);
        if key.trim().is_empty() {
            return Ok(None);
        }

        let filter = self.scoped_neighbors(article).title_key(key).limit(1);
        let Some(cluster_id) = self
            .db
            .find_articles(&filter)
            .await?
            .into_iter()
            .next()
            .and_then(|a| a.cluster_id)
        else {
            return Ok(None);
        };

        self.db.get_cluster(article.user_id, cluster_id).await
    }

    async fn by_similarity(&self, article: &Article) -> Result<Candidate> {
        let lang = primary_subtag(&article.lang);
        if lang.is_empty() {
            debug!(article_id = article.id, "No language, skipping similarity");
            return Ok(Candidate::default());
        }

        let filter = self.scoped_neighbors(article).with_tokens().language(lang);
        let neighbors = self.db.find_articles(&filter).await?;

        if neighbors.len() < self.settings.min_sample_size {
            info!(
                article_id = article.id,
                user_id = article.user_id,
                stage = "similarity",
                found = neighbors.len(),
                required = self.settings.min_sample_size,
                "Too few neighbors for similarity matching"
            );
            return Ok(Candidate::degraded(Degradation::InsufficientSample {
                found: neighbors.len(),
                required: self.settings.min_sample_size,
            }));
        }

        let target = article.valuable_tokens.clone();
        let corpus: Vec<Vec<String>> = neighbors.iter().map(|n| n.valuable_tokens.clone()).collect();
        let engine = Arc::clone(&self.engine);

        // Scoring is CPU-bound; keep it off the async workers
        let scored = tokio::task::spawn_blocking(move || engine.best_match(&target, &corpus)).await;

        let best = match scored {
            Ok(Ok(best)) => best,
            Ok(Err(e)) => return Ok(self.similarity_failed(article, e.to_string())),
            Err(e) => return Ok(self.similarity_failed(article, e.to_string())),
        };

        let Some(best) = best else {
            return Ok(Candidate::default());
        };
        let Some(neighbor) = neighbors.get(best.index) else {
            return Ok(self.similarity_failed(
                article,
                format!("engine returned index {} of {}", best.index, neighbors.len()),
            ));
        };

        if best.score <= self.settings.min_score {
            debug!(
                article_id = article.id,
                best_score = best.score,
                min_score = self.settings.min_score,
                "Best similarity below threshold"
            );
            return Ok(Candidate::default());
        }

        let Some(cluster_id) = neighbor.cluster_id else {
            return Ok(Candidate::default());
        };
        Ok(self
            .db
            .get_cluster(article.user_id, cluster_id)
            .await?
            .map(|cluster| Candidate::found(cluster, MatchStrategy::Similarity { score: best.score }))
            .unwrap_or_default())
    }

    fn similarity_failed(&self, article: &Article, reason: String) -> Candidate {
        warn!(
            article_id = article.id,
            user_id = article.user_id,
            stage = "similarity",
            error = %reason,
            "Similarity computation failed, treating as no match"
        );
        Candidate::degraded(Degradation::SimilarityFailed { reason })
    }
}
