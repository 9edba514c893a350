// Database trait: backend-agnostic async interface for all DB operations.
//
// Implementor: SqliteDatabase (wraps rusqlite behind a tokio Mutex). All
// methods are async so the clustering service can hold a per-user lock
// across repository calls without blocking the runtime.
//
// The trait mirrors the queries.rs function signatures one to one.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::filters::{ArticleFilter, ClusterFilter};
use super::models::{Article, Category, Cluster, ClusterSummary, Feed, NewArticle, StoreStats};
use super::unit_of_work::UnitOfWork;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    /// Row counts across the store.
    async fn stats(&self) -> Result<StoreStats>;

    // --- Feeds and categories ---

    async fn insert_feed(&self, user_id: i64, title: &str) -> Result<i64>;

    async fn get_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>>;

    async fn insert_category(&self, user_id: i64, name: &str, cluster_on_title: bool)
        -> Result<i64>;

    async fn get_category(&self, user_id: i64, category_id: i64) -> Result<Option<Category>>;

    // --- Articles ---

    /// Store a validated, not yet clustered article and return its ID.
    async fn insert_article(&self, article: &NewArticle) -> Result<i64>;

    async fn get_article(&self, article_id: i64) -> Result<Option<Article>>;

    /// Articles matching a filter, oldest first.
    async fn find_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    // --- Clusters ---

    async fn get_cluster(&self, user_id: i64, cluster_id: i64) -> Result<Option<Cluster>>;

    /// The user's oldest cluster with this main link and a main date
    /// strictly inside (`after`, `before`).
    async fn find_cluster_by_link(
        &self,
        user_id: i64,
        link: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<Cluster>>;

    /// Apply a unit of work atomically. Returns the created/updated cluster IDs.
    async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>>;

    /// Delete a cluster and its members. Returns false if it doesn't exist.
    async fn delete_cluster(&self, user_id: i64, cluster_id: i64) -> Result<bool>;

    // --- Read side ---

    async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>>;

    async fn count_by_feed(&self, user_id: i64, read: Option<bool>) -> Result<BTreeMap<i64, i64>>;

    async fn count_by_category(
        &self,
        user_id: i64,
        read: Option<bool>,
    ) -> Result<BTreeMap<i64, i64>>;
}
