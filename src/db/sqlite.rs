// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points other than its own acquisition.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::filters::{ArticleFilter, ClusterFilter};
use super::models::{Article, Category, Cluster, ClusterSummary, Feed, NewArticle, StoreStats};
use super::traits::Database;
use super::unit_of_work::UnitOfWork;
use crate::clustering::CategoryLookup;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory database with the schema applied. Handy for tests
    /// and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().await;
        super::queries::stats(&conn)
    }

    async fn insert_feed(&self, user_id: i64, title: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_feed(&conn, user_id, title)
    }

    async fn get_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        let conn = self.conn.lock().await;
        super::queries::get_feed(&conn, user_id, feed_id)
    }

    async fn insert_category(
        &self,
        user_id: i64,
        name: &str,
        cluster_on_title: bool,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_category(&conn, user_id, name, cluster_on_title)
    }

    async fn get_category(&self, user_id: i64, category_id: i64) -> Result<Option<Category>> {
        let conn = self.conn.lock().await;
        super::queries::get_category(&conn, user_id, category_id)
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::insert_article(&conn, article)
    }

    async fn get_article(&self, article_id: i64) -> Result<Option<Article>> {
        let conn = self.conn.lock().await;
        super::queries::get_article(&conn, article_id)
    }

    async fn find_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let conn = self.conn.lock().await;
        super::queries::find_articles(&conn, filter)
    }

    async fn get_cluster(&self, user_id: i64, cluster_id: i64) -> Result<Option<Cluster>> {
        let conn = self.conn.lock().await;
        super::queries::get_cluster(&conn, user_id, cluster_id)
    }

    async fn find_cluster_by_link(
        &self,
        user_id: i64,
        link: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<Cluster>> {
        let conn = self.conn.lock().await;
        super::queries::find_cluster_by_link(&conn, user_id, link, after, before)
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock().await;
        super::queries::commit(&mut conn, unit)
    }

    async fn delete_cluster(&self, user_id: i64, cluster_id: i64) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        super::queries::delete_cluster(&mut conn, user_id, cluster_id)
    }

    async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        let conn = self.conn.lock().await;
        super::queries::list_clusters(&conn, filter)
    }

    async fn count_by_feed(&self, user_id: i64, read: Option<bool>) -> Result<BTreeMap<i64, i64>> {
        let conn = self.conn.lock().await;
        super::queries::count_by_feed(&conn, user_id, read)
    }

    async fn count_by_category(
        &self,
        user_id: i64,
        read: Option<bool>,
    ) -> Result<BTreeMap<i64, i64>> {
        let conn = self.conn.lock().await;
        super::queries::count_by_category(&conn, user_id, read)
    }
}

#[async_trait]
impl CategoryLookup for SqliteDatabase {
    async fn cluster_on_title(&self, user_id: i64, category_id: i64) -> Result<bool> {
        Ok(self
            .get_category(user_id, category_id)
            .await?
            .is_some_and(|c| c.cluster_on_title))
    }
}
