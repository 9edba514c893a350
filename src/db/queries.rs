// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::filters::{title_key, ArticleFilter, ClusterFilter};
use super::models::{
    Article, Category, Cluster, ClusterSummary, Feed, NewArticle, StoreStats,
};
use super::unit_of_work::{PendingWrite, UnitOfWork};

const ARTICLE_COLUMNS: &str = "a.id, a.user_id, a.feed_id, a.category_id, a.link, a.title,
    a.content, a.date_ms, a.lang, a.valuable_tokens, a.cluster_id, a.read, a.liked,
    COALESCE(f.title, '')";

const CLUSTER_COLUMNS: &str = "c.id, c.user_id, c.main_article_id, c.main_link, c.main_title,
    c.main_date_ms, c.main_feed_title, c.read, c.liked";

fn millis_to_date(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    let tokens_json: String = row.get(9)?;
    let valuable_tokens = serde_json::from_str(&tokens_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    Ok(Article {
        id: row.get(0)?,
        user_id: row.get(1)?,
        feed_id: row.get(2)?,
        category_id: row.get(3)?,
        link: row.get(4)?,
        title: row.get(5)?,
        content: row.get(6)?,
        date: millis_to_date(7, row.get(7)?)?,
        lang: row.get(8)?,
        valuable_tokens,
        cluster_id: row.get(10)?,
        read: row.get(11)?,
        liked: row.get(12)?,
        feed_title: row.get(13)?,
    })
}

fn cluster_from_row(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    Ok(Cluster {
        id: row.get(0)?,
        user_id: row.get(1)?,
        main_article_id: row.get(2)?,
        main_link: row.get(3)?,
        main_title: row.get(4)?,
        main_date: millis_to_date(5, row.get(5)?)?,
        main_feed_title: row.get(6)?,
        read: row.get(7)?,
        liked: row.get(8)?,
    })
}

/// Parse a `group_concat` of integer ids.
fn parse_id_set(joined: &str) -> BTreeSet<i64> {
    joined
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

// --- Feeds and categories ---

/// Register a feed and return its ID.
pub fn insert_feed(conn: &Connection, user_id: i64, title: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO feeds (user_id, title) VALUES (?1, ?2)",
        params![user_id, title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_feed(conn: &Connection, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
    let mut stmt = conn.prepare("SELECT id, user_id, title FROM feeds WHERE id = ?1 AND user_id = ?2")?;
    let result = stmt
        .query_row(params![feed_id, user_id], |row| {
            Ok(Feed {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
            })
        })
        .optional()?;
    Ok(result)
}

/// Register a category and return its ID.
pub fn insert_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    cluster_on_title: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (user_id, name, cluster_on_title) VALUES (?1, ?2, ?3)",
        params![user_id, name, cluster_on_title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_category(conn: &Connection, user_id: i64, category_id: i64) -> Result<Option<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, cluster_on_title FROM categories WHERE id = ?1 AND user_id = ?2",
    )?;
    let result = stmt
        .query_row(params![category_id, user_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                cluster_on_title: row.get(3)?,
            })
        })
        .optional()?;
    Ok(result)
}

// --- Articles ---

/// Store a validated article (not yet clustered) and return its ID.
pub fn insert_article(conn: &Connection, article: &NewArticle) -> Result<i64> {
    let tokens_json = serde_json::to_string(&article.valuable_tokens)?;
    conn.execute(
        "INSERT INTO articles
            (user_id, feed_id, category_id, link, title, title_key, content,
             date_ms, lang, valuable_tokens, read, liked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            article.user_id,
            article.feed_id,
            article.category_id,
            article.link,
            article.title,
            title_key(&article.title),
            article.content,
            article.date.timestamp_millis(),
            article.lang,
            tokens_json,
            article.read,
            article.liked,
        ],
    )
    .with_context(|| format!("Failed to insert article {}", article.link))?;
    Ok(conn.last_insert_rowid())
}

pub fn get_article(conn: &Connection, article_id: i64) -> Result<Option<Article>> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN feeds f ON f.id = a.feed_id
         WHERE a.id = ?1"
    );
    let result = conn
        .query_row(&sql, params![article_id], article_from_row)
        .optional()?;
    Ok(result)
}

/// Articles matching a filter, oldest first (ties broken by ID).
pub fn find_articles(conn: &Connection, filter: &ArticleFilter) -> Result<Vec<Article>> {
    let (cond, mut values) = filter.to_sql();
    let mut sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a LEFT JOIN feeds f ON f.id = a.feed_id
         WHERE {cond}
         ORDER BY a.date_ms ASC, a.id ASC"
    );
    if let Some(limit) = filter.limit_value() {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), article_from_row)?;

    let mut articles = Vec::new();
    for row in rows {
        articles.push(row?);
    }
    Ok(articles)
}

// --- Clusters ---

pub fn get_cluster(conn: &Connection, user_id: i64, cluster_id: i64) -> Result<Option<Cluster>> {
    let sql = format!("SELECT {CLUSTER_COLUMNS} FROM clusters c WHERE c.id = ?1 AND c.user_id = ?2");
    let result = conn
        .query_row(&sql, params![cluster_id, user_id], cluster_from_row)
        .optional()?;
    Ok(result)
}

/// Find the user's cluster whose main link is `link` and whose main date
/// lies strictly between `after` and `before`. The oldest such cluster wins.
pub fn find_cluster_by_link(
    conn: &Connection,
    user_id: i64,
    link: &str,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
) -> Result<Option<Cluster>> {
    let sql = format!(
        "SELECT {CLUSTER_COLUMNS} FROM clusters c
         WHERE c.user_id = ?1 AND c.main_link = ?2
           AND c.main_date_ms > ?3 AND c.main_date_ms < ?4
         ORDER BY c.main_date_ms ASC, c.id ASC
         LIMIT 1"
    );
    let result = conn
        .query_row(
            &sql,
            params![
                user_id,
                link,
                after.timestamp_millis(),
                before.timestamp_millis()
            ],
            cluster_from_row,
        )
        .optional()?;
    Ok(result)
}

fn link_article(conn: &Connection, article_id: i64, cluster_id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE articles SET cluster_id = ?1 WHERE id = ?2",
        params![cluster_id, article_id],
    )?;
    if updated == 0 {
        anyhow::bail!("Article {article_id} not found while linking it to cluster {cluster_id}");
    }
    Ok(())
}

/// Apply every pending write in a single transaction.
///
/// Returns the IDs of the clusters created or updated, in write order.
/// Nothing is persisted if any write fails.
pub fn commit(conn: &mut Connection, unit: UnitOfWork) -> Result<Vec<i64>> {
    let tx = conn.transaction()?;
    let mut touched = Vec::new();

    for write in unit.into_writes() {
        match write {
            PendingWrite::CreateCluster(draft) => {
                tx.execute(
                    "INSERT INTO clusters
                        (user_id, main_article_id, main_link, main_title, main_date_ms,
                         main_feed_title, read, liked)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        draft.user_id,
                        draft.main_article_id,
                        draft.main_link,
                        draft.main_title,
                        draft.main_date.timestamp_millis(),
                        draft.main_feed_title,
                        draft.read,
                        draft.liked,
                    ],
                )
                .context("Failed to insert cluster")?;
                let cluster_id = tx.last_insert_rowid();
                link_article(&tx, draft.main_article_id, cluster_id)?;
                touched.push(cluster_id);
            }
            PendingWrite::UpdateCluster(cluster) => {
                let updated = tx.execute(
                    "UPDATE clusters SET
                        main_article_id = ?1,
                        main_link = ?2,
                        main_title = ?3,
                        main_date_ms = ?4,
                        main_feed_title = ?5,
                        read = ?6,
                        liked = ?7
                     WHERE id = ?8 AND user_id = ?9",
                    params![
                        cluster.main_article_id,
                        cluster.main_link,
                        cluster.main_title,
                        cluster.main_date.timestamp_millis(),
                        cluster.main_feed_title,
                        cluster.read,
                        cluster.liked,
                        cluster.id,
                        cluster.user_id,
                    ],
                )?;
                if updated == 0 {
                    anyhow::bail!("Cluster {} not found while updating it", cluster.id);
                }
                touched.push(cluster.id);
            }
            PendingWrite::LinkArticle {
                article_id,
                cluster_id,
            } => link_article(&tx, article_id, cluster_id)?,
        }
    }

    tx.commit().context("Failed to commit cluster changes")?;
    Ok(touched)
}

/// Delete a cluster together with its member articles.
///
/// The representative reference is cleared first so no row ever points at
/// a deleted article, then the members go, then the cluster itself.
/// Returns false if the user has no such cluster.
pub fn delete_cluster(conn: &mut Connection, user_id: i64, cluster_id: i64) -> Result<bool> {
    let tx = conn.transaction()?;

    let cleared = tx.execute(
        "UPDATE clusters SET main_article_id = NULL WHERE id = ?1 AND user_id = ?2",
        params![cluster_id, user_id],
    )?;
    if cleared == 0 {
        return Ok(false);
    }
    tx.execute("DELETE FROM articles WHERE cluster_id = ?1", params![cluster_id])?;
    tx.execute("DELETE FROM clusters WHERE id = ?1", params![cluster_id])?;

    tx.commit()
        .with_context(|| format!("Failed to delete cluster {cluster_id}"))?;
    Ok(true)
}

/// Cluster summaries matching a filter, newest main date first.
pub fn list_clusters(conn: &Connection, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
    let (cond, mut values) = filter.to_sql();
    let sql = format!(
        "SELECT c.id, c.main_title, c.main_link, c.main_date_ms, c.main_feed_title,
                c.main_article_id, c.read, c.liked,
                group_concat(a.feed_id), group_concat(COALESCE(a.category_id, 0))
         FROM clusters c
         JOIN articles a ON a.cluster_id = c.id AND a.user_id = c.user_id
         WHERE {cond}
         GROUP BY c.id
         ORDER BY c.main_date_ms DESC, c.id DESC
         LIMIT ?"
    );
    values.push(Value::Integer(filter.effective_limit() as i64));
    let with_categories = filter.filters_on_category();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        let feeds: String = row.get(8)?;
        let categories: String = row.get(9)?;
        Ok(ClusterSummary {
            id: row.get(0)?,
            main_title: row.get(1)?,
            main_link: row.get(2)?,
            main_date: millis_to_date(3, row.get(3)?)?,
            main_feed_title: row.get(4)?,
            main_article_id: row.get(5)?,
            read: row.get(6)?,
            liked: row.get(7)?,
            feed_ids: parse_id_set(&feeds),
            category_ids: with_categories.then(|| parse_id_set(&categories)),
        })
    })?;

    let mut clusters = Vec::new();
    for row in rows {
        clusters.push(row?);
    }
    Ok(clusters)
}

/// Count clustered articles grouped by an article column, optionally only
/// for clusters in the given read state.
fn count_clustered_by(
    conn: &Connection,
    group_expr: &str,
    user_id: i64,
    read: Option<bool>,
) -> Result<BTreeMap<i64, i64>> {
    let sql = format!(
        "SELECT {group_expr}, COUNT(a.cluster_id)
         FROM articles a
         JOIN clusters c ON a.cluster_id = c.id
         WHERE a.user_id = ?1 AND (?2 IS NULL OR c.read = ?2)
         GROUP BY {group_expr}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, read], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row?;
        counts.insert(key, count);
    }
    Ok(counts)
}

/// Clustered article counts per feed.
pub fn count_by_feed(
    conn: &Connection,
    user_id: i64,
    read: Option<bool>,
) -> Result<BTreeMap<i64, i64>> {
    count_clustered_by(conn, "a.feed_id", user_id, read)
}

/// Clustered article counts per category (0 for uncategorized).
pub fn count_by_category(
    conn: &Connection,
    user_id: i64,
    read: Option<bool>,
) -> Result<BTreeMap<i64, i64>> {
    count_clustered_by(conn, "COALESCE(a.category_id, 0)", user_id, read)
}

pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(StoreStats {
        feeds: count("SELECT COUNT(*) FROM feeds")?,
        categories: count("SELECT COUNT(*) FROM categories")?,
        articles: count("SELECT COUNT(*) FROM articles")?,
        clusters: count("SELECT COUNT(*) FROM clusters")?,
        unclustered_articles: count("SELECT COUNT(*) FROM articles WHERE cluster_id IS NULL")?,
    })
}
