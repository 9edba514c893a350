// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the clustering pipeline. They're
// separate from the database queries so other modules can use them without
// depending on rusqlite directly.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed a user subscribes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
}

/// A user-defined category. `cluster_on_title` turns on title and
/// similarity matching for articles filed under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub cluster_on_title: bool,
}

/// An article as delivered by ingestion, before validation.
///
/// Every field the clustering core relies on is optional or defaulted here
/// so a malformed record can be rejected with a precise reason instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingArticle {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub feed_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub valuable_tokens: Vec<String>,
}

/// A validated article, ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub user_id: i64,
    pub feed_id: i64,
    pub category_id: Option<i64>,
    pub link: String,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
    pub lang: String,
    pub valuable_tokens: Vec<String>,
    pub read: bool,
    pub liked: bool,
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub category_id: Option<i64>,
    pub link: String,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
    pub lang: String,
    pub valuable_tokens: Vec<String>,
    pub cluster_id: Option<i64>,
    pub read: bool,
    pub liked: bool,
    /// Title of the owning feed, joined in at read time.
    pub feed_title: String,
}

/// A group of near-duplicate articles about the same story.
///
/// The `main_*` fields are denormalized from the representative article,
/// which is always the earliest-dated member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub user_id: i64,
    pub main_article_id: Option<i64>,
    pub main_link: String,
    pub main_title: String,
    pub main_date: DateTime<Utc>,
    pub main_feed_title: String,
    /// True only while every member is read.
    pub read: bool,
    /// True as soon as any member is liked.
    pub liked: bool,
}

/// A cluster that hasn't been inserted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDraft {
    pub user_id: i64,
    pub main_article_id: i64,
    pub main_link: String,
    pub main_title: String,
    pub main_date: DateTime<Utc>,
    pub main_feed_title: String,
    pub read: bool,
    pub liked: bool,
}

/// Read-side view of a cluster for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: i64,
    pub main_title: String,
    pub main_link: String,
    pub main_date: DateTime<Utc>,
    pub main_feed_title: String,
    pub main_article_id: Option<i64>,
    pub read: bool,
    pub liked: bool,
    /// Every feed that contributed a member.
    pub feed_ids: BTreeSet<i64>,
    /// Contributing categories (0 for uncategorized members). Only filled
    /// when the listing was filtered by category.
    pub category_ids: Option<BTreeSet<i64>>,
}

/// Row counts, for `newsfold status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub feeds: i64,
    pub categories: i64,
    pub articles: i64,
    pub clusters: i64,
    pub unclustered_articles: i64,
}
