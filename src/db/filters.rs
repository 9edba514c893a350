// Typed query filters for articles and clusters.
//
// Each builder collects named predicates and renders them into a SQL
// condition plus its bound values. Only queries.rs consumes the rendered
// form; everything else builds filters through the named methods.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;

/// Hard cap on the number of cluster summaries a single listing returns.
pub const MAX_CLUSTER_RESULTS: usize = 1000;

/// Normalize a title for case-insensitive exact matching.
///
/// Unicode-aware lowercasing only, since SQLite's own `lower()` folds just
/// ASCII. Whitespace is kept as written: "a  b" and "a b" are different titles.
pub fn title_key(title: &str) -> String {
    title.to_lowercase()
}

/// Escape `%`, `_` and `\` so user text is matched literally by LIKE ... ESCAPE '\'.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(text: &str) -> String {
    format!("%{}%", escape_like(text))
}

/// Predicates over a single user's articles.
///
/// Results of a filtered read are ordered oldest first (then by id), which
/// gives the similarity engine a stable neighbor order.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    user_id: i64,
    feed_id: Option<i64>,
    link: Option<String>,
    category: Option<Option<i64>>,
    dated_at: Option<DateTime<Utc>>,
    dated_after: Option<DateTime<Utc>>,
    dated_before: Option<DateTime<Utc>>,
    title_key: Option<String>,
    clustered: bool,
    unclustered: bool,
    cluster_id: Option<i64>,
    exclude_id: Option<i64>,
    with_tokens: bool,
    language: Option<String>,
    limit: Option<usize>,
}

impl ArticleFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn feed(mut self, feed_id: i64) -> Self {
        self.feed_id = Some(feed_id);
        self
    }

    /// Match a stored (trimmed) link exactly.
    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Restrict to a category; `None` selects uncategorized articles.
    pub fn category(mut self, category_id: Option<i64>) -> Self {
        self.category = Some(category_id);
        self
    }

    /// Keep articles published at exactly this instant (millisecond precision).
    pub fn dated_at(mut self, date: DateTime<Utc>) -> Self {
        self.dated_at = Some(date);
        self
    }

    /// Keep articles strictly between `after` and `before`.
    pub fn dated_between(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.dated_after = Some(after);
        self.dated_before = Some(before);
        self
    }

    /// Match a normalized title exactly (see [`title_key`]).
    pub fn title_key(mut self, key: impl Into<String>) -> Self {
        self.title_key = Some(key.into());
        self
    }

    /// Only articles that already belong to a cluster.
    pub fn clustered(mut self) -> Self {
        self.clustered = true;
        self
    }

    /// Only articles that were stored but never assigned a cluster.
    pub fn unclustered(mut self) -> Self {
        self.unclustered = true;
        self
    }

    pub fn in_cluster(mut self, cluster_id: i64) -> Self {
        self.cluster_id = Some(cluster_id);
        self
    }

    pub fn excluding(mut self, article_id: i64) -> Self {
        self.exclude_id = Some(article_id);
        self
    }

    /// Only articles with at least one valuable token.
    pub fn with_tokens(mut self) -> Self {
        self.with_tokens = true;
        self
    }

    /// Match articles whose language shares this primary subtag, so "en"
    /// selects "en", "en_US" and "en-GB" alike.
    pub fn language(mut self, primary_subtag: impl Into<String>) -> Self {
        self.language = Some(primary_subtag.into().to_lowercase());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub(crate) fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Render the predicates as a condition over the `a` articles alias.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conds = vec!["a.user_id = ?".to_string()];
        let mut values = vec![Value::Integer(self.user_id)];

        if let Some(feed_id) = self.feed_id {
            conds.push("a.feed_id = ?".into());
            values.push(Value::Integer(feed_id));
        }
        if let Some(link) = &self.link {
            conds.push("a.link = ?".into());
            values.push(Value::Text(link.clone()));
        }
        match self.category {
            Some(Some(id)) => {
                conds.push("a.category_id = ?".into());
                values.push(Value::Integer(id));
            }
            Some(None) => conds.push("a.category_id IS NULL".into()),
            None => {}
        }
        if let Some(date) = self.dated_at {
            conds.push("a.date_ms = ?".into());
            values.push(Value::Integer(date.timestamp_millis()));
        }
        if let Some(after) = self.dated_after {
            conds.push("a.date_ms > ?".into());
            values.push(Value::Integer(after.timestamp_millis()));
        }
        if let Some(before) = self.dated_before {
            conds.push("a.date_ms < ?".into());
            values.push(Value::Integer(before.timestamp_millis()));
        }
        if let Some(key) = &self.title_key {
            conds.push("a.title_key = ?".into());
            values.push(Value::Text(key.clone()));
        }
        if self.clustered {
            conds.push("a.cluster_id IS NOT NULL".into());
        }
        if self.unclustered {
            conds.push("a.cluster_id IS NULL".into());
        }
        if let Some(cluster_id) = self.cluster_id {
            conds.push("a.cluster_id = ?".into());
            values.push(Value::Integer(cluster_id));
        }
        if let Some(id) = self.exclude_id {
            conds.push("a.id != ?".into());
            values.push(Value::Integer(id));
        }
        if self.with_tokens {
            conds.push("a.valuable_tokens != '[]'".into());
        }
        if let Some(lang) = &self.language {
            conds.push(
                "(lower(a.lang) = ? OR lower(a.lang) LIKE ? ESCAPE '\\' \
                 OR lower(a.lang) LIKE ? ESCAPE '\\')"
                    .into(),
            );
            let escaped = escape_like(lang);
            values.push(Value::Text(lang.clone()));
            values.push(Value::Text(format!("{escaped}\\_%")));
            values.push(Value::Text(format!("{escaped}-%")));
        }

        (conds.join(" AND "), values)
    }
}

/// Predicates for the cluster listing.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    user_id: i64,
    feed_id: Option<i64>,
    category_id: Option<i64>,
    read: Option<bool>,
    liked: Option<bool>,
    title_contains: Option<String>,
    content_contains: Option<String>,
    text_contains: Option<String>,
    limit: Option<usize>,
}

impl ClusterFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Clusters with at least one member from this feed.
    pub fn feed(mut self, feed_id: i64) -> Self {
        self.feed_id = Some(feed_id);
        self
    }

    /// Clusters with at least one member in this category (0 = uncategorized).
    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    pub fn liked(mut self, liked: bool) -> Self {
        self.liked = Some(liked);
        self
    }

    pub fn title_contains(mut self, text: impl Into<String>) -> Self {
        self.title_contains = Some(text.into());
        self
    }

    pub fn content_contains(mut self, text: impl Into<String>) -> Self {
        self.content_contains = Some(text.into());
        self
    }

    /// Substring match against either the title or the content of a member.
    pub fn text_contains(mut self, text: impl Into<String>) -> Self {
        self.text_contains = Some(text.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn filters_on_category(&self) -> bool {
        self.category_id.is_some()
    }

    /// Requested limit clamped to [`MAX_CLUSTER_RESULTS`].
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(MAX_CLUSTER_RESULTS)
            .min(MAX_CLUSTER_RESULTS)
    }

    /// Render the predicates as a condition over the `c` clusters alias.
    ///
    /// Member-level predicates become EXISTS subqueries so the outer join
    /// still aggregates every member of a matching cluster.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conds = vec!["c.user_id = ?".to_string()];
        let mut values = vec![Value::Integer(self.user_id)];

        if let Some(feed_id) = self.feed_id {
            conds.push(
                "EXISTS (SELECT 1 FROM articles f WHERE f.cluster_id = c.id \
                 AND f.user_id = c.user_id AND f.feed_id = ?)"
                    .into(),
            );
            values.push(Value::Integer(feed_id));
        }
        if let Some(category_id) = self.category_id {
            conds.push(
                "EXISTS (SELECT 1 FROM articles g WHERE g.cluster_id = c.id \
                 AND g.user_id = c.user_id AND COALESCE(g.category_id, 0) = ?)"
                    .into(),
            );
            values.push(Value::Integer(category_id));
        }
        if let Some(read) = self.read {
            conds.push("c.read = ?".into());
            values.push(Value::Integer(read as i64));
        }
        if let Some(liked) = self.liked {
            conds.push("c.liked = ?".into());
            values.push(Value::Integer(liked as i64));
        }

        let mut member_conds = Vec::new();
        if let Some(text) = &self.title_contains {
            member_conds.push("s.title LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(contains_pattern(text)));
        }
        if let Some(text) = &self.content_contains {
            member_conds.push("s.content LIKE ? ESCAPE '\\'".to_string());
            values.push(Value::Text(contains_pattern(text)));
        }
        if let Some(text) = &self.text_contains {
            member_conds
                .push("(s.title LIKE ? ESCAPE '\\' OR s.content LIKE ? ESCAPE '\\')".to_string());
            values.push(Value::Text(contains_pattern(text)));
            values.push(Value::Text(contains_pattern(text)));
        }
        if !member_conds.is_empty() {
            conds.push(format!(
                "EXISTS (SELECT 1 FROM articles s WHERE s.cluster_id = c.id \
                 AND s.user_id = c.user_id AND {})",
                member_conds.join(" AND ")
            ));
        }

        (conds.join(" AND "), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_key_folds_case_only() {
        assert_eq!(title_key("Storm Hits REGION"), "storm hits region");
        assert_eq!(title_key("ÉTÉ Chaud"), "été chaud");
        assert_ne!(title_key("Storm  Hits"), title_key("storm hits"));
        assert_ne!(title_key("Storm hits "), title_key("storm hits"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_article_filter_binds_in_order() {
        let (sql, values) = ArticleFilter::for_user(7)
            .category(Some(3))
            .clustered()
            .excluding(11)
            .to_sql();
        assert_eq!(
            sql,
            "a.user_id = ? AND a.category_id = ? AND a.cluster_id IS NOT NULL AND a.id != ?"
        );
        assert_eq!(
            values,
            vec![Value::Integer(7), Value::Integer(3), Value::Integer(11)]
        );
    }

    #[test]
    fn test_article_filter_stored_copy() {
        let date = chrono::DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let (sql, values) = ArticleFilter::for_user(1)
            .feed(2)
            .link("http://a.com/1")
            .dated_at(date)
            .unclustered()
            .to_sql();
        assert_eq!(
            sql,
            "a.user_id = ? AND a.feed_id = ? AND a.link = ? AND a.date_ms = ? AND a.cluster_id IS NULL"
        );
        assert_eq!(
            values,
            vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Text("http://a.com/1".into()),
                Value::Integer(1_700_000_000_123),
            ]
        );
    }

    #[test]
    fn test_article_filter_uncategorized() {
        let (sql, values) = ArticleFilter::for_user(1).category(None).to_sql();
        assert!(sql.contains("a.category_id IS NULL"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_language_patterns_escape_underscore() {
        let (_, values) = ArticleFilter::for_user(1).language("EN").to_sql();
        assert_eq!(
            values[1..],
            [
                Value::Text("en".into()),
                Value::Text("en\\_%".into()),
                Value::Text("en-%".into()),
            ]
        );
    }

    #[test]
    fn test_cluster_limit_is_capped() {
        assert_eq!(ClusterFilter::for_user(1).effective_limit(), 1000);
        assert_eq!(ClusterFilter::for_user(1).limit(20).effective_limit(), 20);
        assert_eq!(ClusterFilter::for_user(1).limit(5000).effective_limit(), 1000);
    }

    #[test]
    fn test_text_filters_share_one_member() {
        let (sql, values) = ClusterFilter::for_user(1)
            .title_contains("storm")
            .content_contains("wind")
            .to_sql();
        assert_eq!(sql.matches("EXISTS").count(), 1);
        assert_eq!(values[1], Value::Text("%storm%".into()));
        assert_eq!(values[2], Value::Text("%wind%".into()));
    }
}
