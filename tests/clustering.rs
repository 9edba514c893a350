// Clustering service tests against an in-memory SQLite store.
//
// Each test builds a fresh store, registers the feeds and categories it
// needs, and drives the public ClusterService API the way ingestion does.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use newsfold::clustering::{
    CategoryLookup, ClusterError, ClusterService, ClusteringSettings, Degradation, MatchStrategy,
    MemberFlags,
};
use newsfold::db::filters::{ArticleFilter, ClusterFilter};
use newsfold::db::models::{
    Article, Category, Cluster, ClusterSummary, Feed, IncomingArticle, NewArticle, StoreStats,
};
use newsfold::db::unit_of_work::UnitOfWork;
use newsfold::db::{Database, SqliteDatabase};
use newsfold::similarity::tfidf::TfIdfEngine;

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn service_for(db: &Arc<SqliteDatabase>) -> ClusterService {
    let repo: Arc<dyn Database> = db.clone();
    let categories: Arc<dyn CategoryLookup> = db.clone();
    ClusterService::new(
        repo,
        categories,
        Arc::new(TfIdfEngine),
        ClusteringSettings::default(),
    )
}

fn setup() -> (Arc<SqliteDatabase>, ClusterService) {
    let db = Arc::new(SqliteDatabase::in_memory().unwrap());
    let service = service_for(&db);
    (db, service)
}

fn incoming(user_id: i64, feed_id: i64, link: &str, title: &str, date: DateTime<Utc>) -> IncomingArticle {
    IncomingArticle {
        user_id,
        feed_id,
        link: link.to_string(),
        title: title.to_string(),
        date: Some(date),
        lang: "en".to_string(),
        ..IncomingArticle::default()
    }
}

fn tokens(words: &str) -> Vec<String> {
    words.split_whitespace().map(String::from).collect()
}

fn unread() -> MemberFlags {
    MemberFlags {
        read: Some(false),
        liked: false,
    }
}

async fn cluster_count(db: &SqliteDatabase, user_id: i64) -> usize {
    db.list_clusters(&ClusterFilter::for_user(user_id))
        .await
        .unwrap()
        .len()
}

// ============================================================
// New clusters and link matching
// ============================================================

#[tokio::test]
async fn first_article_starts_its_own_cluster() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    let outcome = service
        .ingest(incoming(1, feed, "http://a.com/storm", "Storm hits coast", base_date()), unread())
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.matched_by, None);
    assert_eq!(outcome.degraded, None);
    assert_eq!(outcome.cluster.main_link, "http://a.com/storm");
    assert_eq!(outcome.cluster.main_title, "Storm hits coast");
    assert_eq!(outcome.cluster.main_date, base_date());
    assert_eq!(outcome.cluster.main_feed_title, "Wire");

    let article_id = outcome.cluster.main_article_id.unwrap();
    let article = db.get_article(article_id).await.unwrap().unwrap();
    assert_eq!(article.cluster_id, Some(outcome.cluster.id));
}

#[tokio::test]
async fn same_link_later_joins_and_keeps_main_date() {
    let (db, service) = setup();
    let wire = db.insert_feed(1, "Wire").await.unwrap();
    let mirror = db.insert_feed(1, "Mirror").await.unwrap();

    let first = service
        .ingest(incoming(1, wire, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    let second = service
        .ingest(
            incoming(1, mirror, "http://a.com/1", "Storm (updated)", base_date() + Duration::hours(2)),
            unread(),
        )
        .await
        .unwrap();

    assert!(!second.created);
    assert_eq!(second.matched_by, Some(MatchStrategy::Link));
    assert_eq!(second.cluster.id, first.cluster.id);
    assert_eq!(second.cluster.main_date, base_date());
    assert_eq!(second.cluster.main_article_id, first.cluster.main_article_id);

    let listed = db.list_clusters(&ClusterFilter::for_user(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].feed_ids.len(), 2);
}

#[tokio::test]
async fn same_link_outside_window_starts_new_cluster() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    service
        .ingest(incoming(1, feed, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    let repost = service
        .ingest(
            incoming(1, feed, "http://a.com/1", "Storm", base_date() + Duration::days(30)),
            unread(),
        )
        .await
        .unwrap();

    assert!(repost.created);
    assert_eq!(cluster_count(&db, 1).await, 2);
}

#[tokio::test]
async fn earlier_article_becomes_representative() {
    let (db, service) = setup();
    let wire = db.insert_feed(1, "Wire").await.unwrap();
    let early = db.insert_feed(1, "Early Bird").await.unwrap();

    let first = service
        .ingest(incoming(1, wire, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    let earlier = service
        .ingest(
            incoming(1, early, "http://a.com/1", "Storm warning", base_date() - Duration::hours(3)),
            unread(),
        )
        .await
        .unwrap();

    assert_eq!(earlier.cluster.id, first.cluster.id);
    assert_eq!(earlier.cluster.main_date, base_date() - Duration::hours(3));
    assert_eq!(earlier.cluster.main_title, "Storm warning");
    assert_eq!(earlier.cluster.main_feed_title, "Early Bird");
    assert_ne!(earlier.cluster.main_article_id, first.cluster.main_article_id);
    assert_eq!(earlier.cluster.main_link, "http://a.com/1");
}

// ============================================================
// Title matching
// ============================================================

#[tokio::test]
async fn title_match_ignores_case() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let news = db.insert_category(1, "News", true).await.unwrap();

    let first = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                ..incoming(1, feed, "http://a.com/1", "Storm Hits Coast", base_date())
            },
            unread(),
        )
        .await
        .unwrap();
    let second = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                ..incoming(1, feed, "http://b.com/9", "storm hits COAST", base_date() + Duration::hours(1))
            },
            unread(),
        )
        .await
        .unwrap();

    assert_eq!(second.matched_by, Some(MatchStrategy::Title));
    assert_eq!(second.cluster.id, first.cluster.id);
}

#[tokio::test]
async fn title_match_is_exact_about_whitespace() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let news = db.insert_category(1, "News", true).await.unwrap();

    let first = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                ..incoming(1, feed, "http://a.com/1", "Storm hits coast", base_date())
            },
            unread(),
        )
        .await
        .unwrap();
    let second = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                ..incoming(1, feed, "http://b.com/9", "Storm  hits coast", base_date())
            },
            unread(),
        )
        .await
        .unwrap();

    assert!(second.created);
    assert_ne!(second.cluster.id, first.cluster.id);
}

#[tokio::test]
async fn title_match_needs_title_clustering_category() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let plain = db.insert_category(1, "Plain", false).await.unwrap();

    for (link, category_id) in [
        ("http://a.com/1", Some(plain)),
        ("http://a.com/2", Some(plain)),
        ("http://a.com/3", None),
        ("http://a.com/4", None),
    ] {
        let outcome = service
            .ingest(
                IncomingArticle {
                    category_id,
                    ..incoming(1, feed, link, "Storm hits coast", base_date())
                },
                unread(),
            )
            .await
            .unwrap();
        assert!(outcome.created, "{link} should start its own cluster");
    }
    assert_eq!(cluster_count(&db, 1).await, 4);
}

#[tokio::test]
async fn link_match_takes_precedence_over_title() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let news = db.insert_category(1, "News", true).await.unwrap();
    let in_news = |link: &str, title: &str| IncomingArticle {
        category_id: Some(news),
        ..incoming(1, feed, link, title, base_date())
    };

    let by_link = service.ingest(in_news("http://a.com/1", "Storm"), unread()).await.unwrap();
    let by_title = service.ingest(in_news("http://a.com/2", "Election"), unread()).await.unwrap();
    assert_ne!(by_link.cluster.id, by_title.cluster.id);

    let both = service.ingest(in_news("http://a.com/1", "Election"), unread()).await.unwrap();
    assert_eq!(both.matched_by, Some(MatchStrategy::Link));
    assert_eq!(both.cluster.id, by_link.cluster.id);
}

// ============================================================
// Similarity matching
// ============================================================

/// `count` unrelated clustered stories in one title-clustering category.
async fn seed_neighbors(db: &SqliteDatabase, service: &ClusterService, count: usize) -> (i64, i64, Vec<i64>) {
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let news = db.insert_category(1, "News", true).await.unwrap();

    let mut cluster_ids = Vec::new();
    for i in 0..count {
        let outcome = service
            .ingest(
                IncomingArticle {
                    category_id: Some(news),
                    valuable_tokens: tokens(&format!("alpha{i} bravo{i} charlie{i} report")),
                    ..incoming(
                        1,
                        feed,
                        &format!("http://a.com/{i}"),
                        &format!("Story number {i}"),
                        base_date() + Duration::minutes(i as i64),
                    )
                },
                unread(),
            )
            .await
            .unwrap();
        assert!(outcome.created);
        cluster_ids.push(outcome.cluster.id);
    }
    (feed, news, cluster_ids)
}

#[tokio::test]
async fn too_few_neighbors_degrades_to_new_cluster() {
    let (db, service) = setup();
    let (feed, news, _) = seed_neighbors(&db, &service, 9).await;

    let outcome = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                valuable_tokens: tokens("alpha3 bravo3 charlie3 report"),
                ..incoming(1, feed, "http://b.com/x", "A different headline", base_date())
            },
            unread(),
        )
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(
        outcome.degraded,
        Some(Degradation::InsufficientSample {
            found: 9,
            required: 10
        })
    );
}

#[tokio::test]
async fn similar_tokens_join_existing_cluster() {
    let (db, service) = setup();
    let (feed, news, cluster_ids) = seed_neighbors(&db, &service, 10).await;

    let outcome = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                valuable_tokens: tokens("alpha3 bravo3 charlie3 report"),
                ..incoming(1, feed, "http://b.com/x", "A different headline", base_date())
            },
            unread(),
        )
        .await
        .unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.degraded, None);
    assert_eq!(outcome.cluster.id, cluster_ids[3]);
    match outcome.matched_by {
        Some(MatchStrategy::Similarity { score }) => assert!(score > 0.45, "score {score}"),
        other => panic!("expected a similarity match, got {other:?}"),
    }
}

#[tokio::test]
async fn dissimilar_tokens_start_new_cluster() {
    let (db, service) = setup();
    let (feed, news, _) = seed_neighbors(&db, &service, 10).await;

    let outcome = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                valuable_tokens: tokens("volcano eruption island ash"),
                ..incoming(1, feed, "http://b.com/x", "Volcano erupts", base_date())
            },
            unread(),
        )
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.degraded, None);
}

#[tokio::test]
async fn other_language_neighbors_do_not_count() {
    let (db, service) = setup();
    let (feed, news, _) = seed_neighbors(&db, &service, 10).await;

    let outcome = service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                lang: "fr_FR".to_string(),
                valuable_tokens: tokens("alpha3 bravo3 charlie3 report"),
                ..incoming(1, feed, "http://b.com/x", "Un autre titre", base_date())
            },
            unread(),
        )
        .await
        .unwrap();

    assert!(outcome.created);
    assert_eq!(
        outcome.degraded,
        Some(Degradation::InsufficientSample {
            found: 0,
            required: 10
        })
    );
}

// ============================================================
// Read/liked aggregation
// ============================================================

#[tokio::test]
async fn read_only_while_all_members_read_and_liked_sticks() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let at = |hours: i64| incoming(1, feed, "http://a.com/1", "Storm", base_date() + Duration::hours(hours));

    let read_member = MemberFlags {
        read: Some(true),
        liked: false,
    };
    let first = service.ingest(at(0), read_member).await.unwrap();
    assert!(first.cluster.read);
    assert!(!first.cluster.liked);

    let second = service.ingest(at(1), unread()).await.unwrap();
    assert!(!second.cluster.read);

    let liked = MemberFlags {
        read: Some(true),
        liked: true,
    };
    let third = service.ingest(at(2), liked).await.unwrap();
    assert!(!third.cluster.read, "an unread member keeps the cluster unread");
    assert!(third.cluster.liked);

    let fourth = service.ingest(at(3), unread()).await.unwrap();
    assert!(fourth.cluster.liked);
    assert_eq!(cluster_count(&db, 1).await, 1);
}

// ============================================================
// Idempotence, concurrency, isolation
// ============================================================

#[tokio::test]
async fn clustering_twice_is_rejected() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    let outcome = service
        .ingest(incoming(1, feed, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    let article_id = outcome.cluster.main_article_id.unwrap();

    let err = service.clusterize(article_id, unread()).await.unwrap_err();
    assert!(matches!(
        err,
        ClusterError::AlreadyClustered { cluster_id, .. } if cluster_id == outcome.cluster.id
    ));
    assert_eq!(cluster_count(&db, 1).await, 1);
}

#[tokio::test]
async fn clusterize_unknown_article() {
    let (_db, service) = setup();
    let err = service.clusterize(404, unread()).await.unwrap_err();
    assert!(matches!(err, ClusterError::ArticleNotFound(404)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_link_articles_share_one_cluster() {
    let db = Arc::new(SqliteDatabase::in_memory().unwrap());
    let service = Arc::new(service_for(&db));
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    let mut article_ids = Vec::new();
    for i in 0..8 {
        let id = db
            .insert_article(&NewArticle {
                user_id: 1,
                feed_id: feed,
                category_id: None,
                link: "http://a.com/breaking".to_string(),
                title: "Breaking".to_string(),
                content: String::new(),
                date: base_date() + Duration::minutes(i),
                lang: "en".to_string(),
                valuable_tokens: vec![],
                read: false,
                liked: false,
            })
            .await
            .unwrap();
        article_ids.push(id);
    }

    let handles: Vec<_> = article_ids
        .into_iter()
        .map(|id| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.clusterize(id, unread()).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(cluster_count(&db, 1).await, 1);
    let cluster = &db.list_clusters(&ClusterFilter::for_user(1)).await.unwrap()[0];
    assert_eq!(cluster.main_date, base_date());
}

#[tokio::test]
async fn users_never_share_clusters() {
    let (db, service) = setup();
    let feed_a = db.insert_feed(1, "Wire").await.unwrap();
    let feed_b = db.insert_feed(2, "Wire").await.unwrap();

    let a = service
        .ingest(incoming(1, feed_a, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    let b = service
        .ingest(incoming(2, feed_b, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();

    assert!(b.created);
    assert_ne!(a.cluster.id, b.cluster.id);
    assert_eq!(cluster_count(&db, 1).await, 1);
    assert_eq!(cluster_count(&db, 2).await, 1);

    // User 2 can't see or delete user 1's cluster
    let err = service.delete_cluster(2, a.cluster.id).await.unwrap_err();
    assert!(matches!(err, ClusterError::ClusterNotFound(_)));
    assert_eq!(cluster_count(&db, 1).await, 1);
}

// ============================================================
// Failed cluster writes
// ============================================================

/// Store wrapper whose first commit fails, as a transient disk error would.
struct FailFirstCommit {
    inner: SqliteDatabase,
    failed: AtomicBool,
}

#[async_trait]
impl Database for FailFirstCommit {
    async fn table_count(&self) -> Result<i64> {
        self.inner.table_count().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }

    async fn insert_feed(&self, user_id: i64, title: &str) -> Result<i64> {
        self.inner.insert_feed(user_id, title).await
    }

    async fn get_feed(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        self.inner.get_feed(user_id, feed_id).await
    }

    async fn insert_category(&self, user_id: i64, name: &str, cluster_on_title: bool) -> Result<i64> {
        self.inner.insert_category(user_id, name, cluster_on_title).await
    }

    async fn get_category(&self, user_id: i64, category_id: i64) -> Result<Option<Category>> {
        self.inner.get_category(user_id, category_id).await
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        self.inner.insert_article(article).await
    }

    async fn get_article(&self, article_id: i64) -> Result<Option<Article>> {
        self.inner.get_article(article_id).await
    }

    async fn find_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        self.inner.find_articles(filter).await
    }

    async fn get_cluster(&self, user_id: i64, cluster_id: i64) -> Result<Option<Cluster>> {
        self.inner.get_cluster(user_id, cluster_id).await
    }

    async fn find_cluster_by_link(
        &self,
        user_id: i64,
        link: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<Cluster>> {
        self.inner.find_cluster_by_link(user_id, link, after, before).await
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<Vec<i64>> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.commit(unit).await
    }

    async fn delete_cluster(&self, user_id: i64, cluster_id: i64) -> Result<bool> {
        self.inner.delete_cluster(user_id, cluster_id).await
    }

    async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        self.inner.list_clusters(filter).await
    }

    async fn count_by_feed(&self, user_id: i64, read: Option<bool>) -> Result<BTreeMap<i64, i64>> {
        self.inner.count_by_feed(user_id, read).await
    }

    async fn count_by_category(&self, user_id: i64, read: Option<bool>) -> Result<BTreeMap<i64, i64>> {
        self.inner.count_by_category(user_id, read).await
    }
}

#[tokio::test]
async fn retried_ingest_resumes_stored_article() {
    let db = Arc::new(FailFirstCommit {
        inner: SqliteDatabase::in_memory().unwrap(),
        failed: AtomicBool::new(false),
    });
    let repo: Arc<dyn Database> = db.clone();
    let categories: Arc<dyn CategoryLookup> = Arc::new(SqliteDatabase::in_memory().unwrap());
    let service = ClusterService::new(
        repo,
        categories,
        Arc::new(TfIdfEngine),
        ClusteringSettings::default(),
    );
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let article = incoming(1, feed, "http://a.com/storm", "Storm hits coast", base_date());

    let err = service.ingest(article.clone(), unread()).await.unwrap_err();
    let ClusterError::Unclustered { article_id, .. } = &err else {
        panic!("expected a stored-but-unclustered error, got {err}");
    };
    assert!(err.is_retryable());
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.articles, 1);
    assert_eq!(stats.unclustered_articles, 1);

    let outcome = service.ingest(article, unread()).await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.cluster.main_article_id, Some(*article_id));

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.articles, 1);
    assert_eq!(stats.clusters, 1);
    assert_eq!(stats.unclustered_articles, 0);
}

#[tokio::test]
async fn ingesting_a_clustered_article_again_adds_a_member() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let article = incoming(1, feed, "http://a.com/storm", "Storm hits coast", base_date());

    let first = service.ingest(article.clone(), unread()).await.unwrap();
    let second = service.ingest(article, unread()).await.unwrap();

    assert_eq!(second.matched_by, Some(MatchStrategy::Link));
    assert_eq!(second.cluster.id, first.cluster.id);
    assert_eq!(db.stats().await.unwrap().articles, 2);
}

// ============================================================
// Input validation and deletion
// ============================================================

#[tokio::test]
async fn invalid_input_writes_nothing() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    let missing_link = incoming(1, feed, "  ", "Storm", base_date());
    let missing_date = IncomingArticle {
        date: None,
        ..incoming(1, feed, "http://a.com/1", "Storm", base_date())
    };
    let foreign_feed = incoming(2, feed, "http://a.com/2", "Storm", base_date());
    let unknown_category = IncomingArticle {
        category_id: Some(999),
        ..incoming(1, feed, "http://a.com/3", "Storm", base_date())
    };
    let other_users_category = IncomingArticle {
        category_id: Some(db.insert_category(2, "News", true).await.unwrap()),
        ..incoming(1, feed, "http://a.com/4", "Storm", base_date())
    };

    for article in [
        missing_link,
        missing_date,
        foreign_feed,
        unknown_category,
        other_users_category,
    ] {
        let err = service.ingest(article, unread()).await.unwrap_err();
        assert!(matches!(err, ClusterError::Input(_)), "got {err}");
        assert!(!err.is_retryable());
    }

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.articles, 0);
    assert_eq!(stats.clusters, 0);
}

#[tokio::test]
async fn delete_removes_cluster_and_members() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();

    let first = service
        .ingest(incoming(1, feed, "http://a.com/1", "Storm", base_date()), unread())
        .await
        .unwrap();
    service
        .ingest(
            incoming(1, feed, "http://a.com/1", "Storm", base_date() + Duration::hours(1)),
            unread(),
        )
        .await
        .unwrap();
    let other = service
        .ingest(incoming(1, feed, "http://a.com/2", "Election", base_date()), unread())
        .await
        .unwrap();

    let members = service.cluster_members(1, first.cluster.id).await.unwrap();
    assert_eq!(members.len(), 2);

    service.delete_cluster(1, first.cluster.id).await.unwrap();

    for member in &members {
        assert!(db.get_article(member.id).await.unwrap().is_none());
    }
    let remaining = db.list_clusters(&ClusterFilter::for_user(1)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, other.cluster.id);

    let err = service.delete_cluster(1, first.cluster.id).await.unwrap_err();
    assert!(matches!(err, ClusterError::ClusterNotFound(_)));
    let err = service.cluster_members(1, first.cluster.id).await.unwrap_err();
    assert!(matches!(err, ClusterError::ClusterNotFound(_)));
}

// ============================================================
// Listings and counts
// ============================================================

#[tokio::test]
async fn listing_filters_by_category_and_state() {
    let (db, service) = setup();
    let feed = db.insert_feed(1, "Wire").await.unwrap();
    let news = db.insert_category(1, "News", false).await.unwrap();

    service
        .ingest(
            IncomingArticle {
                category_id: Some(news),
                ..incoming(1, feed, "http://a.com/1", "Storm", base_date())
            },
            unread(),
        )
        .await
        .unwrap();
    service
        .ingest(
            incoming(1, feed, "http://a.com/2", "Election", base_date() + Duration::hours(1)),
            MemberFlags {
                read: Some(true),
                liked: true,
            },
        )
        .await
        .unwrap();

    let all = service.list_clusters(&ClusterFilter::for_user(1)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].main_title, "Election", "newest first");
    assert!(all[0].category_ids.is_none());

    let in_news = service
        .list_clusters(&ClusterFilter::for_user(1).category(news))
        .await
        .unwrap();
    assert_eq!(in_news.len(), 1);
    assert_eq!(in_news[0].main_title, "Storm");
    assert_eq!(in_news[0].category_ids.as_ref().unwrap().len(), 1);

    let unread_only = service
        .list_clusters(&ClusterFilter::for_user(1).read(false))
        .await
        .unwrap();
    assert_eq!(unread_only.len(), 1);
    assert_eq!(unread_only[0].main_title, "Storm");

    let liked = service
        .list_clusters(&ClusterFilter::for_user(1).liked(true))
        .await
        .unwrap();
    assert_eq!(liked.len(), 1);

    let searched = service
        .list_clusters(&ClusterFilter::for_user(1).text_contains("storm"))
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);

    let by_category = db.count_by_category(1, None).await.unwrap();
    assert_eq!(by_category.get(&news), Some(&1));
    assert_eq!(by_category.get(&0), Some(&1));
    let unread_by_feed = db.count_by_feed(1, Some(false)).await.unwrap();
    assert_eq!(unread_by_feed.get(&feed), Some(&1));
}
