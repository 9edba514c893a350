use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use newsfold::clustering::{CategoryLookup, ClusterService, MemberFlags};
use newsfold::config::Config;
use newsfold::db::filters::ClusterFilter;
use newsfold::db::models::IncomingArticle;
use newsfold::db::{Database, SqliteDatabase};
use newsfold::output::terminal;
use newsfold::similarity::tfidf::TfIdfEngine;
use newsfold::similarity::tokens::extract_valuable_tokens;

/// Newsfold: fold near-duplicate feed articles into stories.
///
/// Groups articles that cover the same story by exact link, case-insensitive
/// title, and TF-IDF similarity of their valuable tokens.
#[derive(Parser)]
#[command(name = "newsfold", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Register a feed for a user
    AddFeed {
        #[arg(long)]
        user: i64,

        /// Display title of the feed
        title: String,
    },

    /// Register a category for a user
    AddCategory {
        #[arg(long)]
        user: i64,

        name: String,

        /// Enable title and similarity matching for this category
        #[arg(long)]
        cluster_on_title: bool,
    },

    /// Ingest and cluster a JSON array of articles
    Ingest {
        /// Path to the JSON file
        file: String,

        /// Compute valuable tokens for records that don't carry any
        #[arg(long)]
        extract_tokens: bool,

        /// Number of articles to process in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// List clusters, newest story first
    Clusters {
        #[arg(long)]
        user: i64,

        /// Only clusters with a member from this feed
        #[arg(long)]
        feed: Option<i64>,

        /// Only clusters with a member in this category (0 for uncategorized)
        #[arg(long)]
        category: Option<i64>,

        /// Only unread clusters
        #[arg(long, conflicts_with = "read")]
        unread: bool,

        /// Only read clusters
        #[arg(long)]
        read: bool,

        /// Only liked clusters
        #[arg(long)]
        liked: bool,

        /// Text that one member's title or content must contain
        #[arg(long)]
        search: Option<String>,

        /// Text that a member's title must contain
        #[arg(long)]
        title: Option<String>,

        /// Text that a member's content must contain
        #[arg(long)]
        content: Option<String>,

        /// Maximum clusters to show (capped at 1000)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a cluster and its member articles
    Show {
        cluster: i64,

        #[arg(long)]
        user: i64,
    },

    /// Delete a cluster and all of its articles
    Delete {
        cluster: i64,

        #[arg(long)]
        user: i64,
    },

    /// Count clustered articles per feed or per category
    Counts {
        #[arg(long)]
        user: i64,

        #[arg(long, value_enum, default_value = "feed")]
        by: CountBy,

        /// Only count articles in unread clusters
        #[arg(long)]
        unread: bool,
    },

    /// Show system status (DB size, row counts, settings)
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum CountBy {
    Feed,
    Category,
}

/// One element of an ingest file: the article plus the member's read/liked state.
#[derive(Deserialize)]
struct IngestRecord {
    #[serde(flatten)]
    article: IncomingArticle,
    #[serde(flatten)]
    flags: MemberFlags,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("newsfold=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Newsfold database...");
            let conn = newsfold::db::initialize(&config.db_path)?;
            let db = SqliteDatabase::new(conn);
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: register feeds with `newsfold add-feed --user <id> <title>`");
        }

        Commands::AddFeed { user, title } => {
            let db = open_database(&config)?;
            let id = db.insert_feed(user, &title).await?;
            println!("Feed {} created for user {}: {}", id, user, title.bold());
        }

        Commands::AddCategory {
            user,
            name,
            cluster_on_title,
        } => {
            let db = open_database(&config)?;
            let id = db.insert_category(user, &name, cluster_on_title).await?;
            let mode = if cluster_on_title {
                "link, title and similarity matching".green()
            } else {
                "link matching only".dimmed()
            };
            println!("Category {} created for user {}: {} ({})", id, user, name.bold(), mode);
        }

        Commands::Ingest {
            file,
            extract_tokens,
            concurrency,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {file}"))?;
            let mut records: Vec<IngestRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("{file} is not a JSON array of articles"))?;

            if extract_tokens {
                for record in records.iter_mut().filter(|r| r.article.valuable_tokens.is_empty()) {
                    let article = &mut record.article;
                    article.valuable_tokens =
                        extract_valuable_tokens(&article.title, &article.content, &article.lang);
                }
            }

            let sqlite = open_database(&config)?;
            let service = build_service(sqlite, &config);

            println!("Clustering {} articles...", records.len());
            let pb = ProgressBar::new(records.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar().template("  Clustering [{bar:30}] {pos}/{len} ({eta})")?,
            );

            // Articles of one user serialize on the service's per-user lock,
            // so the concurrency only pays off across users
            let service = &service;
            let mut summary = terminal::IngestSummary::default();
            stream::iter(
                records
                    .into_iter()
                    .map(|record| async move { service.ingest(record.article, record.flags).await }),
            )
            .buffer_unordered(concurrency.max(1))
            .for_each(|result| {
                summary.record(result);
                pb.inc(1);
                futures::future::ready(())
            })
            .await;
            pb.finish_and_clear();

            terminal::display_ingest_summary(&summary);
        }

        Commands::Clusters {
            user,
            feed,
            category,
            unread,
            read,
            liked,
            search,
            title,
            content,
            limit,
        } => {
            let sqlite = open_database(&config)?;
            let service = build_service(sqlite, &config);

            let mut filter = ClusterFilter::for_user(user);
            if let Some(feed_id) = feed {
                filter = filter.feed(feed_id);
            }
            if let Some(category_id) = category {
                filter = filter.category(category_id);
            }
            if unread {
                filter = filter.read(false);
            } else if read {
                filter = filter.read(true);
            }
            if liked {
                filter = filter.liked(true);
            }
            if let Some(text) = search {
                filter = filter.text_contains(text);
            }
            if let Some(text) = title {
                filter = filter.title_contains(text);
            }
            if let Some(text) = content {
                filter = filter.content_contains(text);
            }
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }

            let clusters = service.list_clusters(&filter).await?;
            terminal::display_cluster_list(&clusters);
        }

        Commands::Show { cluster, user } => {
            let sqlite = open_database(&config)?;
            let Some(found) = sqlite.get_cluster(user, cluster).await? else {
                anyhow::bail!("Cluster {cluster} not found for user {user}");
            };
            let service = build_service(sqlite, &config);
            let members = service.cluster_members(user, cluster).await?;
            terminal::display_cluster_detail(&found, &members);
        }

        Commands::Delete { cluster, user } => {
            let sqlite = open_database(&config)?;
            let service = build_service(sqlite, &config);
            service.delete_cluster(user, cluster).await?;
            println!("Cluster {cluster} and its articles deleted.");
        }

        Commands::Counts { user, by, unread } => {
            let db = open_database(&config)?;
            let read = if unread { Some(false) } else { None };
            let (label, counts) = match by {
                CountBy::Feed => ("feed", db.count_by_feed(user, read).await?),
                CountBy::Category => ("category", db.count_by_category(user, read).await?),
            };
            terminal::display_counts(label, &counts);
        }

        Commands::Status => {
            if !newsfold::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `newsfold init` to set up the database.");
                return Ok(());
            }
            let db: Arc<dyn Database> = open_database(&config)?;
            newsfold::status::show(&db, &config.db_path, &config.clustering).await?;
        }
    }

    Ok(())
}

/// Open the existing SQLite store, or bail with a hint to run `init`.
fn open_database(config: &Config) -> Result<Arc<SqliteDatabase>> {
    let conn = newsfold::db::open(&config.db_path)?;
    Ok(Arc::new(SqliteDatabase::new(conn)))
}

/// Wire the clustering service. The SQLite store doubles as the category
/// settings source.
fn build_service(sqlite: Arc<SqliteDatabase>, config: &Config) -> ClusterService {
    let db: Arc<dyn Database> = sqlite.clone();
    let categories: Arc<dyn CategoryLookup> = sqlite;
    ClusterService::new(db, categories, Arc::new(TfIdfEngine), config.clustering.clone())
}
