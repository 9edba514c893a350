// Database schema: table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent and safe to call on every startup. Foreign keys are
/// switched on here because SQLite leaves them off per connection, and the
/// cluster deletion order depends on them being enforced.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS feeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            cluster_on_title INTEGER NOT NULL DEFAULT 0
        );

        -- Clusters and articles reference each other: every article points at
        -- its cluster, and the cluster points back at its representative.
        CREATE TABLE IF NOT EXISTS clusters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            main_article_id INTEGER REFERENCES articles(id),
            main_link TEXT NOT NULL,
            main_title TEXT NOT NULL,
            main_date_ms INTEGER NOT NULL,     -- UTC epoch milliseconds
            main_feed_title TEXT NOT NULL DEFAULT '',
            read INTEGER NOT NULL DEFAULT 0,
            liked INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            feed_id INTEGER NOT NULL REFERENCES feeds(id),
            category_id INTEGER REFERENCES categories(id),
            link TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            title_key TEXT NOT NULL DEFAULT '',  -- lowercased title for matching
            content TEXT NOT NULL DEFAULT '',
            date_ms INTEGER NOT NULL,          -- UTC epoch milliseconds
            lang TEXT NOT NULL DEFAULT '',
            valuable_tokens TEXT NOT NULL DEFAULT '[]',  -- JSON array
            cluster_id INTEGER REFERENCES clusters(id),
            read INTEGER NOT NULL DEFAULT 0,
            liked INTEGER NOT NULL DEFAULT 0
        );

        -- Link matching: same user, same main link, bounded by date
        CREATE INDEX IF NOT EXISTS idx_clusters_user_link
            ON clusters(user_id, main_link, main_date_ms);

        -- Listings are ordered by main date
        CREATE INDEX IF NOT EXISTS idx_clusters_user_date
            ON clusters(user_id, main_date_ms);

        -- Title and similarity matching scan a user's category by date
        CREATE INDEX IF NOT EXISTS idx_articles_user_category_date
            ON articles(user_id, category_id, date_ms);

        CREATE INDEX IF NOT EXISTS idx_articles_cluster
            ON articles(cluster_id);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: index clusters by (user, representative)
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_clusters_user_main_article
                ON clusters(user_id, main_article_id);",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
