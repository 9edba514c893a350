// System status display: store location, size, and row counts.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::clustering::ClusteringSettings;
use crate::db::Database;

/// Display system status to the terminal.
pub async fn show(
    db: &Arc<dyn Database>,
    db_display_path: &str,
    settings: &ClusteringSettings,
) -> Result<()> {
    // Database file size
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let stats = db.stats().await?;
    println!("Feeds: {}  |  Categories: {}", stats.feeds, stats.categories);
    println!(
        "Articles: {} ({} waiting for a cluster)",
        stats.articles, stats.unclustered_articles
    );
    if stats.clusters > 0 {
        println!(
            "Clusters: {} ({:.2} articles per cluster)",
            stats.clusters,
            (stats.articles - stats.unclustered_articles) as f64 / stats.clusters as f64
        );
    } else {
        println!("Clusters: none yet");
        println!("  Run `newsfold ingest <file>` to load articles");
    }

    println!(
        "Settings: window ±{} days, min sample {}, min score {:.2}",
        settings.time_window.num_days(),
        settings.min_sample_size,
        settings.min_score
    );

    Ok(())
}

/// True when a database file exists at `path`.
pub fn is_initialized(path: &str) -> bool {
    Path::new(path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
