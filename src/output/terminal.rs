// Colored terminal output for cluster listings, cluster details, and counts.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here.

use std::collections::BTreeMap;

use colored::Colorize;

use crate::clustering::{ClusterError, ClusterOutcome, MatchStrategy};
use crate::db::models::{Article, Cluster, ClusterSummary};

/// Display a cluster listing, newest story first.
pub fn display_cluster_list(clusters: &[ClusterSummary]) {
    if clusters.is_empty() {
        println!("No clusters match. Run `newsfold ingest` to load articles.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Clusters ({}) ===", clusters.len()).bold()
    );
    println!();

    println!(
        "  {:>6}  {:<16}  {:<5}  {:>5}  {:<60}",
        "ID".dimmed(),
        "Date".dimmed(),
        "Flags".dimmed(),
        "Feeds".dimmed(),
        "Title".dimmed(),
    );
    println!("  {}", "-".repeat(100).dimmed());

    for cluster in clusters {
        println!(
            "  {:>6}  {:<16}  {:<5}  {:>5}  {}",
            cluster.id,
            cluster.main_date.format("%Y-%m-%d %H:%M"),
            flags(cluster.read, cluster.liked),
            cluster.feed_ids.len(),
            title_style(&super::truncate_chars(&cluster.main_title, 60), cluster.read),
        );
        if let Some(categories) = &cluster.category_ids {
            let ids: Vec<String> = categories.iter().map(|id| id.to_string()).collect();
            println!("  {:>6}  categories: {}", "", ids.join(", ").dimmed());
        }
    }
    println!();
}

/// Display one cluster and its members.
pub fn display_cluster_detail(cluster: &Cluster, members: &[Article]) {
    println!(
        "\n{}",
        format!("=== Cluster {} ===", cluster.id).bold()
    );
    println!("  Title: {}", title_style(&cluster.main_title, cluster.read));
    println!("  Link: {}", cluster.main_link);
    println!(
        "  Date: {}  |  Feed: {}  |  {}",
        cluster.main_date.format("%Y-%m-%d %H:%M"),
        cluster.main_feed_title,
        flags(cluster.read, cluster.liked),
    );

    println!("\n  {} members:", members.len());
    for article in members {
        let marker = if cluster.main_article_id == Some(article.id) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "  {} {:>6}  {}  {:<24}  {}",
            marker,
            article.id,
            article.date.format("%Y-%m-%d %H:%M"),
            super::truncate_chars(&article.feed_title, 24),
            super::truncate_chars(&article.title, 70).dimmed(),
        );
    }
    println!();
}

/// Display clustered article counts per feed or per category.
pub fn display_counts(label: &str, counts: &BTreeMap<i64, i64>) {
    if counts.is_empty() {
        println!("No clustered articles to count.");
        return;
    }

    println!("\n{}", format!("=== Clustered articles by {label} ===").bold());
    for (id, count) in counts {
        let shown = if *id == 0 {
            "(none)".dimmed().to_string()
        } else {
            id.to_string()
        };
        println!("  {:>8}  {:>6}", shown, count);
    }
    println!();
}

/// Running tally of an ingest run, printed once at the end.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub created: usize,
    pub by_link: usize,
    pub by_title: usize,
    pub by_similarity: usize,
    pub degraded: usize,
    pub rejected: Vec<String>,
    pub failed: Vec<String>,
}

impl IngestSummary {
    pub fn record(&mut self, result: Result<ClusterOutcome, ClusterError>) {
        match result {
            Ok(outcome) => {
                if outcome.degraded.is_some() {
                    self.degraded += 1;
                }
                match outcome.matched_by {
                    None => self.created += 1,
                    Some(MatchStrategy::Link) => self.by_link += 1,
                    Some(MatchStrategy::Title) => self.by_title += 1,
                    Some(MatchStrategy::Similarity { .. }) => self.by_similarity += 1,
                }
            }
            Err(e) if e.is_retryable() => self.failed.push(e.to_string()),
            Err(e) => self.rejected.push(e.to_string()),
        }
    }

    pub fn clustered(&self) -> usize {
        self.created + self.by_link + self.by_title + self.by_similarity
    }
}

/// Display the outcome of an ingest run.
pub fn display_ingest_summary(summary: &IngestSummary) {
    println!(
        "\n{}",
        format!("=== Ingested {} articles ===", summary.clustered()).bold()
    );
    println!("  New clusters: {}", summary.created);
    println!(
        "  Joined: {} by link, {} by title, {} by similarity",
        summary.by_link, summary.by_title, summary.by_similarity
    );
    if summary.degraded > 0 {
        println!(
            "  {} {} articles skipped similarity matching",
            "~".yellow(),
            summary.degraded
        );
    }
    if !summary.rejected.is_empty() {
        println!("  {} {} rejected:", "!".bright_red(), summary.rejected.len());
        for reason in &summary.rejected {
            println!("    {}", reason.dimmed());
        }
    }
    if !summary.failed.is_empty() {
        println!(
            "  {} {} failed (safe to retry):",
            "!!".red().bold(),
            summary.failed.len()
        );
        for reason in &summary.failed {
            println!("    {}", reason.dimmed());
        }
    }
}

fn flags(read: bool, liked: bool) -> String {
    let read_flag = if read { "R".dimmed() } else { "N".green().bold() };
    let liked_flag = if liked { "♥".red() } else { " ".normal() };
    format!("{read_flag}{liked_flag}")
}

fn title_style(title: &str, read: bool) -> colored::ColoredString {
    if read {
        title.dimmed()
    } else {
        title.bold()
    }
}
