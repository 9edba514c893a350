use std::env;

use anyhow::{Context, Result};
use chrono::Duration;

use crate::clustering::ClusteringSettings;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// value has a default, so a bare environment runs with the standard
/// clustering thresholds against ./newsfold.db.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub clustering: ClusteringSettings,
}

/// Read an optional variable and parse it, naming the variable on failure.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} has an invalid value: {raw:?}"))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

/// Turn a configured day count into a window half-width.
fn window_from_days(days: i64) -> Result<Duration> {
    if days <= 0 {
        anyhow::bail!("NEWSFOLD_WINDOW_DAYS must be positive, got {days}");
    }
    Duration::try_days(days)
        .with_context(|| format!("NEWSFOLD_WINDOW_DAYS is out of range: {days}"))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let defaults = ClusteringSettings::default();

        let window_days: Option<i64> = parse_var("NEWSFOLD_WINDOW_DAYS")?;
        let min_sample_size: Option<usize> = parse_var("NEWSFOLD_MIN_SAMPLE")?;
        let min_score: Option<f64> = parse_var("NEWSFOLD_MIN_SCORE")?;

        let clustering = ClusteringSettings {
            time_window: match window_days {
                Some(days) => window_from_days(days)?,
                None => defaults.time_window,
            },
            min_sample_size: min_sample_size.unwrap_or(defaults.min_sample_size),
            min_score: match min_score {
                Some(score) if (0.0..=1.0).contains(&score) => score,
                Some(score) => anyhow::bail!("NEWSFOLD_MIN_SCORE must be within 0..=1, got {score}"),
                None => defaults.min_score,
            },
        };

        Ok(Self {
            db_path: env::var("NEWSFOLD_DB_PATH").unwrap_or_else(|_| "./newsfold.db".to_string()),
            clustering,
        })
    }
}
