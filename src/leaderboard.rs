use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::models::{placeholder_avatar, DataSource, Leaderboard, LeaderboardEntry};

const SYNTHETIC_NAMES: [&str; 15] = [
    "Alex Chen",
    "Sarah Johnson",
    "Mike Rodriguez",
    "Emily Zhang",
    "David Kim",
    "Lisa Wang",
    "James Wilson",
    "Maria Garcia",
    "John Smith",
    "Anna Liu",
    "Robert Brown",
    "Jessica Lee",
    "Michael Chang",
    "Amanda Davis",
    "Chris Taylor",
];

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct LeaderboardClient {
    base_url: String,
    client: reqwest::Client,
}

impl LeaderboardClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.leaderboard_url, config.timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.to_string(),
            client,
        })
    }

    #[cfg(test)]
    fn for_tests(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap();
        Self {
            base_url: base_url.to_string(),
            client,
        }
    }

    /// Fetch the 7-day leaderboard for `project_id`.
    ///
    /// Never fails: transport errors, non-2xx statuses and unexpected bodies
    /// all yield a synthetic board, marked with [`DataSource::Synthetic`].
    pub async fn fetch(&self, project_id: &str) -> Leaderboard {
        log::info!("[leaderboard] Fetching leaderboard for {}", project_id);
        match self.try_fetch(project_id).await {
            Ok(entries) => {
                log::info!("[leaderboard] Got {} entries for {}", entries.len(), project_id);
                Leaderboard {
                    project_id: project_id.to_string(),
                    entries,
                    source: DataSource::Live,
                }
            }
            Err(e) => {
                log::warn!(
                    "[leaderboard] Falling back to synthetic data for {}: {:#}",
                    project_id,
                    e
                );
                let entries = synthetic_entries(project_id, &mut rand::thread_rng(), Utc::now());
                Leaderboard {
                    project_id: project_id.to_string(),
                    entries,
                    source: DataSource::Synthetic,
                }
            }
        }
    }

    async fn try_fetch(&self, project_id: &str) -> Result<Vec<LeaderboardEntry>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("duration", "7d"),
                ("topic_id", project_id),
                ("top_n", "100"),
                ("customized_community", "customized"),
                ("community_yaps", "true"),
            ])
            .send()
            .await
            .context("Failed to send request to leaderboard API")?;

        if !response.status().is_success() {
            return Err(anyhow!("Leaderboard API returned status {}", response.status()));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse leaderboard API response")?;

        parse_entries(&body, Utc::now())
    }
}

/// Map the upstream JSON array onto entries, defaulting anything missing.
pub fn parse_entries(body: &Value, now: DateTime<Utc>) -> Result<Vec<LeaderboardEntry>> {
    let items = body
        .as_array()
        .ok_or_else(|| anyhow!("Leaderboard response is not a JSON array"))?;

    let entries = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let raw_username = text(item, "username").map(|u| u.trim_start_matches('@'));
            let rank = number(item, "rank") as u32;
            LeaderboardEntry {
                rank: if rank == 0 { i as u32 + 1 } else { rank },
                name: text(item, "name").unwrap_or("Unknown").to_string(),
                username: format!("@{}", raw_username.unwrap_or("unknown")),
                bio: text(item, "bio").unwrap_or("No bio available").to_string(),
                community_score: number(item, "community_score"),
                mindshare: number(item, "mindshare"),
                mention_count: count(item, "mention_count"),
                follower_count: count(item, "follower_count"),
                smart_follower_count: count(item, "smart_follower_count"),
                insightfulness_score_7d: number(item, "last_7_day_avg_llm_insightfulness_score_scaled"),
                originality_score_7d: number(item, "last_7_day_avg_originality_score_scaled"),
                created_at: text(item, "created_at")
                    .map(str::to_string)
                    .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
                avatar_url: text(item, "icon").map(str::to_string),
                twitter_url: Some(
                    text(item, "twitter_user_url")
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            format!("https://twitter.com/{}", raw_username.unwrap_or("unknown"))
                        }),
                ),
            }
        })
        .collect();

    Ok(entries)
}

// Empty strings count as missing.
fn text<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn number(item: &Value, key: &str) -> f64 {
    let n = match item.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 { n } else { 0.0 }
}

fn count(item: &Value, key: &str) -> u64 {
    number(item, key).round() as u64
}

pub fn synthetic_entries<R: Rng>(
    project_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    const YEAR_MS: i64 = 365 * 24 * 60 * 60 * 1000;

    SYNTHETIC_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let slug: String = name.split_whitespace().collect::<String>().to_lowercase();
            let suffix: String = (0..3)
                .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
                .collect();
            let created = now - ChronoDuration::milliseconds(rng.gen_range(0..YEAR_MS));
            LeaderboardEntry {
                rank: i as u32 + 1,
                name: name.to_string(),
                username: format!("@{}{}", slug, suffix),
                bio: format!(
                    "Crypto enthusiast and {} community member. Building the future of DeFi.",
                    project_id
                ),
                community_score: rng.gen_range(0.0..100.0),
                mindshare: rng.gen_range(0.0..50.0),
                mention_count: rng.gen_range(0..1000),
                follower_count: rng.gen_range(1000..51_000),
                smart_follower_count: rng.gen_range(500..10_500),
                insightfulness_score_7d: rng.gen_range(0.0..10.0),
                originality_score_7d: rng.gen_range(0.0..10.0),
                created_at: created.to_rfc3339_opts(SecondsFormat::Millis, true),
                avatar_url: Some(placeholder_avatar(name, 64)),
                twitter_url: Some(format!("https://twitter.com/{}", slug)),
            }
        })
        .collect()
}
