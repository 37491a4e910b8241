use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const AVATAR_PLACEHOLDER_URL: &str = "https://ui-avatars.com/api/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub username: String, // always "@handle"
    pub bio: String,
    pub community_score: f64,
    pub mindshare: f64,
    pub mention_count: u64,
    pub follower_count: u64,
    pub smart_follower_count: u64,
    pub insightfulness_score_7d: f64,
    pub originality_score_7d: f64,
    pub created_at: String, // RFC 3339 as reported upstream
    pub avatar_url: Option<String>,
    pub twitter_url: Option<String>,
}

impl LeaderboardEntry {
    /// Username without the leading `@`.
    pub fn handle(&self) -> &str {
        self.username.strip_prefix('@').unwrap_or(&self.username)
    }

    /// `avatar_url`, or a generated initials placeholder when absent.
    pub fn avatar(&self) -> String {
        match &self.avatar_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => placeholder_avatar(&self.name, 32),
        }
    }

    pub fn profile_url(&self) -> String {
        match &self.twitter_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!("https://twitter.com/{}", self.handle()),
        }
    }
}

pub fn placeholder_avatar(name: &str, size: u32) -> String {
    format!(
        "{}?name={}&background=3B82F6&color=fff&size={}",
        AVATAR_PLACEHOLDER_URL,
        urlencoding::encode(name),
        size
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Synthetic, // upstream unavailable, placeholder rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard {
    pub project_id: String,
    pub entries: Vec<LeaderboardEntry>,
    pub source: DataSource,
}

impl Leaderboard {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Additions {
    #[serde(default)]
    pub en: Vec<String>,
    #[serde(default)]
    pub id: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostAnalysis {
    #[serde(default, deserialize_with = "lenient_score")]
    pub mention_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    pub insightfulness_score: f64,
    #[serde(default, deserialize_with = "lenient_score")]
    pub originality_score: f64,
    #[serde(default)]
    pub suggestions_en: Vec<String>,
    #[serde(default)]
    pub suggestions_id: Vec<String>,
    #[serde(default)]
    pub additions: Additions,
    #[serde(default)]
    pub after_tweet: String,
}

/// Scores as the model reports them: a number, a numeric string, or null (0).
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if score.is_finite() { score } else { 0.0 })
}
