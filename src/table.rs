//! Client-side table engine for the leaderboard view: filtering, sorting,
//! display formatting, CSV export and the social search query.
//!
//! Everything here is a pure function of the entry list and the current
//! [`ViewParameters`]; the view layer recomputes on every change.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::models::LeaderboardEntry;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const CSV_HEADERS: [&str; 11] = [
    "Rank",
    "Name",
    "Username",
    "Community Score",
    "Mindshare",
    "Mention Count",
    "Follower Count",
    "Smart Follower Count",
    "Insightfulness Score (7d)",
    "Originality Score (7d)",
    "Created At",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Rank,
    Name,
    Username,
    Bio,
    CommunityScore,
    Mindshare,
    MentionCount,
    FollowerCount,
    SmartFollowerCount,
    InsightfulnessScore7d,
    OriginalityScore7d,
    CreatedAt,
    AvatarUrl,
    TwitterUrl,
}

enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl SortKey {
    /// Sortable columns shown in the leaderboard table, in display order.
    pub const COLUMNS: [SortKey; 11] = [
        SortKey::Rank,
        SortKey::Name,
        SortKey::Username,
        SortKey::CommunityScore,
        SortKey::Mindshare,
        SortKey::MentionCount,
        SortKey::FollowerCount,
        SortKey::SmartFollowerCount,
        SortKey::InsightfulnessScore7d,
        SortKey::OriginalityScore7d,
        SortKey::CreatedAt,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            SortKey::Rank => "rank",
            SortKey::Name => "name",
            SortKey::Username => "username",
            SortKey::Bio => "bio",
            SortKey::CommunityScore => "community_score",
            SortKey::Mindshare => "mindshare",
            SortKey::MentionCount => "mention_count",
            SortKey::FollowerCount => "follower_count",
            SortKey::SmartFollowerCount => "smart_follower_count",
            SortKey::InsightfulnessScore7d => "insightfulness_score_7d",
            SortKey::OriginalityScore7d => "originality_score_7d",
            SortKey::CreatedAt => "created_at",
            SortKey::AvatarUrl => "avatar_url",
            SortKey::TwitterUrl => "twitter_url",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Rank => "Rank",
            SortKey::Name => "Name",
            SortKey::Username => "Username",
            SortKey::Bio => "Bio",
            SortKey::CommunityScore => "Community Score",
            SortKey::Mindshare => "Mindshare",
            SortKey::MentionCount => "Mentions",
            SortKey::FollowerCount => "Followers",
            SortKey::SmartFollowerCount => "Smart Followers",
            SortKey::InsightfulnessScore7d => "Insightfulness (7d)",
            SortKey::OriginalityScore7d => "Originality (7d)",
            SortKey::CreatedAt => "Created At",
            SortKey::AvatarUrl => "Avatar",
            SortKey::TwitterUrl => "Twitter",
        }
    }

    fn value<'a>(&self, e: &'a LeaderboardEntry) -> SortValue<'a> {
        match self {
            SortKey::Rank => SortValue::Number(e.rank as f64),
            SortKey::Name => SortValue::Text(&e.name),
            SortKey::Username => SortValue::Text(&e.username),
            SortKey::Bio => SortValue::Text(&e.bio),
            SortKey::CommunityScore => SortValue::Number(e.community_score),
            SortKey::Mindshare => SortValue::Number(e.mindshare),
            SortKey::MentionCount => SortValue::Number(e.mention_count as f64),
            SortKey::FollowerCount => SortValue::Number(e.follower_count as f64),
            SortKey::SmartFollowerCount => SortValue::Number(e.smart_follower_count as f64),
            SortKey::InsightfulnessScore7d => SortValue::Number(e.insightfulness_score_7d),
            SortKey::OriginalityScore7d => SortValue::Number(e.originality_score_7d),
            SortKey::CreatedAt => SortValue::Text(&e.created_at),
            SortKey::AvatarUrl => SortValue::Text(e.avatar_url.as_deref().unwrap_or("")),
            SortKey::TwitterUrl => SortValue::Text(e.twitter_url.as_deref().unwrap_or("")),
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let all = SortKey::COLUMNS
            .iter()
            .chain(&[SortKey::Bio, SortKey::AvatarUrl, SortKey::TwitterUrl]);
        for key in all {
            if key.field_name().eq_ignore_ascii_case(s) {
                return Ok(*key);
            }
        }
        Err(anyhow!(
            "Unknown sort key '{}'. Use a field name such as rank, mindshare, follower_count",
            s
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewParameters {
    pub search_term: String,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            sort_key: SortKey::Rank,
            sort_direction: SortDirection::Asc,
        }
    }
}

impl ViewParameters {
    /// Same key flips direction, a new key starts ascending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.sort_direction = self.sort_direction.flipped();
        } else {
            self.sort_key = key;
            self.sort_direction = SortDirection::Asc;
        }
    }
}

pub fn matches(entry: &LeaderboardEntry, term: &str) -> bool {
    let term = term.to_lowercase();
    entry.name.to_lowercase().contains(&term)
        || entry.username.to_lowercase().contains(&term)
        || entry.bio.to_lowercase().contains(&term)
}

pub fn filter<'a>(entries: &'a [LeaderboardEntry], term: &str) -> Vec<&'a LeaderboardEntry> {
    entries.iter().filter(|e| matches(e, term)).collect()
}

pub fn compare(
    a: &LeaderboardEntry,
    b: &LeaderboardEntry,
    key: SortKey,
    direction: SortDirection,
) -> Ordering {
    let ord = match (key.value(a), key.value(b)) {
        (SortValue::Number(x), SortValue::Number(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (x, y) => {
            let x = text_of(&x).to_lowercase();
            let y = text_of(&y).to_lowercase();
            x.encode_utf16().cmp(y.encode_utf16())
        }
    };
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

fn text_of(v: &SortValue<'_>) -> String {
    match v {
        SortValue::Number(n) => n.to_string(),
        SortValue::Text(s) => s.to_string(),
    }
}

/// Stable: entries comparing equal keep their input order.
pub fn sort(entries: &mut [&LeaderboardEntry], key: SortKey, direction: SortDirection) {
    entries.sort_by(|a, b| compare(a, b, key, direction));
}

/// Filtered and sorted view of `entries` for the given parameters.
pub fn view<'a>(entries: &'a [LeaderboardEntry], params: &ViewParameters) -> Vec<&'a LeaderboardEntry> {
    let mut rows = filter(entries, &params.search_term);
    sort(&mut rows, params.sort_key, params.sort_direction);
    rows
}

pub fn format_compact(n: u64) -> String {
    if n >= 1_000_000 {
        let tenths = (n + 50_000) / 100_000;
        format!("{}.{}M", tenths / 10, tenths % 10)
    } else if n >= 1_000 {
        let tenths = (n + 50) / 100;
        format!("{}.{}K", tenths / 10, tenths % 10)
    } else {
        n.to_string()
    }
}

pub fn format_score(score: f64) -> String {
    format!("{:.2}", score)
}

/// `MMM dd, yyyy` in local time; unparseable timestamps are shown as-is.
pub fn format_date(created_at: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(created_at) {
        return dt.with_timezone(&Local).format("%b %d, %Y").to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(created_at, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format("%b %d, %Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(created_at, "%Y-%m-%d") {
        return date.format("%b %d, %Y").to_string();
    }
    created_at.to_string()
}

pub fn to_csv<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a LeaderboardEntry>,
{
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(UTF8_BOM.to_vec());

    wtr.write_record(CSV_HEADERS)?;
    for e in entries {
        wtr.write_record([
            e.rank.to_string(),
            e.name.clone(),
            e.username.clone(),
            e.community_score.to_string(),
            e.mindshare.to_string(),
            e.mention_count.to_string(),
            e.follower_count.to_string(),
            e.smart_follower_count.to_string(),
            e.insightfulness_score_7d.to_string(),
            e.originality_score_7d.to_string(),
            e.created_at.clone(),
        ])?;
    }

    let mut bytes = wtr
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV buffer: {}", e.error()))?;
    // no terminator after the last record
    if bytes.ends_with(b"\r\n") {
        bytes.truncate(bytes.len() - 2);
    }
    Ok(bytes)
}

pub fn csv_filename(project: &str, date: NaiveDate) -> String {
    format!("{}_leaderboard_{}.csv", project, date.format("%Y-%m-%d"))
}

pub fn to_search_query<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a LeaderboardEntry>,
{
    let clauses: Vec<String> = entries
        .into_iter()
        .map(|e| format!("from:{}", e.handle()))
        .collect();
    format!("({}) within_time:60min", clauses.join(", OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: u32, name: &str, username: &str, bio: &str) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            name: name.to_string(),
            username: username.to_string(),
            bio: bio.to_string(),
            community_score: 10.0 * rank as f64,
            mindshare: 1.5,
            mention_count: 100,
            follower_count: 2500,
            smart_follower_count: 40,
            insightfulness_score_7d: 7.25,
            originality_score_7d: 6.0,
            created_at: "2024-03-05T12:00:00Z".to_string(),
            avatar_url: None,
            twitter_url: None,
        }
    }

    fn sample() -> Vec<LeaderboardEntry> {
        vec![
            entry(1, "Alex Chen", "@alexc", "DeFi researcher"),
            entry(2, "sarah Johnson", "@sjohnson", "NFT collector"),
            entry(3, "Mike Rodriguez", "@mike_r", ""),
            entry(4, "Émile", "@emile", "Builds on DeFi rails"),
        ]
    }

    fn ranks(rows: &[&LeaderboardEntry]) -> Vec<u32> {
        rows.iter().map(|e| e.rank).collect()
    }

    #[test]
    fn test_filter_matches_any_of_three_fields() {
        let data = sample();
        assert_eq!(ranks(&filter(&data, "defi")), vec![1, 4]);
        assert_eq!(ranks(&filter(&data, "SJOHN")), vec![2]);
        assert_eq!(ranks(&filter(&data, "rodriguez")), vec![3]);
        assert!(filter(&data, "nobody").is_empty());
    }

    #[test]
    fn test_filter_empty_term_returns_everything() {
        let data = sample();
        assert_eq!(filter(&data, "").len(), data.len());
        assert!(filter(&[], "x").is_empty());
    }

    #[test]
    fn test_numeric_sort_both_directions() {
        let data = sample();
        let mut rows = filter(&data, "");
        sort(&mut rows, SortKey::CommunityScore, SortDirection::Desc);
        assert_eq!(ranks(&rows), vec![4, 3, 2, 1]);
        sort(&mut rows, SortKey::CommunityScore, SortDirection::Asc);
        assert_eq!(ranks(&rows), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_text_sort_is_case_folded() {
        let data = sample();
        let mut rows = filter(&data, "");
        sort(&mut rows, SortKey::Name, SortDirection::Asc);
        // "sarah" sorts among the capitalised names; É is above ASCII
        assert_eq!(ranks(&rows), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let data = sample();
        let mut rows = filter(&data, "");
        // every entry has the same mindshare, so input order is kept
        sort(&mut rows, SortKey::Mindshare, SortDirection::Desc);
        assert_eq!(ranks(&rows), vec![1, 2, 3, 4]);

        sort(&mut rows, SortKey::Username, SortDirection::Desc);
        let once = ranks(&rows);
        sort(&mut rows, SortKey::Username, SortDirection::Desc);
        assert_eq!(ranks(&rows), once);
    }

    #[test]
    fn test_reversing_direction_reverses_distinct_values() {
        let data = sample();
        let mut asc = filter(&data, "");
        let mut desc = asc.clone();
        sort(&mut asc, SortKey::Username, SortDirection::Asc);
        sort(&mut desc, SortKey::Username, SortDirection::Desc);
        let mut reversed = ranks(&desc);
        reversed.reverse();
        assert_eq!(ranks(&asc), reversed);
    }

    #[test]
    fn test_toggle_sort_rules() {
        let mut params = ViewParameters::default();
        assert_eq!(params.sort_key, SortKey::Rank);
        params.toggle_sort(SortKey::Rank);
        assert_eq!(params.sort_direction, SortDirection::Desc);
        params.toggle_sort(SortKey::Mindshare);
        assert_eq!(params.sort_key, SortKey::Mindshare);
        assert_eq!(params.sort_direction, SortDirection::Asc);
    }

    #[test]
    fn test_view_filters_then_sorts() {
        let data = sample();
        let params = ViewParameters {
            search_term: "defi".to_string(),
            sort_key: SortKey::Rank,
            sort_direction: SortDirection::Desc,
        };
        assert_eq!(ranks(&view(&data, &params)), vec![4, 1]);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("follower_count".parse::<SortKey>().unwrap(), SortKey::FollowerCount);
        assert_eq!("Bio".parse::<SortKey>().unwrap(), SortKey::Bio);
        assert!("followers".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(0), "0");
        assert_eq!(format_compact(999), "999");
        assert_eq!(format_compact(1000), "1.0K");
        assert_eq!(format_compact(1500), "1.5K");
        assert_eq!(format_compact(1250), "1.3K");
        assert_eq!(format_compact(2_500_000), "2.5M");
        assert_eq!(format_compact(12_340_000), "12.3M");
    }

    #[test]
    fn test_format_score_and_date() {
        assert_eq!(format_score(7.0), "7.00");
        assert_eq!(format_score(3.14159), "3.14");
        assert_eq!(format_date("2024-03-05T12:00:00"), "Mar 05, 2024");
        assert_eq!(format_date("2024-03-05"), "Mar 05, 2024");
        assert_eq!(format_date("not a date"), "not a date");
    }

    #[test]
    fn test_csv_empty_is_bom_plus_header() {
        let bytes = to_csv(&Vec::<LeaderboardEntry>::new()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(
            text,
            "\"Rank\",\"Name\",\"Username\",\"Community Score\",\"Mindshare\",\
             \"Mention Count\",\"Follower Count\",\"Smart Follower Count\",\
             \"Insightfulness Score (7d)\",\"Originality Score (7d)\",\"Created At\""
        );
    }

    #[test]
    fn test_csv_rows_are_raw_values() {
        let data = sample();
        let bytes = to_csv(&data).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), data.len() + 1);
        assert_eq!(
            lines[1],
            "\"1\",\"Alex Chen\",\"@alexc\",\"10\",\"1.5\",\"100\",\"2500\",\"40\",\"7.25\",\"6\",\"2024-03-05T12:00:00Z\""
        );
    }

    #[test]
    fn test_csv_escapes_embedded_quotes() {
        let data = vec![entry(1, "The \"Oracle\"", "@oracle", "")];
        let text = String::from_utf8(to_csv(&data).unwrap()[3..].to_vec()).unwrap();
        assert!(text.contains("\"The \"\"Oracle\"\"\""));
    }

    #[test]
    fn test_csv_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(csv_filename("Monad", date), "Monad_leaderboard_2025-01-09.csv");
    }

    #[test]
    fn test_search_query() {
        let data = vec![entry(1, "A", "@a", ""), entry(2, "B", "@b", "")];
        assert_eq!(to_search_query(&data), "(from:a, OR from:b) within_time:60min");
        assert_eq!(to_search_query(std::iter::empty()), "() within_time:60min");

        let bare = vec![entry(1, "C", "c", "")];
        assert_eq!(to_search_query(&bare), "(from:c) within_time:60min");
    }
}
