mod ai;
mod app;
mod catalog;
mod clipboard;
mod config;
mod leaderboard;
mod models;
mod table;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

use ai::ChatCompletionProvider;
use catalog::Project;
use config::{Config, ConfigArgs};
use leaderboard::LeaderboardClient;
use models::PostAnalysis;
use table::{SortDirection, SortKey, ViewParameters};

#[derive(Parser)]
#[command(name = "yapboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Community leaderboards and post analysis for crypto projects")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard (default)
    Dashboard,

    /// List projects in the catalog
    Projects {
        /// Filter by topic id (case-insensitive substring)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the 7-day leaderboard for a project
    Leaderboard {
        /// Project topic id or display name
        project: String,

        /// Filter contributors by name, username or bio
        #[arg(short, long)]
        search: Option<String>,

        /// Sort by field (rank, name, username, community_score, mindshare, ...)
        #[arg(long, default_value = "rank", value_parser = clap::value_parser!(SortKey))]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Number of rows to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print profile and avatar links instead of the metrics table
        #[arg(long)]
        links: bool,

        /// Write the filtered view as CSV to this path
        #[arg(long, conflicts_with = "export")]
        csv: Option<PathBuf>,

        /// Write the filtered view as CSV to the export dir using the dated filename
        #[arg(long)]
        export: bool,
    },

    /// Print the Twitter search command for a project's contributors
    Query {
        /// Project topic id or display name
        project: String,

        /// Filter contributors by name, username or bio
        #[arg(short, long)]
        search: Option<String>,

        /// Also copy the command to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Score a post and suggest improvements
    Analyze {
        /// Post text (reads stdin when neither this nor --file is given)
        text: Option<String>,

        /// Read the post from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Print the raw analysis as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

// The dashboard owns the terminal, so logs go to a file instead.
fn init_file_logging() -> Result<PathBuf> {
    let path = config::default_log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(path)
}

fn resolve_project(key: &str) -> Project {
    catalog::find_project(key).unwrap_or_else(|| Project::adhoc(key))
}

fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => {
            let log_path = init_file_logging()?;
            log::info!("Starting dashboard, logging to {}", log_path.display());
            tui::run_dashboard(runtime.handle().clone(), &config)?;
        }

        Commands::Projects { search } => {
            init_logging();
            let all = catalog::projects();
            let projects = catalog::filter_projects(&all, search.as_deref().unwrap_or(""));
            if projects.is_empty() {
                println!("No projects found.");
            } else {
                println!("{:<14} {:<20} {:<10}", "TOPIC", "NAME", "TGE");
                println!("{}", "-".repeat(46));
                for p in projects {
                    println!("{:<14} {:<20} {:<10}", p.name, p.display_name, p.tge.label());
                }
            }
        }

        Commands::Leaderboard {
            project,
            search,
            sort,
            desc,
            limit,
            links,
            csv,
            export,
        } => {
            init_logging();
            let project = resolve_project(&project);
            let client = LeaderboardClient::new(&config)?;
            let board = runtime.block_on(client.fetch(&project.name));

            let params = ViewParameters {
                search_term: search.unwrap_or_default(),
                sort_key: sort,
                sort_direction: if desc { SortDirection::Desc } else { SortDirection::Asc },
            };
            let rows = table::view(&board.entries, &params);

            println!(
                "{} Leaderboard - {} contributors, 7-day analytics",
                project.display_name,
                board.entries.len()
            );
            if board.is_synthetic() {
                println!("Warning: leaderboard API unavailable, showing sample data.");
            }
            println!();
            if links {
                print_links(&rows, limit);
            } else {
                print_leaderboard(&rows, limit);
            }

            let csv_path = match (csv, export) {
                (Some(path), _) => Some(path),
                (None, true) => Some(config.export_dir.join(table::csv_filename(
                    &project.display_name,
                    chrono::Utc::now().date_naive(),
                ))),
                (None, false) => None,
            };
            if let Some(path) = csv_path {
                let bytes = table::to_csv(rows.iter().copied())?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write to {}", path.display()))?;
                println!("\nExported {} rows to {}", rows.len(), path.display());
            }
        }

        Commands::Query { project, search, copy } => {
            init_logging();
            let project = resolve_project(&project);
            let client = LeaderboardClient::new(&config)?;
            let board = runtime.block_on(client.fetch(&project.name));
            if board.is_synthetic() {
                eprintln!("Warning: leaderboard API unavailable, command uses sample data.");
            }

            let rows = table::filter(&board.entries, search.as_deref().unwrap_or(""));
            let query = table::to_search_query(rows.iter().copied());
            println!("{}", query);

            if copy {
                clipboard::copy_to_clipboard(&query)?;
                eprintln!("Copied command for {} contributors.", rows.len());
            }
        }

        Commands::Analyze { text, file, json } => {
            init_logging();
            let post = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read post file: {}", path.display()))?,
                (None, None) => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read post from stdin")?;
                    buf
                }
            };

            let provider = ChatCompletionProvider::new(&config)?;
            let analysis = runtime.block_on(ai::analyze_post(&provider, &post))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }
    }

    Ok(())
}

fn print_leaderboard(rows: &[&models::LeaderboardEntry], limit: Option<usize>) {
    if rows.is_empty() {
        println!("No contributors found.");
        return;
    }

    println!(
        "{:<5} {:<20} {:<18} {:>9} {:>9} {:>8} {:>9} {:>7} {:>7} {:>7} {:<12}",
        "RANK", "NAME", "USERNAME", "COMMUNITY", "MINDSHARE", "MENTIONS", "FOLLOWERS", "SMART", "INSIGHT", "ORIG", "CREATED"
    );
    println!("{}", "-".repeat(122));
    for e in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:<5} {:<20} {:<18} {:>9} {:>9} {:>8} {:>9} {:>7} {:>7} {:>7} {:<12}",
            e.rank,
            truncate(&e.name, 20),
            truncate(&e.username, 18),
            table::format_score(e.community_score),
            table::format_score(e.mindshare),
            table::format_compact(e.mention_count),
            table::format_compact(e.follower_count),
            table::format_compact(e.smart_follower_count),
            table::format_score(e.insightfulness_score_7d),
            table::format_score(e.originality_score_7d),
            table::format_date(&e.created_at),
        );
    }
}

fn print_links(rows: &[&models::LeaderboardEntry], limit: Option<usize>) {
    if rows.is_empty() {
        println!("No contributors found.");
        return;
    }

    println!("{:<5} {:<18} {:<40} {}", "RANK", "USERNAME", "PROFILE", "AVATAR");
    println!("{}", "-".repeat(100));
    for e in rows.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "{:<5} {:<18} {:<40} {}",
            e.rank,
            truncate(&e.username, 18),
            e.profile_url(),
            e.avatar()
        );
    }
}

fn print_analysis(analysis: &PostAnalysis) {
    println!("Mention score:        {}/10", analysis.mention_score);
    println!("Insightfulness score: {}/10", analysis.insightfulness_score);
    println!("Originality score:    {}/10", analysis.originality_score);

    let sections = [
        ("Suggestions (EN)", &analysis.suggestions_en),
        ("Saran (ID)", &analysis.suggestions_id),
        ("Additions (EN)", &analysis.additions.en),
        ("Tambahan (ID)", &analysis.additions.id),
    ];
    for (label, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("\n{}:", label);
        for item in items {
            println!("  - {}", item);
        }
    }

    if !analysis.after_tweet.is_empty() {
        println!("\n--- After ---\n{}", analysis.after_tweet);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Émile Zola Fan Club", 10), "Émile Z...");
    }

    #[test]
    fn test_resolve_project_falls_back_to_raw_id() {
        assert_eq!(resolve_project("monad").display_name, "Monad");
        assert_eq!(resolve_project("SOMETHING").name, "SOMETHING");
    }

    #[test]
    fn test_cli_parses_leaderboard_flags() {
        let cli = Cli::try_parse_from([
            "yapboard",
            "leaderboard",
            "MONAD",
            "--sort",
            "follower_count",
            "--desc",
            "--export",
            "--links",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Leaderboard { sort, desc, export, links, .. }) => {
                assert_eq!(sort, SortKey::FollowerCount);
                assert!(desc);
                assert!(export);
                assert!(links);
            }
            _ => panic!("expected leaderboard command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_sort_key() {
        assert!(Cli::try_parse_from(["yapboard", "leaderboard", "MONAD", "--sort", "karma"]).is_err());
    }

    #[test]
    fn test_cli_defaults_to_dashboard() {
        let cli = Cli::try_parse_from(["yapboard"]).unwrap();
        assert!(cli.command.is_none());
    }
}
