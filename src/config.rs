use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LEADERBOARD_URL: &str =
    "https://hub.kaito.ai/api/v1/gateway/ai/kol/mindshare/top-leaderboard";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.novita.ai/v3/openai/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "qwen/qwen2.5-7b-instruct";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings shared by every subcommand.
/// Priority: CLI args > environment variables > config file > defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "YAPBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Leaderboard API base URL
    #[arg(long, global = true, env = "YAPBOARD_LEADERBOARD_URL")]
    pub leaderboard_url: Option<String>,

    /// Chat-completion endpoint used by the post analyzer
    #[arg(long, global = true, env = "YAPBOARD_LLM_ENDPOINT")]
    pub llm_endpoint: Option<String>,

    /// Model id sent to the chat-completion endpoint
    #[arg(long, global = true, env = "YAPBOARD_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// API key for the chat-completion endpoint
    #[arg(long, global = true, env = "YAPBOARD_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Timeout for outbound HTTP requests, in seconds (1-120)
    #[arg(long, global = true, env = "YAPBOARD_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Directory CSV exports are written to
    #[arg(long, global = true, env = "YAPBOARD_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub leaderboard_url: Option<String>,
    pub llm_endpoint: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub leaderboard_url: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub timeout: Duration,
    pub export_dir: PathBuf,
}

impl Config {
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => load_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: &ConfigArgs, file: ConfigFile) -> Result<Self> {
        let leaderboard_url = args
            .leaderboard_url
            .clone()
            .or(file.leaderboard_url)
            .unwrap_or_else(|| DEFAULT_LEADERBOARD_URL.to_string());
        validate_url(&leaderboard_url, "leaderboard_url")?;

        let llm_endpoint = args
            .llm_endpoint
            .clone()
            .or(file.llm_endpoint)
            .unwrap_or_else(|| DEFAULT_LLM_ENDPOINT.to_string());
        validate_url(&llm_endpoint, "llm_endpoint")?;

        let llm_model = args
            .llm_model
            .clone()
            .or(file.llm_model)
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        let llm_api_key = args
            .llm_api_key
            .clone()
            .or(file.llm_api_key)
            .filter(|k| !k.trim().is_empty());

        let timeout_secs = args
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !(1..=120).contains(&timeout_secs) {
            return Err(anyhow!("timeout_secs must be between 1 and 120, got {}", timeout_secs));
        }

        let export_dir = args
            .export_dir
            .clone()
            .or(file.export_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            leaderboard_url,
            llm_endpoint,
            llm_model,
            llm_api_key,
            timeout: Duration::from_secs(timeout_secs),
            export_dir,
        })
    }
}

fn load_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "yapboard").map(|d| d.config_dir().join("config.toml"))
}

pub fn default_log_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", "yapboard") {
        Some(dirs) => dirs.data_dir().join("yapboard.log"),
        None => PathBuf::from("yapboard.log"),
    }
}

fn validate_url(url: &str, name: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid {}: '{}'", name, url))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("Invalid {}: unsupported scheme '{}'", name, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::resolve(&ConfigArgs::default(), ConfigFile::default()).unwrap();
        assert_eq!(cfg.leaderboard_url, DEFAULT_LEADERBOARD_URL);
        assert_eq!(cfg.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert!(cfg.llm_api_key.is_none());
    }

    #[test]
    fn test_args_override_file() {
        let args = ConfigArgs {
            llm_model: Some("cli-model".to_string()),
            ..Default::default()
        };
        let file: ConfigFile = toml::from_str(
            r#"
            llm_model = "file-model"
            llm_api_key = "sk-file"
            timeout_secs = 30
            "#,
        )
        .unwrap();
        let cfg = Config::resolve(&args, file).unwrap();
        assert_eq!(cfg.llm_model, "cli-model");
        assert_eq!(cfg.llm_api_key.as_deref(), Some("sk-file"));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let args = ConfigArgs {
            llm_api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let cfg = Config::resolve(&args, ConfigFile::default()).unwrap();
        assert!(cfg.llm_api_key.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = ConfigArgs {
            leaderboard_url: Some("ftp://example.com".to_string()),
            ..Default::default()
        };
        assert!(Config::resolve(&args, ConfigFile::default()).is_err());

        let args = ConfigArgs {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(Config::resolve(&args, ConfigFile::default()).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/yapboard.toml")),
            ..Default::default()
        };
        let err = Config::load(&args).unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }
}
