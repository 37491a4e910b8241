use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Config;
use crate::models::PostAnalysis;

pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Gagal menganalisis post. Pastikan format input sudah benar.";

const FENCED_JSON: &str = r"(?s)```json\s*(.*?)\s*```";

// --- Provider trait ---

#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// The one failure the analyzer reports; the cause is logged, not returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisFailed;

impl fmt::Display for AnalysisFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ANALYSIS_FAILED_MESSAGE)
    }
}

impl std::error::Error for AnalysisFailed {}

// --- Chat-completion provider (OpenAI-compatible) ---

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug)]
pub struct ChatCompletionProvider {
    api_key: String,
    endpoint: String,
    model_id: String,
    client: reqwest::Client,
}

impl ChatCompletionProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.llm_api_key.clone().context(
            "No LLM API key configured. Set it with: export YAPBOARD_LLM_API_KEY=your-key-here",
        )?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            endpoint: config.llm_endpoint.clone(),
            model_id: config.llm_model.clone(),
            client,
        })
    }

    #[cfg(test)]
    fn for_tests(endpoint: &str, api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            model_id: crate::config::DEFAULT_LLM_MODEL.to_string(),
            client: reqwest::Client::builder()
                .no_proxy()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl AIProvider for ChatCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        log::debug!("[analyzer] Requesting completion from {}", self.model_id);
        let request = ChatRequest {
            model: self.model_id.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to chat-completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Chat-completion request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat-completion response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("No content in chat-completion response"))
    }
}

// --- Post analysis ---

pub fn render_prompt(post: &str) -> String {
    format!(
        r#"
You are an expert in evaluating Twitter (X) posts written in a casual "yapping" style, used to hype up a product, protocol, or movement — especially in Web3.

Analyze a single tweet and return:

1. **Engagement Potential (mention_score)**  
2. **Insightfulness (insightfulness_score)**  
3. **Originality (originality_score)**  

4. **Suggestions (suggestions_en and suggestions_id)**  
These are short tips to improve the tweet — such as rewording, reframing, or improving structure — but not full sentences.

5. **Additions (additions.en and additions.id)**  
These must be full, tweet-ready **sentences** the user can paste directly into their post. They should naturally extend the tweet. Do NOT write general ideas or instructions.

6. **After Tweet (after_tweet)**  
Return the full tweet after integrating the English additions into the original content.
Keep the original tweet structure and tone.
Do not remove or rewrite large parts. Only add and enhance.
This should allow the user to see exactly what was added to their original tweet.
Do not include any emojis or hashtags.

Respond ONLY in this JSON format:

```json
{{
  "mention_score": [0–10],
  "insightfulness_score": [0–10],
  "originality_score": [0–10],
  "suggestions_en": [
    "Short tip to improve in English"
  ],
  "suggestions_id": [
    "Saran pendek dalam bahasa Indonesia"
  ],
  "additions": {{
    "en": [
      "Tweet-ready line in English"
    ],
    "id": [
      "Kalimat tambahan dalam bahasa Indonesia"
    ]
  }},
  "after_tweet": "Original tweet with the English additions smoothly inserted — no emoji."
}}
```

Example tweet to analyze:

{post}
"#
    )
}

/// Body of the first ```` ```json ```` fence in `content`, if any.
pub fn extract_json_block(content: &str) -> Option<&str> {
    let re = regex::Regex::new(FENCED_JSON).ok()?;
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn parse_analysis(content: &str) -> Result<PostAnalysis> {
    let json = extract_json_block(content).unwrap_or(content).trim();
    let value: serde_json::Value =
        serde_json::from_str(json).context("LLM response did not contain valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("LLM response did not contain a valid analysis object"));
    }
    serde_json::from_value(value).context("LLM response did not contain a valid analysis object")
}

pub async fn analyze_post(
    provider: &dyn AIProvider,
    post: &str,
) -> std::result::Result<PostAnalysis, AnalysisFailed> {
    if post.trim().is_empty() {
        log::warn!("[analyzer] Refusing to analyze an empty post");
        return Err(AnalysisFailed);
    }

    log::info!("[analyzer] Analyzing post ({} chars)", post.chars().count());
    let prompt = render_prompt(post);
    let outcome = match provider.complete(&prompt).await {
        Ok(content) => parse_analysis(&content),
        Err(e) => Err(e),
    };

    outcome.map_err(|e| {
        log::warn!("[analyzer] Post analysis failed: {:#}", e);
        AnalysisFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigArgs;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct FakeProvider {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: &str) -> Self {
            Self {
                reply: Err(err.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AIProvider for FakeProvider {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    const ANALYSIS_JSON: &str = r#"{
        "mention_score": 7,
        "insightfulness_score": 6,
        "originality_score": 8,
        "suggestions_en": ["Lead with the number"],
        "suggestions_id": ["Mulai dengan angka"],
        "additions": {"en": ["Testnet is live today."], "id": ["Testnet sudah live hari ini."]},
        "after_tweet": "gm builders. Testnet is live today."
    }"#;

    #[test]
    fn test_extract_fenced_block() {
        let content = format!("Here you go:\n```json\n{}\n```\nHope it helps", ANALYSIS_JSON);
        let block = extract_json_block(&content).unwrap();
        assert!(block.starts_with('{'));
        assert!(block.ends_with('}'));
        assert!(extract_json_block("no fence here").is_none());
    }

    #[test]
    fn test_parse_fenced_and_bare() {
        let fenced = format!("```json\n{}\n```", ANALYSIS_JSON);
        let a = parse_analysis(&fenced).unwrap();
        assert_eq!(a.mention_score, 7.0);
        assert_eq!(a.additions.en, vec!["Testnet is live today."]);
        assert_eq!(a.after_tweet, "gm builders. Testnet is live today.");

        let b = parse_analysis(ANALYSIS_JSON).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_analysis("I could not analyze that tweet.").is_err());
        assert!(parse_analysis("```json\n[1, 2]\n```").is_err());
    }

    #[test]
    fn test_parse_tolerates_loose_scores() {
        let a = parse_analysis(
            "```json\n{\"mention_score\": null, \"insightfulness_score\": \"7\", \"after_tweet\": \"gm\"}\n```",
        )
        .unwrap();
        assert_eq!(a.mention_score, 0.0);
        assert_eq!(a.insightfulness_score, 7.0);
        assert_eq!(a.after_tweet, "gm");
    }

    #[test]
    fn test_prompt_interpolates_post() {
        let prompt = render_prompt("gm builders");
        assert!(prompt.trim_end().ends_with("gm builders"));
        assert!(prompt.contains("\"after_tweet\""));
        assert!(prompt.contains("```json\n{"));
        assert!(prompt.contains("\"mention_score\": [0–10],"));
        assert!(prompt.contains("movement — especially in Web3."));
        assert!(prompt.contains("smoothly inserted — no emoji.\""));
    }

    #[tokio::test]
    async fn test_analyze_post_with_bare_json_response() {
        let provider = FakeProvider::replying(ANALYSIS_JSON);
        let result = analyze_post(&provider, "gm builders").await.unwrap();
        assert_eq!(result.originality_score, 8.0);
        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("gm builders"));
    }

    #[tokio::test]
    async fn test_analyze_post_surfaces_generic_failure() {
        let provider = FakeProvider::replying("Sorry, I can't help with that.");
        let err = analyze_post(&provider, "gm").await.unwrap_err();
        assert_eq!(err, AnalysisFailed);
        assert_eq!(err.to_string(), ANALYSIS_FAILED_MESSAGE);

        let provider = FakeProvider::failing("connection reset");
        assert_eq!(analyze_post(&provider, "gm").await, Err(AnalysisFailed));
    }

    #[tokio::test]
    async fn test_analyze_post_skips_request_for_empty_post() {
        let provider = FakeProvider::replying(ANALYSIS_JSON);
        assert_eq!(analyze_post(&provider, "   \n").await, Err(AnalysisFailed));
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_provider_requires_api_key() {
        let cfg = Config::resolve(&ConfigArgs::default(), Default::default()).unwrap();
        let err = ChatCompletionProvider::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("YAPBOARD_LLM_API_KEY"));
    }

    #[test]
    fn test_provider_with_api_key() {
        let args = ConfigArgs {
            llm_api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let cfg = Config::resolve(&args, Default::default()).unwrap();
        let provider = ChatCompletionProvider::new(&cfg).unwrap();
        assert_eq!(provider.model_id, crate::config::DEFAULT_LLM_MODEL);
    }

    /// Serve one canned response and hand back the raw request it answered.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v3/openai/chat/completions", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            // read until the headers and the full body have arrived
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (url, handle)
    }

    fn request_body(raw: &str) -> serde_json::Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_chat_completion_request_and_fenced_reply() {
        let content = format!("Here is the analysis:\n```json\n{}\n```", ANALYSIS_JSON);
        let reply = serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]});
        let (url, server) = serve_once("200 OK", &reply.to_string()).await;

        let provider = ChatCompletionProvider::for_tests(&url, "test-key");
        let result = analyze_post(&provider, "gm builders").await.unwrap();
        assert_eq!(result.mention_score, 7.0);
        assert_eq!(result.additions.id, vec!["Testnet sudah live hari ini."]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v3/openai/chat/completions "));
        assert!(raw.to_lowercase().contains("authorization: bearer test-key"));

        let body = request_body(&raw);
        assert_eq!(body["model"], crate::config::DEFAULT_LLM_MODEL);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("gm builders"));
    }

    #[tokio::test]
    async fn test_chat_completion_error_status_fails() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let provider = ChatCompletionProvider::for_tests(&url, "test-key");

        let err = provider.complete("gm").await.unwrap_err();
        assert!(err.to_string().contains("500"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_completion_without_choices_fails() {
        let (url, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let provider = ChatCompletionProvider::for_tests(&url, "test-key");

        assert_eq!(analyze_post(&provider, "gm").await, Err(AnalysisFailed));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_completion_with_empty_content_fails() {
        let (url, server) = serve_once("200 OK", r#"{"choices":[{"message":{"content":"  "}}]}"#).await;
        let provider = ChatCompletionProvider::for_tests(&url, "test-key");

        let err = provider.complete("gm").await.unwrap_err();
        assert!(err.to_string().contains("No content"));
        server.await.unwrap();
    }
}
