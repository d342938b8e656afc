use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{RiskSignal, Scorer};
use crate::config::LlmConfig;

const SYSTEM_PROMPT: &str = "You are a security policy evaluator. Given an action an agent is about to perform, output a risk score from 0.0 (no risk) to 1.0 (maximum risk) and brief reasons.\n\nConsider: data sensitivity (PII, PHI, PCI, secrets), destination (internal vs external), exfiltration risk, and whether the action matches safe practices.\n\nRespond with ONLY a single JSON object, no other text, in this exact format:\n{\"risk_score\": <number 0.0-1.0>, \"risk_factors\": [\"reason1\", \"reason2\", ...]}";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static RE_SCORE_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{[^{}]*"risk_score"[^{}]*\}"#).unwrap());

static RE_ANY_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// Risk scorer backed by an OpenAI-compatible chat-completions API
/// (hosted API or local Ollama).
pub struct LlmScorer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmScorer {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        // Ollama ignores the key but the header must be non-empty
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("ollama")
            .to_string();

        Self {
            client,
            base_url,
            api_key,
            model: config.model,
            max_tokens: config.max_tokens,
        }
    }

    fn build_user_message(intent: &crate::models::Intent) -> String {
        let args_preview: String = serde_json::to_string(&intent.action.args)
            .unwrap_or_default()
            .chars()
            .take(500)
            .collect();

        format!(
            "Action type: {}\nTool: {}\nTarget: {}\nTarget domain: {}\nArgs (preview): {}\nData classification: {:?}\nWorkspace: {}",
            intent.action.action_type,
            intent.action.tool,
            intent.action.target,
            intent.action.target_domain,
            args_preview,
            intent.context.data_classification,
            intent.context.workspace.as_deref().unwrap_or(""),
        )
    }

    async fn request_completion(&self, intent: &crate::models::Intent) -> reqwest::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::build_user_message(intent)},
            ],
            "max_tokens": self.max_tokens,
            "temperature": 0.1,
        });

        let response: ChatCompletionResponse = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(&self, intent: &crate::models::Intent) -> RiskSignal {
        match self.request_completion(intent).await {
            Ok(content) => parse_completion(&content).normalized(),
            Err(err) => {
                // degrade to policy-only scoring
                tracing::warn!(error = %err, "LLM scorer unavailable");
                RiskSignal::none()
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ScorePayload {
    #[serde(default)]
    risk_score: f64,
    #[serde(default)]
    risk_factors: Value,
}

/// Extract `risk_score` and `risk_factors` from a model completion.
/// Returns the zero signal on any parse failure.
fn parse_completion(text: &str) -> RiskSignal {
    let text = text.trim();
    let fragment = RE_SCORE_OBJECT
        .find(text)
        .or_else(|| RE_ANY_OBJECT.find(text))
        .map(|m| m.as_str());

    let Some(fragment) = fragment else {
        return RiskSignal::none();
    };

    match serde_json::from_str::<ScorePayload>(fragment) {
        Ok(payload) => {
            let reasons = match payload.risk_factors {
                Value::Array(values) => values
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            RiskSignal {
                score: payload.risk_score,
                reasons,
                rewrite: None,
            }
        }
        Err(_) => RiskSignal::none(),
    }
}
