use std::env;
use std::time::Duration;

use cr_common::analysis::SYSTEM_PROMPT;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

const MOCK_RESPONSE: &str = "\n        Análisis de ejemplo: tu combinación de rasgos de personalidad e inteligencias \
sugiere que disfrutarás carreras donde puedas aplicar tus fortalezas naturales.\n        ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Chat-completions endpoints (OpenAI, Mistral, xAI, DeepSeek and compatibles).
    OpenAiCompatible,
    Anthropic,
    Mock,
}

impl LlmProvider {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "anthropic" => LlmProvider::Anthropic,
            "mock" => LlmProvider::Mock,
            _ => LlmProvider::OpenAiCompatible,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: String::new(),
            timeout_secs: 30,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    pub fn mock() -> Self {
        Self {
            enabled: true,
            provider: "mock".into(),
            model: "mock".into(),
            endpoint: String::new(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        fn provider_defaults(provider: &str) -> (String, String) {
            match provider.to_ascii_lowercase().as_str() {
                "anthropic" => (
                    "claude-3-5-sonnet-20240620".into(),
                    "https://api.anthropic.com/v1/messages".into(),
                ),
                "mistral" => (
                    "mistral-large-latest".into(),
                    "https://api.mistral.ai/v1/chat/completions".into(),
                ),
                "xai" => (
                    "grok-2-latest".into(),
                    "https://api.x.ai/v1/chat/completions".into(),
                ),
                "deepseek" => (
                    "deepseek-chat".into(),
                    "https://api.deepseek.com/v1/chat/completions".into(),
                ),
                "mock" => ("mock".into(), String::new()),
                _ => (
                    "gpt-4o-mini".into(),
                    "https://api.openai.com/v1/chat/completions".into(),
                ),
            }
        }

        fn provider_api_key(provider: &str) -> Option<String> {
            match provider.to_ascii_lowercase().as_str() {
                "openai" => env::var("OPENAI_API_KEY").ok(),
                "anthropic" => env::var("ANTHROPIC_API_KEY").ok(),
                "mistral" => env::var("MISTRAL_API_KEY").ok(),
                "xai" => env::var("XAI_API_KEY").ok(),
                "deepseek" => env::var("DEEPSEEK_API_KEY").ok(),
                _ => None,
            }
        }

        fn parse_bool(key: &str, default: bool) -> bool {
            match env::var(key) {
                Ok(val) => matches!(val.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
                Err(_) => default,
            }
        }

        fn parse_num<T: std::str::FromStr>(key: &str, default: T) -> T {
            env::var(key)
                .ok()
                .and_then(|raw| raw.trim().parse::<T>().ok())
                .unwrap_or(default)
        }

        let defaults = Self::default();
        let provider = env::var("LLM_PROVIDER").unwrap_or_else(|_| defaults.provider.clone());
        let (default_model, default_endpoint) = provider_defaults(&provider);
        let api_key = env::var("LLM_API_KEY")
            .ok()
            .or_else(|| provider_api_key(&provider))
            .unwrap_or_default();

        Self {
            enabled: parse_bool("LLM_ENABLED", defaults.enabled),
            provider,
            model: env::var("LLM_MODEL").unwrap_or(default_model),
            endpoint: env::var("LLM_ENDPOINT").unwrap_or(default_endpoint),
            api_key,
            timeout_secs: parse_num("LLM_TIMEOUT_SECONDS", defaults.timeout_secs).max(1),
            max_tokens: parse_num("LLM_MAX_TOKENS", defaults.max_tokens),
            temperature: parse_num("LLM_TEMPERATURE", defaults.temperature),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for provider {0}")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned no text")]
    EmptyResponse,
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicMessage {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Sends prompts to the configured provider. Never used on the recommendation path.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    provider: LlmProvider,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let provider = LlmProvider::from_name(&config.provider);
        if provider != LlmProvider::Mock && config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(config.provider.clone()));
        }
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config,
            provider,
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.config.provider
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let limit = self.config.timeout();
        info!(
            provider = %self.config.provider,
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "calling llm"
        );
        tokio::time::timeout(limit, self.send(prompt))
            .await
            .map_err(|_| LlmError::Timeout(limit))?
    }

    async fn send(&self, prompt: &str) -> Result<String, LlmError> {
        let request = match self.provider {
            LlmProvider::Mock => return Ok(MOCK_RESPONSE.to_string()),
            LlmProvider::OpenAiCompatible => self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&json!({
                    "model": self.config.model,
                    "messages": [
                        {"role": "system", "content": SYSTEM_PROMPT},
                        {"role": "user", "content": prompt},
                    ],
                    "max_tokens": self.config.max_tokens,
                    "temperature": self.config.temperature,
                })),
            LlmProvider::Anthropic => self
                .http
                .post(&self.config.endpoint)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": self.config.model,
                    "system": SYSTEM_PROMPT,
                    "messages": [{"role": "user", "content": prompt}],
                    "max_tokens": self.config.max_tokens,
                    "temperature": self.config.temperature,
                })),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.config.provider, status = status.as_u16(), "llm request rejected");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = match self.provider {
            LlmProvider::Anthropic => response
                .json::<AnthropicMessage>()
                .await?
                .content
                .into_iter()
                .find_map(|block| block.text),
            _ => response
                .json::<ChatCompletion>()
                .await?
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content),
        };

        text.filter(|t| !t.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_GUARD.lock().unwrap();
        let previous: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let old = env::var(key).ok();
                match value {
                    Some(v) => unsafe { env::set_var(key, v) },
                    None => unsafe { env::remove_var(key) },
                }
                (*key, old)
            })
            .collect();

        f();

        for (key, value) in previous {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }

    #[test]
    fn disabled_unless_configured() {
        with_env(&[("LLM_ENABLED", None), ("LLM_PROVIDER", None)], || {
            let cfg = LlmConfig::from_env();
            assert!(!cfg.enabled);
            assert_eq!(cfg.provider, "openai");
        });
    }

    #[test]
    fn provider_defaults_and_keys_follow_provider() {
        with_env(
            &[
                ("LLM_ENABLED", Some("true")),
                ("LLM_PROVIDER", Some("anthropic")),
                ("LLM_MODEL", None),
                ("LLM_ENDPOINT", None),
                ("LLM_API_KEY", None),
                ("ANTHROPIC_API_KEY", Some("sk-ant")),
                ("LLM_TIMEOUT_SECONDS", Some("0")),
            ],
            || {
                let cfg = LlmConfig::from_env();
                assert!(cfg.enabled);
                assert_eq!(cfg.endpoint, "https://api.anthropic.com/v1/messages");
                assert_eq!(cfg.api_key, "sk-ant");
                assert_eq!(cfg.timeout_secs, 1);
            },
        );
    }

    #[test]
    fn real_providers_need_an_api_key() {
        let err = LlmClient::new(LlmConfig {
            enabled: true,
            ..LlmConfig::default()
        })
        .err()
        .unwrap();

        assert!(matches!(err, LlmError::MissingApiKey(provider) if provider == "openai"));
    }

    #[tokio::test]
    async fn mock_provider_answers_without_network() {
        let client = LlmClient::new(LlmConfig::mock()).unwrap();

        let text = client.complete("Perfil MBTI: INTJ").await.unwrap();

        assert!(text.contains("Análisis"));
    }
}
