//! Text-generation provider (chat completions over REST).
//!
//! [`Generator`] is the capability the answer synthesizer consumes: one
//! system prompt, one user prompt, sampling parameters, text back.
//! [`ChatGenerator`] speaks the OpenAI/DeepSeek chat-completions dialect
//! with a bearer credential. Timeouts are per request: the caller uses a
//! short one for evidence compression and a longer one for the full answer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

const PROVIDER: &str = "generation";

/// Sampling configuration for one generation call.
#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Remote text-generation provider.
pub trait Generator: Send + Sync {
    fn generate(&self, system_prompt: &str, user_prompt: &str, params: &SamplingParams)
        -> Result<String>;
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct ChatGenerator {
    config: GenerationConfig,
    client: reqwest::blocking::Client,
}

impl ChatGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::Transport {
                provider: PROVIDER,
                source: e,
            })?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

/// Chat-completions URL for a base endpoint. Bare hosts get `/v1` appended
/// (DeepSeek and OpenAI both serve under it).
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl Generator for ChatGenerator {
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &SamplingParams,
    ) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("generation.api_key is not set".into()))?;

        let url = chat_endpoint(&self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(params.timeout)
            .send()
            .map_err(|e| Error::Transport {
                provider: PROVIDER,
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Provider {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| Error::Transport {
            provider: PROVIDER,
            source: e,
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse {
                provider: PROVIDER,
                detail: "response contained no choices".into(),
            })?;

        Ok(choice.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_v1_when_missing() {
        assert_eq!(
            chat_endpoint("https://api.deepseek.com"),
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("https://api.deepseek.com/"),
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_keeps_existing_v1() {
        assert_eq!(
            chat_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn missing_key_is_deferred_to_first_call() {
        let generator = ChatGenerator::new(&GenerationConfig::default()).unwrap();
        let params = SamplingParams {
            temperature: 0.2,
            top_p: 0.95,
            max_tokens: 64,
            timeout: Duration::from_secs(5),
        };
        let err = generator.generate("sys", "user", &params).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
