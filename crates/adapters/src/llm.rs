use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderValue};
use serde::{Deserialize, Serialize};

use blog_core::config::{Config, LlmConfig};
use blog_core::{LanguageModel, LanguageModelError, Provider};

use crate::base_url::{ensure_openai_base_url_has_v1, resolve_base_url};
use crate::error::AdapterError;
use crate::retry::{call_with_retry, RetryConfig};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub fn create_llm_adapter_from_config(
    config: &Config,
    profile_name: &str,
) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let profile = config.get_llm_profile(profile_name).ok_or_else(|| {
        AdapterError::InvalidConfig(format!("unknown LLM profile `{}`", profile_name))
    })?;
    create_llm_adapter(profile)
}

pub fn create_llm_adapter(profile: &LlmConfig) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let timeout = profile.timeout.max(1);
    let retry = RetryConfig::new(profile.max_retries.max(1), Duration::from_secs(2));
    let model = profile.effective_model().to_string();

    match profile.provider {
        Provider::OpenAi => Ok(Box::new(OpenAiLikeAdapter::new(
            ensure_openai_base_url_has_v1(&resolve_base_url(&profile.base_url, OPENAI_BASE_URL)),
            &profile.api_key,
            model,
            profile.max_tokens,
            profile.temperature,
            timeout,
            retry,
        )?)),
        Provider::Groq => Ok(Box::new(OpenAiLikeAdapter::new(
            ensure_openai_base_url_has_v1(&resolve_base_url(&profile.base_url, GROQ_BASE_URL)),
            &profile.api_key,
            model,
            profile.max_tokens,
            profile.temperature,
            timeout,
            retry,
        )?)),
        Provider::Gemini => Ok(Box::new(GeminiAdapter::new(
            resolve_base_url(&profile.base_url, GEMINI_BASE_URL),
            &profile.api_key,
            &model,
            profile.max_tokens,
            profile.temperature,
            timeout,
            retry,
        )?)),
        Provider::Replicate => Err(AdapterError::InvalidConfig(
            "Replicate hosts the image model only and cannot generate blog text".to_string(),
        )),
    }
}

/// Chat-completions client for OpenAI and OpenAI-compatible hosts (Groq).
struct OpenAiLikeAdapter {
    client: Client,
    url: String,
    api_key: String,
    model_name: String,
    max_tokens: Option<u32>,
    temperature: f32,
    retry: RetryConfig,
}

impl OpenAiLikeAdapter {
    fn new(
        base_url: String,
        api_key: &str,
        model_name: String,
        max_tokens: u32,
        temperature: f32,
        timeout: u64,
        retry: RetryConfig,
    ) -> Result<Self, AdapterError> {
        if api_key.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "api_key must not be empty".to_string(),
            ));
        }

        if model_name.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "model_name must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            model_name,
            max_tokens: if max_tokens == 0 {
                None
            } else {
                Some(max_tokens)
            },
            temperature,
            retry,
        })
    }

    fn invoke_once(&self, prompt: &str) -> Result<String, AdapterError> {
        let body = ChatCompletionRequest {
            model: self.model_name.as_str(),
            messages: vec![ChatMessageRequest {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("POST {} (model {})", self.url, self.model_name);
        let response = self
            .client
            .post(&self.url)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        handle_chat_response(response)
    }
}

impl LanguageModel for OpenAiLikeAdapter {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        call_with_retry(|| self.invoke_once(prompt), &self.retry).map_err(Into::into)
    }
}

struct GeminiAdapter {
    client: Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl GeminiAdapter {
    fn new(
        base_url: String,
        api_key: &str,
        model_name: &str,
        max_tokens: u32,
        temperature: f32,
        timeout: u64,
        retry: RetryConfig,
    ) -> Result<Self, AdapterError> {
        if api_key.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "Gemini api_key must not be empty".to_string(),
            ));
        }

        if model_name.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "Gemini model_name must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            url: format!("{base_url}/models/{model_name}:generateContent"),
            api_key: api_key.trim().to_string(),
            temperature,
            max_tokens,
            retry,
        })
    }

    fn invoke_once(&self, prompt: &str) -> Result<String, AdapterError> {
        let request = GeminiRequest {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        };

        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AdapterError::HttpStatus { status, body });
        }

        let parsed: GeminiResponse = response.json()?;
        parse_gemini_response(parsed)
    }
}

impl LanguageModel for GeminiAdapter {
    fn invoke(&self, prompt: &str) -> Result<String, LanguageModelError> {
        call_with_retry(|| self.invoke_once(prompt), &self.retry).map_err(Into::into)
    }
}

fn handle_chat_response(response: reqwest::blocking::Response) -> Result<String, AdapterError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(AdapterError::HttpStatus { status, body });
    }

    let parsed: ChatCompletionResponse = response.json()?;
    extract_choice_content(parsed).ok_or(AdapterError::EmptyResponse)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn extract_choice_content(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.and_then(|message| message.content))
        .find(|content| !content.trim().is_empty())
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiRequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Other(serde_json::Value),
}

fn parse_gemini_response(response: GeminiResponse) -> Result<String, AdapterError> {
    for candidate in response.candidates {
        match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => warn!("Gemini response truncated due to max_tokens limit"),
            Some("SAFETY") => warn!("Gemini response blocked by safety filters"),
            Some("RECITATION") => warn!("Gemini response blocked due to recitation concerns"),
            _ => {}
        }

        if let Some(content) = candidate.content {
            let text: String = content
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    GeminiPart::Text { text } => Some(text),
                    GeminiPart::Other(_) => None,
                })
                .collect();
            if !text.trim().is_empty() {
                return Ok(text);
            }
        }
    }

    Err(AdapterError::EmptyResponse)
}
