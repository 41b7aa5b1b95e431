use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::LensError;
use crate::oracle::provider::{RemoteModelConfig, RemoteProvider};

/// One JSON-mode chat completion at temperature zero.
pub trait ChatBackend {
    fn complete_json(&self, system: &str, user: &str) -> Result<String>;
    fn label(&self) -> String;
}

pub struct OpenAiCompatBackend {
    pub provider: RemoteProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

pub struct AnthropicBackend {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

pub struct GeminiBackend {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|err| LensError::oracle(format!("failed to build http client: {err}")).into())
}

fn send_json(request: reqwest::blocking::RequestBuilder, provider: &str) -> Result<Value> {
    let response = request
        .send()
        .map_err(|err| LensError::oracle(format!("{provider} unreachable: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(LensError::oracle(format!("{provider} call failed with status {status}")).into());
    }
    response
        .json::<Value>()
        .map_err(|err| LensError::oracle(format!("{provider} returned undecodable body: {err}")).into())
}

pub fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let choices = json.get("choices").and_then(Value::as_array)?;
    let first = choices.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let chunks = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>();
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

pub fn extract_anthropic_text(json: &Value) -> Option<String> {
    let content = json.get("content").and_then(Value::as_array)?;
    let chunks = content
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>();
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}

pub fn extract_gemini_text(json: &Value) -> Option<String> {
    json.get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|v| v.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl ChatBackend for OpenAiCompatBackend {
    fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/v1/chat/completions");
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.0
        });

        let client = http_client(self.timeout_secs)?;
        let request = client.post(&url).bearer_auth(&self.api_key).json(&payload);
        let json = send_json(request, self.provider.label())?;
        extract_openai_compatible_text(&json).ok_or_else(|| {
            LensError::oracle(format!("{} response missing text content", self.provider.label()))
                .into()
        })
    }

    fn label(&self) -> String {
        format!("{}:{}", self.provider.label(), self.model)
    }
}

impl ChatBackend for AnthropicBackend {
    fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "max_tokens": 2048,
            "temperature": 0.0,
            "system": system,
            "messages": [
                {"role": "user", "content": user}
            ]
        });

        let client = http_client(self.timeout_secs)?;
        let request = client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload);
        let json = send_json(request, "anthropic")?;
        extract_anthropic_text(&json)
            .ok_or_else(|| LensError::oracle("anthropic response missing text content").into())
    }

    fn label(&self) -> String {
        format!("anthropic:{}", self.model)
    }
}

impl ChatBackend for GeminiBackend {
    fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let payload = serde_json::json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [
                {"role": "user", "parts": [{"text": user}]}
            ],
            "generationConfig": {
                "temperature": 0.0,
                "responseMimeType": "application/json"
            }
        });

        let client = http_client(self.timeout_secs)?;
        let json = send_json(client.post(&url).json(&payload), "gemini")?;
        extract_gemini_text(&json)
            .ok_or_else(|| LensError::oracle("gemini response missing text content").into())
    }

    fn label(&self) -> String {
        format!("gemini:{}", self.model)
    }
}

pub fn backend_for(remote: &RemoteModelConfig) -> Box<dyn ChatBackend> {
    match remote.provider {
        RemoteProvider::Anthropic => Box::new(AnthropicBackend {
            api_key: remote.api_key.clone(),
            model: remote.model.clone(),
            timeout_secs: remote.timeout_secs,
        }),
        RemoteProvider::Gemini => Box::new(GeminiBackend {
            api_key: remote.api_key.clone(),
            model: remote.model.clone(),
            timeout_secs: remote.timeout_secs,
        }),
        provider => Box::new(OpenAiCompatBackend {
            provider,
            api_key: remote.api_key.clone(),
            model: remote.model.clone(),
            base_url: remote
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            timeout_secs: remote.timeout_secs,
        }),
    }
}
