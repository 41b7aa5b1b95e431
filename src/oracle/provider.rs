use std::env;

use crate::error::LensError;
use crate::lens::config::OracleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProvider {
    Groq,
    OpenAi,
    Anthropic,
    Gemini,
    OpenAiCompatible,
}

impl RemoteProvider {
    pub fn label(self) -> &'static str {
        match self {
            RemoteProvider::Groq => "groq",
            RemoteProvider::OpenAi => "openai",
            RemoteProvider::Anthropic => "anthropic",
            RemoteProvider::Gemini => "gemini",
            RemoteProvider::OpenAiCompatible => "openai-compatible",
        }
    }

    fn key_vars(self) -> &'static [&'static str] {
        match self {
            // The generic AI_API_KEY only ever goes to the compatible endpoint.
            RemoteProvider::Groq => &["GROQ_API_KEY"],
            RemoteProvider::OpenAi => &["OPENAI_API_KEY"],
            RemoteProvider::Anthropic => &["ANTHROPIC_API_KEY"],
            RemoteProvider::Gemini => &["GEMINI_API_KEY"],
            RemoteProvider::OpenAiCompatible => &["AI_API_KEY", "DEEPSEEK_API_KEY"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteModelConfig {
    pub provider: RemoteProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

pub fn parse_provider_alias(raw: &str) -> Option<RemoteProvider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "groq" => Some(RemoteProvider::Groq),
        "openai" => Some(RemoteProvider::OpenAi),
        "anthropic" | "claude" => Some(RemoteProvider::Anthropic),
        "gemini" | "google" => Some(RemoteProvider::Gemini),
        "openai-compatible" | "compatible" | "deepseek" => Some(RemoteProvider::OpenAiCompatible),
        _ => None,
    }
}

fn parse_prefixed_model(raw: &str) -> (Option<RemoteProvider>, String) {
    let trimmed = raw.trim();
    if let Some((prefix, model)) = trimmed.split_once(':')
        && let Some(provider) = parse_provider_alias(prefix)
    {
        return (Some(provider), model.trim().to_string());
    }
    (None, trimmed.to_string())
}

fn infer_provider_from_model(model: &str) -> Option<RemoteProvider> {
    let lower = model.trim().to_ascii_lowercase();
    if lower.starts_with("llama") || lower.starts_with("mixtral") || lower.starts_with("gemma") {
        return Some(RemoteProvider::Groq);
    }
    if lower.starts_with("deepseek-") {
        return Some(RemoteProvider::OpenAiCompatible);
    }
    if lower.starts_with("claude-") {
        return Some(RemoteProvider::Anthropic);
    }
    if lower.starts_with("gemini-") {
        return Some(RemoteProvider::Gemini);
    }
    if lower.starts_with("gpt-") || lower.starts_with("o3") || lower.starts_with("o4") {
        return Some(RemoteProvider::OpenAi);
    }
    None
}

pub fn default_model_for_provider(provider: RemoteProvider) -> &'static str {
    match provider {
        RemoteProvider::Groq => "llama-3.3-70b-versatile",
        RemoteProvider::OpenAi => "gpt-4.1-mini",
        RemoteProvider::Anthropic => "claude-3-5-haiku-latest",
        RemoteProvider::Gemini => "gemini-2.5-flash-lite",
        RemoteProvider::OpenAiCompatible => "deepseek-chat",
    }
}

fn default_base_url(provider: RemoteProvider, model: &str) -> Option<String> {
    match provider {
        RemoteProvider::Groq => Some("https://api.groq.com/openai".to_string()),
        RemoteProvider::OpenAi => Some("https://api.openai.com".to_string()),
        RemoteProvider::OpenAiCompatible if model.to_ascii_lowercase().starts_with("deepseek-") => {
            Some("https://api.deepseek.com".to_string())
        }
        _ => None,
    }
}

/// Resolves provider, model and credential through `lookup` so callers can
/// substitute the process environment.
pub struct ProviderResolver<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> ProviderResolver<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn first_available_provider(&self) -> Option<RemoteProvider> {
        if self.var("GROQ_API_KEY").is_some() {
            return Some(RemoteProvider::Groq);
        }
        if self.var("AI_API_KEY").is_some() {
            return Some(RemoteProvider::OpenAiCompatible);
        }
        if self.var("OPENAI_API_KEY").is_some() {
            return Some(RemoteProvider::OpenAi);
        }
        if self.var("ANTHROPIC_API_KEY").is_some() {
            return Some(RemoteProvider::Anthropic);
        }
        if self.var("GEMINI_API_KEY").is_some() {
            return Some(RemoteProvider::Gemini);
        }
        None
    }

    fn api_key(&self, provider: RemoteProvider) -> Option<String> {
        provider.key_vars().iter().find_map(|var| self.var(var))
    }

    pub fn resolve(&self, cfg: &OracleConfig) -> Result<RemoteModelConfig, LensError> {
        let configured = cfg.provider.as_deref().filter(|p| !p.trim().is_empty());
        let explicit = match configured {
            Some(raw) => Some(parse_provider_alias(raw).ok_or_else(|| {
                LensError::CredentialMissing(format!("unknown oracle provider `{raw}`"))
            })?),
            None => None,
        };

        let (prefixed, mut model) = cfg
            .model
            .as_deref()
            .map(parse_prefixed_model)
            .unwrap_or((None, String::new()));

        let provider = explicit
            .or(prefixed)
            .or_else(|| infer_provider_from_model(&model))
            .or_else(|| self.first_available_provider())
            .ok_or_else(|| {
                LensError::CredentialMissing(
                    "set GROQ_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, AI_API_KEY) to categorize entries"
                        .to_string(),
                )
            })?;

        if model.is_empty() {
            model = default_model_for_provider(provider).to_string();
        }

        let api_key = self.api_key(provider).ok_or_else(|| {
            LensError::CredentialMissing(format!(
                "set {} to categorize entries with {}",
                provider.key_vars()[0],
                provider.label()
            ))
        })?;

        let base_url = cfg
            .base_url
            .clone()
            .or_else(|| self.var("AI_BASE_URL"))
            .or_else(|| default_base_url(provider, &model));

        Ok(RemoteModelConfig {
            provider,
            model,
            api_key,
            base_url,
            timeout_secs: cfg.timeout_secs,
        })
    }
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

pub fn resolve_from_env(cfg: &OracleConfig) -> Result<RemoteModelConfig, LensError> {
    ProviderResolver::new(&process_env).resolve(cfg)
}
