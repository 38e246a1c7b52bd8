//! LLM configuration parsed from environment variables.

use super::types::LlmError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_LLM_READ_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MOCK_DELAY_MS: u64 = 1000;
pub const DEFAULT_MOCK_WORD_DELAY_MS: u64 = 50;

const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Keys at or below this length are rejected.
const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    /// Longest idle gap between response body reads. Not a whole-request cap.
    pub read_secs: u64,
    pub connect_secs: u64,
}

/// Latency knobs for the simulated provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockTiming {
    pub delay_ms: u64,
    pub word_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    /// Empty when the simulator is selected.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeouts: LlmTimeouts,
    pub mock: MockTiming,
}

impl LlmConfig {
    /// Build typed LLM config from environment variables.
    ///
    /// - `OPENAI_API_KEY`: provider credential; absent means simulator
    /// - `USE_MOCKS`: force the simulator (default false)
    /// - `MOCK_OPENAI`: `false` forces the live provider even with mocks on
    /// - `MOCK_DELAY_MS` / `MOCK_WORD_DELAY_MS`: simulator latency
    /// - `LLM_MODEL`, `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`
    /// - `LLM_OPENAI_BASE_URL`: default `OpenAI` API base URL
    /// - `LLM_READ_TIMEOUT_SECS` / `LLM_CONNECT_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns an error when the live provider is required but the key is
    /// missing or malformed.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmConfig::from_env`] but reads through `lookup`.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LlmError> {
        let api_key = lookup(API_KEY_VAR).filter(|k| !k.trim().is_empty());
        let mocks_enabled = parse_bool(lookup("USE_MOCKS").as_deref()).unwrap_or(false) || api_key.is_none();
        let mock_openai = parse_bool(lookup("MOCK_OPENAI").as_deref()).unwrap_or(true);

        let (provider, api_key) = if mocks_enabled && mock_openai {
            (LlmProviderKind::Simulated, String::new())
        } else {
            let key = api_key.ok_or_else(|| LlmError::MissingApiKey { var: API_KEY_VAR.into() })?;
            if !key.starts_with("sk-") || key.len() <= MIN_API_KEY_LEN {
                return Err(LlmError::ConfigParse(format!("invalid {API_KEY_VAR} format")));
            }
            (LlmProviderKind::OpenAi, key)
        };

        let model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = lookup("LLM_OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            provider,
            api_key,
            model,
            base_url,
            max_tokens: parse_or(lookup("LLM_MAX_TOKENS"), DEFAULT_MAX_TOKENS),
            temperature: parse_or(lookup("LLM_TEMPERATURE"), DEFAULT_TEMPERATURE),
            timeouts: LlmTimeouts {
                read_secs: parse_or(lookup("LLM_READ_TIMEOUT_SECS"), DEFAULT_LLM_READ_TIMEOUT_SECS),
                connect_secs: parse_or(lookup("LLM_CONNECT_TIMEOUT_SECS"), DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
            },
            mock: MockTiming {
                delay_ms: parse_or(lookup("MOCK_DELAY_MS"), DEFAULT_MOCK_DELAY_MS),
                word_delay_ms: parse_or(lookup("MOCK_WORD_DELAY_MS"), DEFAULT_MOCK_WORD_DELAY_MS),
            },
        })
    }

    /// Simulator config with default timings. Used by the mock route.
    #[must_use]
    pub fn simulated() -> Self {
        Self {
            provider: LlmProviderKind::Simulated,
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeouts: LlmTimeouts {
                read_secs: DEFAULT_LLM_READ_TIMEOUT_SECS,
                connect_secs: DEFAULT_LLM_CONNECT_TIMEOUT_SECS,
            },
            mock: MockTiming { delay_ms: 0, word_delay_ms: DEFAULT_MOCK_WORD_DELAY_MS },
        }
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_bool(raw: Option<&str>) -> Option<bool> {
    raw.and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
