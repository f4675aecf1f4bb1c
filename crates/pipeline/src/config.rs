//! Pipeline configuration: service settings from the environment and the
//! boilerplate rules used by the frequency filter

use crate::retry::{
    RetryPolicy, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
};
use crate::{PipelineError, Result};
use regex::{Regex, RegexBuilder};
use std::path::Path;
use std::time::Duration;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Navigation and footer lines of the deployment corpus
pub const DEFAULT_BOILERPLATE_PATTERNS: &[&str] = &[
    r"^Staffnet\s*$",
    r"^Newsletter\sabonnieren\s*$",
    r"^call_made\s*$",
    r"^externe\sSeite\s*$",
    r"^vertical_align_bottom\s*$",
    r"^Download\s*$",
];

fn env_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key).map(|value| value.trim().to_string()) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| PipelineError::Configuration(format!("{key} has invalid value {value:?}"))),
    }
}

/// Connection settings for the LLM service
#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmSettings {
    /// Read settings from the process environment. A missing or blank
    /// credential is a configuration error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PipelineError::Configuration(format!("{API_KEY_VAR} is not set")))?;

        let timeout_secs = env_parse(&lookup, "ENRICH_LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            api_key,
            base_url: env_or_default(&lookup, "ENRICH_LLM_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: env_or_default(&lookup, "ENRICH_LLM_MODEL", DEFAULT_MODEL),
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

/// Batch execution settings shared by the LLM stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_concurrency = env_parse(&lookup, "ENRICH_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?;
        let max_attempts = env_parse(&lookup, "ENRICH_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let initial_ms = env_parse(
            &lookup,
            "ENRICH_RETRY_INITIAL_BACKOFF_MS",
            DEFAULT_INITIAL_BACKOFF_MS,
        )?;
        let max_ms = env_parse(&lookup, "ENRICH_RETRY_MAX_BACKOFF_MS", DEFAULT_MAX_BACKOFF_MS)?;

        Ok(Self {
            max_concurrency: max_concurrency.max(1),
            retry: RetryPolicy::new(max_attempts, initial_ms, max_ms),
        })
    }
}

/// Ordered, immutable list of case-insensitive paragraph rules
#[derive(Debug, Clone)]
pub struct BoilerplateRules {
    patterns: Vec<Regex>,
}

impl Default for BoilerplateRules {
    fn default() -> Self {
        // The built-in patterns are known to compile
        Self::from_patterns(DEFAULT_BOILERPLATE_PATTERNS.iter().copied())
            .unwrap_or_else(|_| Self::none())
    }
}

impl BoilerplateRules {
    /// No pattern rules; only frequency filtering applies
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn from_patterns<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        PipelineError::Configuration(format!("invalid pattern {pattern:?}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// One regex per line; blank lines and `#` comments are ignored
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_patterns(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Whether the paragraph is boilerplate: every non-empty line, trimmed,
    /// matches some rule. A paragraph mixing rule lines with other text is
    /// kept whole.
    pub fn matches(&self, paragraph: &str) -> bool {
        let mut lines = paragraph
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .peekable();
        lines.peek().is_some() && lines.all(|line| self.matches_line(line))
    }

    fn matches_line(&self, line: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(line))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
