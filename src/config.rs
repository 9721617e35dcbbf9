//! TOML configuration parsing and credential resolution.
//!
//! Every section except `[github]` is optional and falls back to the
//! defaults below. Credentials may be given in the file or through the
//! environment; either way they are resolved exactly once, by
//! [`Config::resolve_credentials`], and passed explicitly into the pipeline.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::HeraldError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub github: GitHubConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    #[serde(default = "default_github_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_github_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_rewrite_max_tokens")]
    pub rewrite_max_tokens: u32,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4-turbo".to_string()
}
fn default_rewrite_max_tokens() -> u32 {
    150
}
fn default_summary_max_tokens() -> u32 {
    300
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_model(),
            rewrite_max_tokens: default_rewrite_max_tokens(),
            summary_max_tokens: default_summary_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("rewrite_max_tokens", &self.rewrite_max_tokens)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Where the window starts when no earlier release can be found.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LookbackKind {
    /// `now - days`.
    #[default]
    DaysBeforeNow,
    /// `install_date + offset_days`.
    InstallDateOffset,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    #[serde(default)]
    pub policy: LookbackKind,
    #[serde(default = "default_lookback_days")]
    pub days: i64,
    #[serde(default)]
    pub install_date: Option<NaiveDate>,
    #[serde(default = "default_offset_days")]
    pub offset_days: i64,
}

fn default_lookback_days() -> i64 {
    30
}
fn default_offset_days() -> i64 {
    15
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            policy: LookbackKind::default(),
            days: default_lookback_days(),
            install_date: None,
            offset_days: default_offset_days(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_patch_char_cap")]
    pub patch_char_cap: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_patch_char_cap() -> usize {
    500
}
fn default_concurrency() -> usize {
    4
}
fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            patch_char_cap: default_patch_char_cap(),
            concurrency: default_concurrency(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompositionKind {
    #[default]
    Flat,
    Categorized,
}

/// One row of the marker→category table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub name: String,
    pub markers: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComposeConfig {
    #[serde(default)]
    pub policy: CompositionKind,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub overall_summary: bool,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

fn default_title() -> String {
    "Project Updates".to_string()
}
fn default_true() -> bool {
    true
}
fn default_fallback_category() -> String {
    "Other Changes".to_string()
}

fn default_categories() -> Vec<CategoryConfig> {
    let row = |name: &str, markers: &[&str]| CategoryConfig {
        name: name.to_string(),
        markers: markers.iter().map(|m| m.to_string()).collect(),
    };
    vec![
        row("Bug Fixes", &["-bug fixed", "-bf"]),
        row("New Features", &["-feature", "-ft"]),
        row("Improvements", &["-improvement", "-imp"]),
    ]
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            policy: CompositionKind::default(),
            title: default_title(),
            overall_summary: true,
            fallback_category: default_fallback_category(),
            categories: default_categories(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_secret: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Overwrite,
    Append,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub mode: OutputMode,
}

/// Secrets and identifiers needed by the pipeline, resolved once.
#[derive(Clone)]
pub struct Credentials {
    pub owner: String,
    pub repo: String,
    pub github_token: String,
    pub llm_api_key: String,
    pub webhook_secret: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("github_token", &"<redacted>")
            .field("llm_api_key", &"<redacted>")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Config {
    /// Config for a repository with every other section defaulted.
    pub fn for_repo(owner: &str, repo: &str) -> Self {
        Self {
            github: GitHubConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
                token: None,
                api_base: default_github_api_base(),
                timeout_secs: default_github_timeout_secs(),
            },
            llm: LlmConfig::default(),
            window: WindowConfig::default(),
            fetch: FetchConfig::default(),
            compose: ComposeConfig::default(),
            server: ServerConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Resolve credentials using the process environment as fallback.
    pub fn resolve_credentials_from_env(&self) -> std::result::Result<Credentials, HeraldError> {
        self.resolve_credentials(|key| std::env::var(key).ok())
    }

    /// Resolve credentials, preferring values from the file over `lookup`.
    ///
    /// `lookup` is consulted for `GITHUB_TOKEN`, `OPENAI_API_KEY` and
    /// `GITHUB_WEBHOOK_SECRET`. Empty strings count as missing.
    pub fn resolve_credentials<F>(&self, lookup: F) -> std::result::Result<Credentials, HeraldError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |v: &String| !v.trim().is_empty();
        let pick = |configured: &Option<String>, var: &str| {
            configured
                .clone()
                .filter(present)
                .or_else(|| lookup(var).filter(present))
        };

        let mut missing = Vec::new();
        if self.github.owner.trim().is_empty() {
            missing.push("github.owner");
        }
        if self.github.repo.trim().is_empty() {
            missing.push("github.repo");
        }
        let github_token = pick(&self.github.token, "GITHUB_TOKEN");
        if github_token.is_none() {
            missing.push("github.token (or GITHUB_TOKEN)");
        }
        let llm_api_key = pick(&self.llm.api_key, "OPENAI_API_KEY");
        if llm_api_key.is_none() {
            missing.push("llm.api_key (or OPENAI_API_KEY)");
        }

        match (github_token, llm_api_key) {
            (Some(github_token), Some(llm_api_key)) if missing.is_empty() => Ok(Credentials {
                owner: self.github.owner.clone(),
                repo: self.github.repo.clone(),
                github_token,
                llm_api_key,
                webhook_secret: pick(&self.server.webhook_secret, "GITHUB_WEBHOOK_SECRET"),
            }),
            _ => Err(HeraldError::Configuration(format!(
                "missing GitHub or OpenAI credentials: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Largest accepted `window.days` / `window.offset_days` (about a century).
const MAX_WINDOW_DAYS: i64 = 36_500;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.fetch.patch_char_cap == 0 {
        anyhow::bail!("fetch.patch_char_cap must be > 0");
    }
    if config.fetch.concurrency == 0 {
        anyhow::bail!("fetch.concurrency must be >= 1");
    }
    if !(0..=MAX_WINDOW_DAYS).contains(&config.window.days) {
        anyhow::bail!("window.days must be between 0 and {}", MAX_WINDOW_DAYS);
    }
    if !(0..=MAX_WINDOW_DAYS).contains(&config.window.offset_days) {
        anyhow::bail!(
            "window.offset_days must be between 0 and {}",
            MAX_WINDOW_DAYS
        );
    }
    if config.llm.rewrite_max_tokens == 0 || config.llm.summary_max_tokens == 0 {
        anyhow::bail!("llm max token limits must be > 0");
    }

    if config.compose.policy == CompositionKind::Categorized {
        if config.compose.categories.is_empty() {
            anyhow::bail!("compose.categories must not be empty when policy is 'categorized'");
        }
        for cat in &config.compose.categories {
            if cat.markers.iter().all(|m| m.trim().is_empty()) {
                anyhow::bail!("compose category '{}' has no markers", cat.name);
            }
            if cat.name == config.compose.fallback_category {
                anyhow::bail!(
                    "compose category '{}' clashes with the fallback category",
                    cat.name
                );
            }
        }
    }

    Ok(())
}
