//! Panel configuration loaded from TOML.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (`PANEL_API_KEY`, `PANEL_BASE_URL`, `PANEL_MODEL`)
//! 2. Values in the config file
//! 3. Built-in defaults

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use coordination::InterventionPolicy;
use serde::Deserialize;

use crate::error::PanelError;
use crate::prompts;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const ENV_API_KEY: &str = "PANEL_API_KEY";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BASE_URL: &str = "PANEL_BASE_URL";
const ENV_MODEL: &str = "PANEL_MODEL";

/// Top-level panel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    /// Dataset directory name under `paths.data_path`.
    pub dataset_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub paths: Paths,
    /// One persona statement per rater, in rater order.
    pub personas: Vec<String>,
    #[serde(default)]
    pub prompt: PromptSet,
    #[serde(default)]
    pub codebook_example: CodebookExample,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Number of raters on the panel.
    #[serde(default = "default_agents")]
    pub agents: usize,
    /// Bound on discussion and mediation rounds.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    /// Seed for the first run; run `i` uses `seed + i`.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub intervention: InterventionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            rounds: default_rounds(),
            chunk_size: default_chunk_size(),
            model: default_model(),
            base_url: None,
            temperature: 0.0,
            seed: 0,
            request_timeout_secs: default_request_timeout_secs(),
            intervention: InterventionPolicy::default(),
        }
    }
}

/// Bounded retry for the rating capability.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_result_path")]
    pub result_path: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            result_path: default_result_path(),
        }
    }
}

/// Framing prompts per phase; every field falls back to a built-in default.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    #[serde(default = "prompts::default_coding")]
    pub coding: String,
    #[serde(default = "prompts::default_discussion")]
    pub discussion: String,
    #[serde(default = "prompts::default_update")]
    pub update: String,
    #[serde(default = "prompts::default_mediator")]
    pub mediator: String,
    #[serde(default = "prompts::default_collaborative")]
    pub collaborative: String,
    #[serde(default = "prompts::default_authoritative")]
    pub authoritative: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            coding: prompts::default_coding(),
            discussion: prompts::default_discussion(),
            update: prompts::default_update(),
            mediator: prompts::default_mediator(),
            collaborative: prompts::default_collaborative(),
            authoritative: prompts::default_authoritative(),
        }
    }
}

/// Worked before/after example shown to raters when proposing updates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodebookExample {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub updated: String,
}

fn default_agents() -> usize {
    3
}
fn default_rounds() -> u32 {
    3
}
fn default_chunk_size() -> usize {
    10
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    5
}
fn default_delay_secs() -> u64 {
    20
}
fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}
fn default_result_path() -> PathBuf {
    PathBuf::from("results")
}

impl PanelConfig {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Ok(key) = env::var(ENV_API_KEY).or_else(|_| env::var(ENV_OPENAI_API_KEY)) {
            self.api_key = Some(key);
        }
        if let Ok(url) = env::var(ENV_BASE_URL) {
            self.settings.base_url = Some(url);
        }
        if let Ok(model) = env::var(ENV_MODEL) {
            self.settings.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), PanelError> {
        let s = &self.settings;
        if s.agents == 0 {
            return Err(PanelError::Configuration("settings.agents must be at least 1".into()));
        }
        if s.agents > self.personas.len() {
            return Err(PanelError::Configuration(format!(
                "settings.agents = {} but only {} personas configured",
                s.agents,
                self.personas.len()
            )));
        }
        if s.rounds == 0 {
            return Err(PanelError::Configuration("settings.rounds must be at least 1".into()));
        }
        if s.chunk_size == 0 {
            return Err(PanelError::Configuration(
                "settings.chunk_size must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(PanelError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// `<data_path>/<dataset_name>`
    pub fn dataset_dir(&self) -> PathBuf {
        self.paths.data_path.join(&self.dataset_name)
    }

    /// Personas for the configured number of raters.
    pub fn active_personas(&self) -> &[String] {
        let n = self.settings.agents.min(self.personas.len());
        &self.personas[..n]
    }

    /// System framing for the human's guidance at the configured authority.
    pub fn authority_prompt(&self) -> &str {
        match self.settings.intervention.authority {
            coordination::InterventionAuthority::Collaborative => &self.prompt.collaborative,
            coordination::InterventionAuthority::Authoritative => &self.prompt.authoritative,
        }
    }
}
