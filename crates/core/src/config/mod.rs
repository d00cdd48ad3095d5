use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::credentials::Provider;

pub const DEFAULT_IMAGE_MODEL: &str =
    "stability-ai/stable-diffusion:ac732df83cea7fff18b8472768c88ad041fa750ff7682a21affe81863cbe77e4";
pub const DEFAULT_IMAGE_SCHEDULER: &str = "K_EULER";

fn default_provider() -> Provider {
    Provider::OpenAi
}

fn default_temperature() -> f32 {
    0.6
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout() -> u64 {
    600
}

fn default_max_retries() -> usize {
    1
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_image_scheduler() -> String {
    DEFAULT_IMAGE_SCHEDULER.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_poll_timeout_secs() -> u64 {
    300
}

fn default_search_enabled() -> bool {
    true
}

fn default_search_max_results() -> usize {
    5
}

fn default_output_dir() -> String {
    "output".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Attempts per model call inside the adapter. 1 disables retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_provider(default_provider())
    }
}

impl LlmConfig {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            api_key: String::new(),
            base_url: String::new(),
            model_name: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// The configured model, falling back to the provider's default.
    pub fn effective_model(&self) -> &str {
        let trimmed = self.model_name.trim();
        if trimmed.is_empty() {
            self.provider.default_model().unwrap_or_default()
        } else {
            trimmed
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default = "default_image_scheduler")]
    pub scheduler: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: String::new(),
            model: default_image_model(),
            scheduler: default_image_scheduler(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_search_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: default_search_enabled(),
            base_url: String::new(),
            max_results: default_search_max_results(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BlogConfig {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    #[serde(default)]
    pub custom_directories: Vec<PathBuf>,
    #[serde(default)]
    pub enable_hot_reload: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecentUsage {
    #[serde(default)]
    pub last_llm_profile: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub llm_profiles: BTreeMap<String, LlmConfig>,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub blog: BlogConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub recent: RecentUsage,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_llm_profile(&self, name: &str) -> Option<&LlmConfig> {
        self.llm_profiles.get(name)
    }

    pub fn upsert_llm_profile<S: Into<String>>(&mut self, name: S, profile: LlmConfig) {
        self.llm_profiles.insert(name.into(), profile);
    }

    pub fn remove_llm_profile(&mut self, name: &str) -> Option<LlmConfig> {
        self.llm_profiles.remove(name)
    }

    /// First profile bound to `provider`, by profile name order.
    pub fn profile_for_provider(&self, provider: Provider) -> Option<(&String, &LlmConfig)> {
        self.llm_profiles
            .iter()
            .find(|(_, profile)| profile.provider == provider)
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::from_path(&path)?
        } else {
            Config::default()
        };

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn reload(&mut self) -> Result<(), ConfigError> {
        if self.path.exists() {
            self.config = Config::from_path(&self.path)?;
        } else {
            self.config = Config::default();
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.to_path(&self.path)
    }

    pub fn touch_llm_profile<S: Into<String>>(&mut self, name: S) {
        self.config.recent.last_llm_profile = Some(name.into());
    }

    pub fn last_llm_profile(&self) -> Option<&str> {
        self.config
            .recent
            .last_llm_profile
            .as_deref()
            .and_then(|name| self.config.llm_profiles.get(name).map(|_| name))
    }

    pub fn ensure_recent_defaults(&mut self) {
        if self
            .config
            .recent
            .last_llm_profile
            .as_ref()
            .map(|name| self.config.llm_profiles.contains_key(name))
            != Some(true)
        {
            let next = self.config.llm_profiles.keys().next().cloned();
            self.config.recent.last_llm_profile = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn parses_full_config() {
        let json = r#"{
            "llm_profiles": {
                "groq-fast": {
                    "provider": "groq",
                    "api_key": "gsk_123",
                    "model_name": "llama3-70b-8192",
                    "temperature": 0.6,
                    "max_tokens": 2000
                }
            },
            "image": {
                "api_token": "r8_token"
            },
            "search": {
                "enabled": false,
                "max_results": 3
            },
            "blog": {
                "topic": "serverless computing",
                "output_dir": "posts"
            },
            "recent": {
                "last_llm_profile": "groq-fast"
            }
        }"#;

        let config = Config::from_json_str(json).unwrap();
        let profile = config.get_llm_profile("groq-fast").unwrap();
        assert_eq!(profile.provider, Provider::Groq);
        assert_eq!(profile.timeout, 600);
        assert_eq!(profile.max_retries, 1);
        assert_eq!(config.image.scheduler, "K_EULER");
        assert_eq!(config.image.model, DEFAULT_IMAGE_MODEL);
        assert!(!config.search.enabled);
        assert_eq!(config.blog.output_dir, "posts");
    }

    #[test]
    fn empty_input_yields_defaults() {
        let config = Config::from_json_str("  ").unwrap();
        assert!(config.llm_profiles.is_empty());
        assert!(config.search.enabled);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.blog.output_dir, "output");
    }

    #[test]
    fn effective_model_falls_back_to_provider_default() {
        let mut profile = LlmConfig::for_provider(Provider::Gemini);
        assert_eq!(profile.effective_model(), "gemini-1.5-flash");
        assert_eq!(profile.temperature, 0.6);
        assert_eq!(profile.max_tokens, 2000);

        profile.model_name = " gemini-1.5-pro ".into();
        assert_eq!(profile.effective_model(), "gemini-1.5-pro");
    }

    #[test]
    fn store_persists_config() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("nested").join("config.json");

        let mut store = ConfigStore::open(config_path.clone()).unwrap();
        store.config_mut().upsert_llm_profile(
            "openai",
            LlmConfig {
                api_key: "sk-123".into(),
                ..LlmConfig::for_provider(Provider::OpenAi)
            },
        );
        store.touch_llm_profile("openai");
        store.save().unwrap();

        let store = ConfigStore::open(config_path).unwrap();
        assert_eq!(store.last_llm_profile(), Some("openai"));
        assert!(store.config().llm_profiles["openai"].has_api_key());
    }

    #[test]
    fn ensure_recent_defaults_backfills_missing_profiles() {
        let mut store = ConfigStore::open(PathBuf::from("/nonexistent/config.json")).unwrap();
        store
            .config_mut()
            .upsert_llm_profile("gemini", LlmConfig::for_provider(Provider::Gemini));
        store.ensure_recent_defaults();
        assert_eq!(store.last_llm_profile(), Some("gemini"));
    }

    #[test]
    fn finds_profile_by_provider() {
        let mut config = Config::new();
        config.upsert_llm_profile("b-openai", LlmConfig::for_provider(Provider::OpenAi));
        config.upsert_llm_profile("a-groq", LlmConfig::for_provider(Provider::Groq));
        let (name, _) = config.profile_for_provider(Provider::OpenAi).unwrap();
        assert_eq!(name, "b-openai");
        assert!(config.profile_for_provider(Provider::Gemini).is_none());
    }
}
