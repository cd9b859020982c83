use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::MAX_LIST_RESULTS;
use crate::error::{AutoLabelError, Result};
use crate::models::LabelMapping;
use crate::processor::BatchSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Free-text description of the mailbox owner, given to the model as context
    #[serde(default)]
    pub user_info: String,
    /// Label name -> description, in the order they are offered to the model
    #[serde(default = "default_labels")]
    pub labels: LabelMapping,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            user_info: String::new(),
            labels: default_labels(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any endpoint speaking the OpenAI chat completions protocol
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Ollama => "http://localhost:11434",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,
    /// Falls back to the provider's public endpoint when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: None,
            model: default_model(),
            temperature: 0.0,
            api_key_env: default_api_key_env(),
            max_body_chars: default_max_body_chars(),
        }
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials(),
            token_cache: default_token_cache(),
        }
    }
}

fn default_max_results() -> u32 {
    10
}

fn default_labels() -> LabelMapping {
    let mut labels = LabelMapping::new();
    labels.insert(
        "Work".to_string(),
        "Messages from colleagues, clients or about ongoing projects".to_string(),
    );
    labels.insert(
        "Finance".to_string(),
        "Bank statements, invoices, receipts and payment notices".to_string(),
    );
    labels.insert(
        "Newsletters".to_string(),
        "Subscriptions, digests and marketing mail".to_string(),
    );
    labels
}

fn default_llm_provider() -> LlmProvider {
    LlmProvider::OpenAi
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "LLM_API_KEY".to_string()
}

fn default_max_body_chars() -> usize {
    8000
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from(".gmail-autolabel/token.json")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::read(path).await
    }

    /// Like `load`, but a missing file is an error instead of defaults
    pub async fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AutoLabelError::Config(format!(
                "Config file not found at {:?}. Run `gmail-autolabel init-config` first.",
                path
            )));
        }
        Self::read(path).await
    }

    async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AutoLabelError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AutoLabelError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AutoLabelError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AutoLabelError::Config(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| AutoLabelError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_batch(
            self.batch.max_results,
            &self.batch.labels,
        )?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AutoLabelError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(AutoLabelError::Config(
                "llm.model cannot be empty".to_string(),
            ));
        }
        if self.llm.max_body_chars == 0 {
            return Err(AutoLabelError::Config(
                "llm.max_body_chars must be greater than 0".to_string(),
            ));
        }
        if self.llm.provider == LlmProvider::OpenAi && self.llm.api_key_env.trim().is_empty() {
            return Err(AutoLabelError::Config(
                "llm.api_key_env is required for the openai provider".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Settings for one batch run
    pub fn batch_settings(&self) -> Result<BatchSettings> {
        let settings = BatchSettings {
            user_info: self.batch.user_info.clone(),
            label_mapping: self.batch.labels.clone(),
            max_results: self.batch.max_results,
            max_body_chars: self.llm.max_body_chars,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.batch.user_info =
            "I am a software engineer; my employer is Example Corp.".to_string();
        config.save(path).await
    }
}

/// Checks shared by the config file and `BatchSettings`
pub(crate) fn validate_batch(max_results: u32, labels: &LabelMapping) -> Result<()> {
    if max_results > MAX_LIST_RESULTS {
        return Err(AutoLabelError::Config(format!(
            "batch.max_results cannot exceed {}",
            MAX_LIST_RESULTS
        )));
    }
    if labels.is_empty() {
        return Err(AutoLabelError::Config(
            "batch.labels must define at least one label".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for name in labels.keys() {
        if name.trim().is_empty() {
            return Err(AutoLabelError::Config(
                "batch.labels cannot contain an empty label name".to_string(),
            ));
        }
        // Gmail label names are case-insensitive
        if !seen.insert(name.to_lowercase()) {
            return Err(AutoLabelError::Config(format!(
                "batch.labels contains '{}' more than once",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.batch.max_results, 10);
        assert!(config.batch.user_info.is_empty());
        assert_eq!(
            config.batch.labels.keys().collect::<Vec<_>>(),
            vec!["Work", "Finance", "Newsletters"]
        );

        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.base_url(), "https://api.openai.com/v1");
        assert_eq!(config.llm.api_key_env, "LLM_API_KEY");
        assert_eq!(config.llm.max_body_chars, 8000);
        assert_eq!(config.llm.temperature, 0.0);

        assert_eq!(config.auth.credentials, PathBuf::from("credentials.json"));
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_results_boundary() {
        let mut config = Config::default();

        config.batch.max_results = 0;
        assert!(config.validate().is_ok());

        config.batch.max_results = 500;
        assert!(config.validate().is_ok());

        config.batch.max_results = 501;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("cannot exceed 500"));
    }

    #[test]
    fn test_config_validation_empty_labels() {
        let mut config = Config::default();
        config.batch.labels.clear();
        let result = config.validate();
        assert!(matches!(result, Err(AutoLabelError::Config(_))));
    }

    #[test]
    fn test_config_validation_blank_label_name() {
        let mut config = Config::default();
        config.batch.labels.insert("  ".to_string(), "blank".to_string());
        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("empty label name"));
    }

    #[test]
    fn test_config_validation_case_insensitive_duplicate() {
        let mut config = Config::default();
        config.batch.labels.insert("work".to_string(), "again".to_string());
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_config_validation_temperature_range() {
        let mut config = Config::default();

        config.llm.temperature = 2.0;
        assert!(config.validate().is_ok());

        config.llm.temperature = 2.5;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("llm.temperature"));

        config.llm.temperature = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_max_body_chars_zero() {
        let mut config = Config::default();
        config.llm.max_body_chars = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("max_body_chars must be greater than 0"));
    }

    #[test]
    fn test_config_validation_openai_requires_key_env() {
        let mut config = Config::default();
        config.llm.api_key_env = String::new();
        assert!(config.validate().is_err());

        config.llm.provider = LlmProvider::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ollama_default_base_url() {
        let mut config = Config::default();
        config.llm.provider = LlmProvider::Ollama;
        assert_eq!(config.llm.base_url(), "http://localhost:11434");

        config.llm.base_url = Some("http://gpu-box:11434".to_string());
        assert_eq!(config.llm.base_url(), "http://gpu-box:11434");
    }

    #[test]
    fn test_batch_settings_keeps_label_order() {
        let mut config = Config::default();
        config.batch.labels.clear();
        config.batch.labels.insert("Zeta".to_string(), "z".to_string());
        config.batch.labels.insert("Alpha".to_string(), "a".to_string());
        config.batch.user_info = "Owner".to_string();
        config.llm.max_body_chars = 1200;

        let settings = config.batch_settings().unwrap();
        assert_eq!(
            settings.label_mapping.keys().collect::<Vec<_>>(),
            vec!["Zeta", "Alpha"]
        );
        assert_eq!(settings.user_info, "Owner");
        assert_eq!(settings.max_results, 10);
        assert_eq!(settings.max_body_chars, 1200);
    }

    #[tokio::test]
    async fn test_load_required_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(Config::load(&path).await.is_ok());
        let result = Config::load_required(&path).await;
        assert!(matches!(result, Err(AutoLabelError::Config(_))));
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.llm.provider = LlmProvider::Ollama;
        config.llm.model = "llama3".to_string();
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.llm.provider, LlmProvider::Ollama);
        assert_eq!(loaded.llm.model, "llama3");
        assert_eq!(loaded.batch.labels, config.batch.labels);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-autolabel-config-12345.toml");

        let config = Config::load(path).await.unwrap();
        assert_eq!(config.batch.max_results, 10);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        tokio::fs::write(path, "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(path).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let partial_config = r#"
[batch]
max_results = 25
user_info = "Freelance photographer"

[batch.labels]
Clients = "Booking requests and client feedback"
Gear = "Camera shop orders and shipping"

[llm]
provider = "ollama"
model = "mistral"
"#;
        tokio::fs::write(path, partial_config).await.unwrap();

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.batch.max_results, 25);
        assert_eq!(
            config.batch.labels.keys().collect::<Vec<_>>(),
            vec!["Clients", "Gear"]
        );
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.max_body_chars, 8000); // default
        assert_eq!(config.auth.token_cache, PathBuf::from(".gmail-autolabel/token.json"));
    }

    #[tokio::test]
    async fn test_config_unknown_provider_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[llm]\nprovider = \"palm\"\n")
            .await
            .unwrap();

        let result = Config::load(temp_file.path()).await;
        assert!(matches!(result, Err(AutoLabelError::Config(_))));
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::create_example(path).await.unwrap();
        assert!(path.exists());

        let config = Config::load(path).await.unwrap();
        assert!(!config.batch.user_info.is_empty());
        assert_eq!(config.batch.labels.len(), 3);
    }
}
