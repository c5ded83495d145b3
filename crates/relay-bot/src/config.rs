use config::{Config as ConfigLoader, ConfigError, Environment, File};
use relay_core::{RelaySettings, RenderSettings, UserId};
use relay_llm::{ModelCapabilities, ProviderConfig, ProviderType};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub limits: LimitsConfig,
    pub render: RenderConfig,
    pub prompt: PromptConfig,
    pub logging: LoggingConfig,
    pub bot: BotConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub llm_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderType,
    pub model: String,
    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_images: usize,
    pub max_messages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_embed_max_length")]
    pub embed_max_length: usize,
    #[serde(default = "default_edits_per_second")]
    pub edits_per_second: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub custom_system_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub self_id: u64,
    #[serde(default = "default_user_id")]
    pub user_id: u64,
}

fn default_max_completion_tokens() -> u32 {
    2048
}

fn default_embed_max_length() -> usize {
    RenderSettings::default().max_length
}

fn default_edits_per_second() -> f64 {
    RenderSettings::default().edits_per_second
}

fn default_user_id() -> u64 {
    2
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables `RELAY_<SECTION>__<KEY>`, e.g. `RELAY_LLM__MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Local servers accept any key, so the secret stays optional
        cfg.llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_default();

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let provider = ProviderConfig::new(self.llm.provider, self.llm_api_key.clone());
        match &self.llm.base_url {
            Some(url) => provider.with_base_url(url.clone()),
            None => provider,
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::detect(self.llm.provider, &self.llm.model)
    }
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            capabilities: config.capabilities(),
            max_completion_tokens: config.llm.max_completion_tokens,
            max_images: config.limits.max_images,
            max_messages: config.limits.max_messages,
            system_prompt: config.prompt.custom_system_prompt.clone(),
            render: RenderSettings {
                max_length: config.render.embed_max_length,
                edits_per_second: config.render.edits_per_second,
            },
            self_id: UserId(config.bot.self_id),
        }
    }
}
