use crate::adapters::channel::{CommandChannel, DryRunChannel, WebhookChannel};
use crate::core::dispatcher::ChannelFailurePolicy;
use crate::core::engine::EngineSettings;
use crate::core::sampler::SamplingPolicy;
use crate::domain::ports::NotificationChannel;
use crate::utils::error::{Result, RouletteError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CHANNEL_TYPES: [&str; 3] = ["dry_run", "command", "webhook"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouletteConfig {
    #[serde(default)]
    pub roulette: RoundConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundConfig {
    pub seed: Option<u64>,
    pub match_column_prefix: Option<String>,
    pub sampling: Option<SamplingPolicy>,
    pub lookback: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    pub round: Option<String>,
    pub announcement: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub r#type: Option<String>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub on_channel_failure: Option<ChannelFailurePolicy>,
}

impl RouletteConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RouletteError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RouletteError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RELAY_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RouletteError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(prefix) = &self.roulette.match_column_prefix {
            validation::validate_non_empty_string("roulette.match_column_prefix", prefix)?;
        }
        if let Some(lookback) = self.roulette.lookback {
            validation::validate_at_least("roulette.lookback", lookback, 1)?;
        }
        if let Some(path) = &self.templates.round {
            validation::validate_path("templates.round", path)?;
        }
        if let Some(path) = &self.templates.announcement {
            validation::validate_path("templates.announcement", path)?;
        }

        if let Some(kind) = &self.channel.r#type {
            validation::validate_one_of("channel.type", kind, &CHANNEL_TYPES)?;
            match kind.as_str() {
                "command" => {
                    let program = validation::validate_required_field("channel.program", &self.channel.program)?;
                    validation::validate_non_empty_string("channel.program", program)?;
                }
                "webhook" => {
                    let endpoint = validation::validate_required_field("channel.endpoint", &self.channel.endpoint)?;
                    validation::validate_url("channel.endpoint", endpoint)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Copies the file's settings over the defaults in `settings`.
    pub fn apply_to(&self, settings: &mut EngineSettings) {
        if let Some(seed) = self.roulette.seed {
            settings.seed = seed;
        }
        if let Some(prefix) = &self.roulette.match_column_prefix {
            settings.match_column_prefix = prefix.clone();
        }
        if let Some(sampling) = self.roulette.sampling {
            settings.sampling = sampling;
        }
        if self.roulette.lookback.is_some() {
            settings.lookback = self.roulette.lookback;
        }
        if let Some(policy) = self.dispatch.on_channel_failure {
            settings.on_channel_failure = policy;
        }
    }

    /// Builds the configured channel. Refuses to guess when none is set, so a
    /// forgotten `[channel]` section never silently skips delivery.
    pub fn build_channel(&self) -> Result<Box<dyn NotificationChannel>> {
        let kind = validation::validate_required_field("channel.type", &self.channel.r#type)?;
        match kind.as_str() {
            "dry_run" => Ok(Box::new(DryRunChannel::new())),
            "command" => {
                let program = validation::validate_required_field("channel.program", &self.channel.program)?;
                Ok(Box::new(CommandChannel::new(
                    program.clone(),
                    self.channel.args.clone().unwrap_or_default(),
                )))
            }
            "webhook" => {
                let endpoint = validation::validate_required_field("channel.endpoint", &self.channel.endpoint)?;
                let timeout = Duration::from_secs(self.channel.timeout_seconds.unwrap_or(30));
                Ok(Box::new(WebhookChannel::new(endpoint.clone(), timeout)?))
            }
            other => Err(RouletteError::InvalidConfigValueError {
                field: "channel.type".to_string(),
                value: other.to_string(),
                reason: format!("Valid values: {}", CHANNEL_TYPES.join(", ")),
            }),
        }
    }
}

impl Validate for RouletteConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
