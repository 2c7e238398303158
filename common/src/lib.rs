/*!
common/src/lib.rs

Shared configuration types for the gaming news bot.

This file provides:
- Config data structures (deserialized from TOML, every field optional)
- An async loader that merges a default file with an override file
- `Settings`: the validated configuration after the environment overlay
  (credentials, destination channel, daily post time)
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "sonar-pro";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_POST_HOUR: u32 = 9;
pub const DEFAULT_POST_MINUTE: u32 = 0;

pub const ENV_API_KEY: &str = "PERPLEXITY_API_KEY";
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";
pub const ENV_CHANNEL_ID: &str = "NEWS_CHANNEL_ID";
pub const ENV_POST_HOUR: &str = "NEWS_POST_HOUR";
pub const ENV_POST_MINUTE: &str = "NEWS_POST_MINUTE";
pub const ENV_COMMAND_TOKEN: &str = "NEWSBOT_COMMAND_TOKEN";

/// Startup configuration failures. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not found in environment variables")]
    MissingCredential(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Daily post time section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Hour of day (UTC, 0-23)
    pub hour: Option<u32>,
    /// Minute of hour (0-59)
    pub minute: Option<u32>,
}

/// Completion provider (chat completions endpoint) section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Discord REST section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub api_base: Option<String>,
    pub token_env: Option<String>,
    /// Channel that receives the daily report
    pub channel_id: Option<String>,
}

/// HTTP command surface section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub command_token_env: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    /// With neither present the result is `Config::default()`.
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (label, path) in [("default", default_path), ("override", override_path)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub api_url: String,
    pub api_key: Secret,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub api_base: String,
    pub token: Secret,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    pub command_token: Option<Secret>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub completion: CompletionSettings,
    pub discord: DiscordSettings,
    pub schedule: ScheduleSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Resolve the file configuration against the process environment.
    pub fn from_env(config: &Config) -> std::result::Result<Self, ConfigError> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve the file configuration against an arbitrary variable lookup.
    ///
    /// Environment values win over file values. Both credentials are required;
    /// a missing channel id is only warned about.
    pub fn resolve<F>(config: &Config, env: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key_env = config.completion.api_key_env.as_deref().unwrap_or(ENV_API_KEY);
        let api_key = lookup(api_key_env)
            .ok_or_else(|| ConfigError::MissingCredential(api_key_env.to_string()))?;

        let token_env = config.discord.token_env.as_deref().unwrap_or(ENV_DISCORD_TOKEN);
        let token = lookup(token_env)
            .ok_or_else(|| ConfigError::MissingCredential(token_env.to_string()))?;

        let api_url = config
            .completion
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string());
        validate_url("completion.api_url", &api_url)?;

        let api_base = config
            .discord
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_string());
        validate_url("discord.api_base", &api_base)?;

        let timeout_secs = config
            .completion
            .timeout_seconds
            .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(invalid("completion.timeout_seconds", "must be greater than zero"));
        }

        let channel_id = match lookup(ENV_CHANNEL_ID).or_else(|| config.discord.channel_id.clone()) {
            Some(id) if id == "0" => None,
            Some(id) if id.chars().all(|c| c.is_ascii_digit()) => Some(id),
            Some(id) => return Err(invalid(ENV_CHANNEL_ID, &format!("'{}' is not a channel id", id))),
            None => None,
        };
        if channel_id.is_none() {
            warn!("{} not set - bot may not post news", ENV_CHANNEL_ID);
        }

        let hour = time_component(&lookup, ENV_POST_HOUR, config.scheduler.hour, DEFAULT_POST_HOUR, 23)?;
        let minute = time_component(
            &lookup,
            ENV_POST_MINUTE,
            config.scheduler.minute,
            DEFAULT_POST_MINUTE,
            59,
        )?;

        let command_token_env = config
            .server
            .command_token_env
            .as_deref()
            .unwrap_or(ENV_COMMAND_TOKEN);

        Ok(Settings {
            completion: CompletionSettings {
                api_url,
                api_key: Secret::new(api_key),
                model: config
                    .completion
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            discord: DiscordSettings {
                api_base,
                token: Secret::new(token),
                channel_id,
            },
            schedule: ScheduleSettings { hour, minute },
            server: ServerSettings {
                bind: config.server.bind.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
                port: config.server.port.unwrap_or(8000),
                command_token: lookup(command_token_env).map(Secret::new),
            },
        })
    }
}

fn time_component<F>(
    lookup: &F,
    key: &str,
    from_file: Option<u32>,
    default: u32,
    max: u32,
) -> std::result::Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(key) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| invalid(key, &format!("'{}' is not a number", raw)))?,
        None => from_file.unwrap_or(default),
    };
    if value > max {
        return Err(invalid(key, &format!("{} is outside 0-{}", value, max)));
    }
    Ok(value)
}

fn validate_url(key: &str, value: &str) -> std::result::Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| invalid(key, &e.to_string()))
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![(ENV_API_KEY, "pplx-key"), (ENV_DISCORD_TOKEN, "bot-token")]
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_set() {
        let settings = Settings::resolve(&Config::default(), env_of(&credentials())).expect("resolve");

        assert_eq!(settings.schedule, ScheduleSettings { hour: 9, minute: 0 });
        assert_eq!(settings.completion.api_url, DEFAULT_COMPLETION_URL);
        assert_eq!(settings.completion.model, "sonar-pro");
        assert_eq!(settings.completion.timeout, Duration::from_secs(60));
        assert_eq!(settings.completion.api_key.expose(), "pplx-key");
        assert!(settings.discord.channel_id.is_none());
        assert!(settings.server.command_token.is_none());
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = Settings::resolve(&Config::default(), env_of(&[(ENV_DISCORD_TOKEN, "t")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref k) if k == ENV_API_KEY));
    }

    #[test]
    fn missing_platform_token_is_fatal() {
        let err = Settings::resolve(&Config::default(), env_of(&[(ENV_API_KEY, "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref k) if k == ENV_DISCORD_TOKEN));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let err = Settings::resolve(
            &Config::default(),
            env_of(&[(ENV_API_KEY, "  "), (ENV_DISCORD_TOKEN, "t")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = Config::default();
        config.scheduler.hour = Some(6);
        config.scheduler.minute = Some(15);
        config.discord.channel_id = Some("111".to_string());

        let mut vars = credentials();
        vars.push((ENV_POST_HOUR, "18"));
        vars.push((ENV_CHANNEL_ID, "222"));

        let settings = Settings::resolve(&config, env_of(&vars)).expect("resolve");
        assert_eq!(settings.schedule.hour, 18);
        assert_eq!(settings.schedule.minute, 15);
        assert_eq!(settings.discord.channel_id.as_deref(), Some("222"));
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let mut vars = credentials();
        vars.push((ENV_POST_HOUR, "24"));
        let err = Settings::resolve(&Config::default(), env_of(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_POST_HOUR));
    }

    #[test]
    fn non_numeric_minute_is_rejected() {
        let mut vars = credentials();
        vars.push((ENV_POST_MINUTE, "half"));
        let err = Settings::resolve(&Config::default(), env_of(&vars)).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn zero_channel_id_means_unset() {
        let mut vars = credentials();
        vars.push((ENV_CHANNEL_ID, "0"));
        let settings = Settings::resolve(&Config::default(), env_of(&vars)).expect("resolve");
        assert!(settings.discord.channel_id.is_none());
    }

    #[test]
    fn custom_credential_variable_names_are_honoured() {
        let mut config = Config::default();
        config.completion.api_key_env = Some("MY_KEY".to_string());
        let err = Settings::resolve(&config, env_of(&credentials())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref k) if k == "MY_KEY"));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = Settings::resolve(&Config::default(), env_of(&credentials())).expect("resolve");
        let dump = format!("{:?}", settings);
        assert!(!dump.contains("pplx-key"));
        assert!(!dump.contains("bot-token"));
    }

    #[tokio::test]
    async fn override_file_wins_over_default_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        tokio::fs::write(
            &default_path,
            r#"
                [scheduler]
                hour = 7
                minute = 30

                [completion]
                model = "sonar"
            "#,
        )
        .await
        .expect("write default");
        tokio::fs::write(
            &override_path,
            r#"
                [scheduler]
                hour = 20
            "#,
        )
        .await
        .expect("write override");

        let cfg = Config::load_with_defaults(Some(default_path.as_path()), Some(override_path.as_path()))
            .await
            .expect("load");
        assert_eq!(cfg.scheduler.hour, Some(20));
        assert_eq!(cfg.scheduler.minute, Some(30));
        assert_eq!(cfg.completion.model.as_deref(), Some("sonar"));
    }

    #[tokio::test]
    async fn no_files_yields_empty_config() {
        let cfg = Config::load_with_defaults(None, None).await.expect("load");
        assert!(cfg.scheduler.hour.is_none());
        assert!(cfg.discord.channel_id.is_none());
    }
}
