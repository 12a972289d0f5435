use crate::core::error::LainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_model() -> String {
    "assistant".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> Option<u32> {
    Some(2048)
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    120
}

/// Where and how to reach the chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated between two reads of a streamed reply
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Sent ahead of every `ask` and `chat` request when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Per-invocation settings that win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
}

impl Overrides {
    /// Reads `LAIN_BASE_URL`, `LAIN_MODEL` and `LAIN_API_KEY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            base_url: non_empty("LAIN_BASE_URL"),
            model: non_empty("LAIN_MODEL"),
            api_key: non_empty("LAIN_API_KEY"),
            temperature: None,
        }
    }

    /// Layers `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: Overrides) -> Self {
        Self {
            base_url: other.base_url.or(self.base_url),
            model: other.model.or(self.model),
            api_key: other.api_key.or(self.api_key),
            temperature: other.temperature.or(self.temperature),
        }
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lain")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn history_dir() -> PathBuf {
        Self::config_dir().join("history")
    }

    /// Loads the config at `path`, writing a default file there first if
    /// none exists.
    pub fn load_or_init(path: &Path) -> Result<Config, LainError> {
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Config::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config to {}: {}", path.display(), e);
        } else {
            tracing::info!("Wrote default config to {}", path.display());
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Config, LainError> {
        let contents = fs::read_to_string(path)?;
        serde_yml::from_str::<Config>(&contents)
            .map_err(|e| LainError::Config(format!("Parse {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), LainError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(base_url) = overrides.base_url {
            self.endpoint.base_url = base_url;
        }
        if let Some(model) = overrides.model {
            self.endpoint.model = model;
        }
        if let Some(api_key) = overrides.api_key {
            self.endpoint.api_key = Some(api_key);
        }
        if let Some(temperature) = overrides.temperature {
            self.endpoint.temperature = temperature;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: Config = serde_yml::from_str("endpoint:\n  model: qwen\n").unwrap();

        assert_eq!(config.endpoint.model, "qwen");
        assert_eq!(config.endpoint.base_url, "http://localhost:1234/v1");
        assert_eq!(config.endpoint.max_tokens, Some(2048));
        assert_eq!(config.system_prompt, None);
    }

    #[test]
    fn test_load_or_init_writes_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::load_or_init(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "endpoint: [unclosed").unwrap();

        assert!(matches!(Config::load_from(&path), Err(LainError::Config(_))));
    }

    #[test]
    fn test_cli_overrides_win_over_environment() {
        let env = Overrides::from_lookup(|key| match key {
            "LAIN_MODEL" => Some("from-env".to_string()),
            "LAIN_API_KEY" => Some("secret".to_string()),
            "LAIN_BASE_URL" => Some("  ".to_string()),
            _ => None,
        });
        let cli = Overrides {
            model: Some("from-cli".to_string()),
            temperature: Some(0.1),
            ..Overrides::default()
        };
        let mut config = Config::default();

        config.apply(env.merge(cli));

        assert_eq!(config.endpoint.model, "from-cli");
        assert_eq!(config.endpoint.api_key.as_deref(), Some("secret"));
        assert_eq!(config.endpoint.base_url, "http://localhost:1234/v1");
        assert_eq!(config.endpoint.temperature, 0.1);
    }
}
