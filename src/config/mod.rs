//! Configuration module

use std::time::Duration;

use serde::Deserialize;

use crate::error::BridgeError;
use crate::models::TagManagers;

/// Poll interval used when `queryFrequency` is not configured
pub const DEFAULT_QUERY_FREQUENCY_MS: u64 = 60_000;
/// Poll intervals below this are rejected
pub const MIN_QUERY_FREQUENCY_MS: u64 = 5_000;
/// Replacement for an interval below the floor
pub const FALLBACK_QUERY_FREQUENCY_MS: u64 = 20_000;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub token: String,
    #[serde(
        default,
        alias = "queryFrequency",
        alias = "queryfrequency"
    )]
    pub query_frequency: Option<u64>,
    /// Filled from the file text by [`ConfigFormat::tag_managers`]
    #[serde(skip)]
    pub tag_managers: TagManagers,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_tag_list_path")]
    pub tag_list_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tag_list_path: default_tag_list_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.mytaglist.com".to_string()
}

fn default_tag_list_path() -> String {
    "/ethClient.asmx/GetTagList".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8581
}

/// Files checked by [`Config::load`], first hit wins
const CONFIG_FILES: [(&str, ConfigFormat); 2] = [
    ("config/default.toml", ConfigFormat::Toml),
    ("config/default.json", ConfigFormat::Json),
];

/// Format of the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// `tagManagers` is read straight from the file text. The `config` crate
/// lowercases keys, and the keys of this map are manager names.
#[derive(Debug, Default, Deserialize)]
struct TagManagerSection {
    #[serde(default, rename = "tagManagers", alias = "tag_managers")]
    tag_managers: TagManagers,
}

impl ConfigFormat {
    fn file_format(self) -> config::FileFormat {
        match self {
            ConfigFormat::Toml => config::FileFormat::Toml,
            ConfigFormat::Json => config::FileFormat::Json,
        }
    }

    fn tag_managers(self, text: &str) -> Result<TagManagers, BridgeError> {
        let section: TagManagerSection = match self {
            ConfigFormat::Toml => toml::from_str(text)
                .map_err(|e| BridgeError::ConfigError(format!("tagManagers: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(text)
                .map_err(|e| BridgeError::ConfigError(format!("tagManagers: {}", e)))?,
        };
        Ok(section.tag_managers)
    }
}

/// `TAGBRIDGE_TOKEN`, `TAGBRIDGE_SERVER__PORT`, ...
fn environment() -> config::Environment {
    config::Environment::with_prefix("TAGBRIDGE")
        .prefix_separator("_")
        .separator("__")
}

impl Config {
    pub fn load() -> Result<Self, BridgeError> {
        let mut file = None;
        for (path, format) in CONFIG_FILES {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    tracing::info!("[Config] Loading {}", path);
                    file = Some((text, format));
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(BridgeError::ConfigError(format!("{}: {}", path, e)));
                }
            }
        }

        Self::build(
            file.as_ref().map(|(text, format)| (text.as_str(), *format)),
            environment(),
        )
    }

    /// Build from an optional file document layered under `env`
    pub fn build(
        file: Option<(&str, ConfigFormat)>,
        env: config::Environment,
    ) -> Result<Self, BridgeError> {
        let mut builder = config::Config::builder();
        if let Some((text, format)) = file {
            builder = builder.add_source(config::File::from_str(text, format.file_format()));
        }
        let settings = builder.add_source(env).build()?;

        let mut config: Config = settings.try_deserialize()?;
        if let Some((text, format)) = file {
            config.tag_managers = format.tag_managers(text)?;
        }

        if config.token.trim().is_empty() {
            return Err(BridgeError::MissingToken);
        }

        url::Url::parse(&config.api.base_url).map_err(|e| {
            BridgeError::ConfigError(format!("invalid api.base_url {}: {}", config.api.base_url, e))
        })?;

        Ok(config)
    }

    /// Effective poll interval after defaulting and floor clamping
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(effective_query_frequency(self.query_frequency))
    }

    /// One-line description safe to log (token redacted)
    pub fn describe(&self) -> String {
        let managers: Vec<String> = self
            .tag_managers
            .iter()
            .map(|m| format!("{}={}", m.name, m.mac))
            .collect();

        format!(
            "token=<redacted> queryFrequency={:?} tagManagers({})=[{}] api={}{} server={}:{} (enabled={})",
            self.query_frequency,
            self.tag_managers.len(),
            managers.join(", "),
            self.api.base_url,
            self.api.tag_list_path,
            self.server.host,
            self.server.port,
            self.server.enabled
        )
    }
}

/// Resolve the configured poll interval in milliseconds
pub fn effective_query_frequency(requested: Option<u64>) -> u64 {
    match requested {
        None => DEFAULT_QUERY_FREQUENCY_MS,
        Some(ms) if ms < MIN_QUERY_FREQUENCY_MS => {
            tracing::warn!(
                "Invalid query frequency {}ms (minimum {}ms); setting to {}ms default",
                ms,
                MIN_QUERY_FREQUENCY_MS,
                FALLBACK_QUERY_FREQUENCY_MS
            );
            FALLBACK_QUERY_FREQUENCY_MS
        }
        Some(ms) => ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Environment source that sees only `vars`, never the process env
    fn env_with(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn from_json(json: &str) -> Result<Config, BridgeError> {
        Config::build(Some((json, ConfigFormat::Json)), env_with(&[]))
    }

    #[test]
    fn test_interval_below_floor_uses_fallback() {
        assert_eq!(effective_query_frequency(Some(1000)), FALLBACK_QUERY_FREQUENCY_MS);
        assert_eq!(effective_query_frequency(Some(0)), FALLBACK_QUERY_FREQUENCY_MS);
        assert_eq!(effective_query_frequency(Some(4999)), FALLBACK_QUERY_FREQUENCY_MS);
    }

    #[test]
    fn test_interval_at_or_above_floor_is_verbatim() {
        assert_eq!(effective_query_frequency(Some(5000)), 5000);
        assert_eq!(effective_query_frequency(Some(30_000)), 30_000);
    }

    #[test]
    fn test_interval_absent_uses_default() {
        assert_eq!(effective_query_frequency(None), DEFAULT_QUERY_FREQUENCY_MS);
    }

    #[test]
    fn test_kitchen_scenario() {
        let config = from_json(
            r#"{"token": "T", "queryFrequency": 1000, "tagManagers": {"kitchen": "AA:BB"}}"#,
        )
        .unwrap();

        assert_eq!(config.token, "T");
        assert_eq!(
            config.poll_interval(),
            Duration::from_millis(FALLBACK_QUERY_FREQUENCY_MS)
        );
        assert_eq!(config.tag_managers.len(), 1);
        let manager = config.tag_managers.iter().next().unwrap();
        assert_eq!(manager.name, "kitchen");
        assert_eq!(manager.mac, "AA:BB");
    }

    #[test]
    fn test_manager_names_keep_case_and_order_json() {
        let config = from_json(
            r#"{"token": "T", "tagManagers": {"Kitchen": "AA:BB", "Garage": "CC:DD", "kitchen": "EE:FF"}}"#,
        )
        .unwrap();

        let names: Vec<&str> = config.tag_managers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Kitchen", "Garage", "kitchen"]);
    }

    #[test]
    fn test_manager_names_keep_case_and_order_toml() {
        let toml = r#"
token = "T"
queryFrequency = 30000

[tagManagers]
Kitchen = "AA:BB"
Garage = "CC:DD"

[server]
port = 9100
"#;
        let config = Config::build(Some((toml, ConfigFormat::Toml)), env_with(&[])).unwrap();

        let names: Vec<&str> = config.tag_managers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Kitchen", "Garage"]);
        assert_eq!(config.query_frequency, Some(30_000));
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_duplicate_manager_name_rejected() {
        let err = from_json(r#"{"token": "T", "tagManagers": {"Kitchen": "AA:BB", "Kitchen": "CC:DD"}}"#)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_token_and_port_from_environment() {
        let config = Config::build(
            None,
            env_with(&[("TAGBRIDGE_TOKEN", "X"), ("TAGBRIDGE_SERVER__PORT", "9000")]),
        )
        .unwrap();

        assert_eq!(config.token, "X");
        assert_eq!(config.server.port, 9000);
        assert!(config.tag_managers.is_empty());
    }

    #[test]
    fn test_environment_overrides_file() {
        let config = Config::build(
            Some((
                r#"{"token": "from-file", "tagManagers": {"Kitchen": "AA:BB"}}"#,
                ConfigFormat::Json,
            )),
            env_with(&[("TAGBRIDGE_TOKEN", "from-env")]),
        )
        .unwrap();

        assert_eq!(config.token, "from-env");
        assert_eq!(config.tag_managers.iter().next().unwrap().name, "Kitchen");
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = from_json(r#"{"tagManagers": {"kitchen": "AA:BB"}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::MissingToken));

        let err = from_json(r#"{"token": "  "}"#).unwrap_err();
        assert!(matches!(err, BridgeError::MissingToken));

        let err = Config::build(None, env_with(&[("TAGBRIDGE__TOKEN", "X")])).unwrap_err();
        assert!(matches!(err, BridgeError::MissingToken));
    }

    #[test]
    fn test_defaults() {
        let config = from_json(r#"{"token": "T"}"#).unwrap();

        assert!(config.tag_managers.is_empty());
        assert_eq!(
            config.poll_interval(),
            Duration::from_millis(DEFAULT_QUERY_FREQUENCY_MS)
        );
        assert_eq!(config.api.base_url, "https://www.mytaglist.com");
        assert_eq!(config.api.tag_list_path, "/ethClient.asmx/GetTagList");
        assert_eq!(config.api.timeout_secs, 10);
        assert!(config.server.enabled);
        assert_eq!(config.server.port, 8581);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = from_json(r#"{"token": "T", "api": {"base_url": "not a url"}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_describe_redacts_token() {
        let config = from_json(
            r#"{"token": "secret-token", "tagManagers": {"kitchen": "AA:BB"}}"#,
        )
        .unwrap();

        let described = config.describe();
        assert!(!described.contains("secret-token"));
        assert!(described.contains("tagManagers(1)=[kitchen=AA:BB]"));
    }
}
