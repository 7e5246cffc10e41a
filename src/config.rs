//! Device configuration
//!
//! Loaded once at startup from TOML. Credentials may be given inline or
//! through environment variables; inline values win.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum SSID length in bytes (802.11)
pub const MAX_SSID_LEN: usize = 32;
/// Maximum WPA passphrase length in bytes
pub const MAX_PASSPHRASE_LEN: usize = 64;

/// Main device configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub link: LinkSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub startup: StartupSection,
    #[serde(default)]
    pub health: HealthSection,
}

/// Wireless station section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    /// Network name to associate with
    pub ssid: String,
    /// Inline passphrase
    pub passphrase: Option<Secret>,
    /// Environment variable containing the passphrase
    pub passphrase_env: Option<String>,
    /// Where the link layer keeps its credentials
    #[serde(default)]
    pub storage: StoragePolicy,
}

/// Credential storage policy handed to the link layer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoragePolicy {
    /// Volatile, nothing written to flash
    #[default]
    Ram,
    /// Persisted by the link layer
    Flash,
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Inline username
    pub username: Option<String>,
    /// Inline password
    pub password: Option<Secret>,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Client identifier prefix, a random suffix is appended per session
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Topic subscribed to once the session is connected
    #[serde(default = "default_subscribe_topic")]
    pub subscribe_topic: String,
}

fn default_client_id() -> String {
    "smarthome".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_subscribe_topic() -> String {
    "/esp8266/set".to_string()
}

/// Startup section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StartupSection {
    /// Upper bound on waiting for an address; absent means wait forever
    pub link_timeout_secs: Option<u64>,
}

impl StartupSection {
    pub fn link_timeout(&self) -> Option<Duration> {
        self.link_timeout_secs.map(Duration::from_secs)
    }
}

/// Status HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthSection {
    /// Port for the status server; absent disables it
    pub port: Option<u16>,
}

/// Credential that never shows up in logs or `config --show`
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
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

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

/// Broker address extracted from `broker_url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid SSID: {0}")]
    InvalidSsid(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceConfig {
    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DeviceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the static limits the link and session layers rely on
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ssid(&self.link.ssid)?;

        if let Some(passphrase) = &self.link.passphrase {
            validate_passphrase(passphrase.expose())?;
        }

        self.mqtt.endpoint()?;

        if self.mqtt.subscribe_topic.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.subscribe_topic must not be empty".to_string(),
            ));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.client_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Station passphrase; `None` joins an open network
    pub fn link_passphrase(&self) -> Result<Option<Secret>, ConfigError> {
        if let Some(passphrase) = &self.link.passphrase {
            return Ok(Some(passphrase.clone()));
        }
        match &self.link.passphrase_env {
            Some(name) => {
                let value = Self::get_env_var_required(name)?;
                validate_passphrase(&value)?;
                Ok(Some(Secret::new(value)))
            }
            None => Ok(None),
        }
    }

    /// MQTT username, inline or from the environment
    pub fn mqtt_username(&self) -> Option<String> {
        self.mqtt
            .username
            .clone()
            .or_else(|| Self::get_env_var_optional(self.mqtt.username_env.as_ref()))
    }

    /// MQTT password, inline or from the environment
    pub fn mqtt_password(&self) -> Option<Secret> {
        self.mqtt.password.clone().or_else(|| {
            Self::get_env_var_optional(self.mqtt.password_env.as_ref()).map(Secret::new)
        })
    }
}

impl MqttSection {
    /// Parse `broker_url` into host, port and TLS flag
    pub fn endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        let url = Url::parse(&self.broker_url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.broker_url.clone()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            _ => return Err(ConfigError::InvalidBrokerUrl(self.broker_url.clone())),
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(self.broker_url.clone()))?;
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

fn validate_ssid(ssid: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::InvalidSsid(format!(
            "SSID '{ssid}' must be 1..={MAX_SSID_LEN} bytes"
        )));
    }
    Ok(())
}

fn validate_passphrase(passphrase: &str) -> Result<(), ConfigError> {
    if passphrase.len() > MAX_PASSPHRASE_LEN {
        return Err(ConfigError::InvalidConfig(format!(
            "link passphrase exceeds {MAX_PASSPHRASE_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[link]
ssid = "Panda"
passphrase = "18188954638"
storage = "flash"

[mqtt]
broker_url = "mqtt://111.230.206.15:1883"
username = "panda"
password = "panda"
client_id = "kitchen"
keep_alive_secs = 30
subscribe_topic = "/esp8266/set"

[startup]
link_timeout_secs = 45

[health]
port = 8080
"#;

    #[test]
    fn test_full_config() {
        let config = DeviceConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.link.ssid, "Panda");
        assert_eq!(config.link.storage, StoragePolicy::Flash);
        assert_eq!(config.mqtt.client_id, "kitchen");
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.startup.link_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.health.port, Some(8080));
        assert_eq!(config.mqtt_username().as_deref(), Some("panda"));
        assert_eq!(
            config.mqtt_password().map(|p| p.expose().to_string()),
            Some("panda".to_string())
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let toml_content = r#"
[link]
ssid = "Panda"

[mqtt]
broker_url = "mqtt://localhost"
"#;
        let config = DeviceConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.link.storage, StoragePolicy::Ram);
        assert_eq!(config.mqtt.subscribe_topic, "/esp8266/set");
        assert_eq!(config.mqtt.client_id, "smarthome");
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.startup.link_timeout(), None);
        assert_eq!(config.health.port, None);
        assert!(config.link_passphrase().unwrap().is_none());
    }

    #[test]
    fn test_endpoint_defaults_ports() {
        let mut mqtt = DeviceConfig::from_toml_str(FULL).unwrap().mqtt;
        assert_eq!(
            mqtt.endpoint().unwrap(),
            BrokerEndpoint {
                host: "111.230.206.15".to_string(),
                port: 1883,
                tls: false
            }
        );

        mqtt.broker_url = "mqtts://broker.example.com".to_string();
        let endpoint = mqtt.endpoint().unwrap();
        assert_eq!(endpoint.port, 8883);
        assert!(endpoint.tls);

        mqtt.broker_url = "tcp://10.0.0.2:11883".to_string();
        assert_eq!(mqtt.endpoint().unwrap().port, 11883);
    }

    #[test]
    fn test_invalid_broker_url() {
        let toml_content = r#"
[link]
ssid = "Panda"

[mqtt]
broker_url = "http://localhost:1883"
"#;
        let result = DeviceConfig::from_toml_str(toml_content);
        assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));

        let toml_content = r#"
[link]
ssid = "Panda"

[mqtt]
broker_url = "not a url"
"#;
        let result = DeviceConfig::from_toml_str(toml_content);
        assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_ssid_limits() {
        assert!(validate_ssid("").is_err());
        assert!(validate_ssid(&"x".repeat(33)).is_err());
        assert!(validate_ssid(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_passphrase_limit() {
        assert!(validate_passphrase(&"p".repeat(64)).is_ok());
        assert!(validate_passphrase(&"p".repeat(65)).is_err());
    }

    #[test]
    fn test_passphrase_from_missing_env_var() {
        let toml_content = r#"
[link]
ssid = "Panda"
passphrase_env = "SMARTHOME_LINK_TEST_UNSET_PASSPHRASE"

[mqtt]
broker_url = "mqtt://localhost"
"#;
        let config = DeviceConfig::from_toml_str(toml_content).unwrap();
        let result = config.link_passphrase();
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(_))));
    }

    #[test]
    fn test_empty_subscribe_topic_rejected() {
        let toml_content = r#"
[link]
ssid = "Panda"

[mqtt]
broker_url = "mqtt://localhost"
subscribe_topic = ""
"#;
        let result = DeviceConfig::from_toml_str(toml_content);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_secrets_are_masked() {
        let config = DeviceConfig::from_toml_str(FULL).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("18188954638"));

        let shown = toml::to_string_pretty(&config).unwrap();
        assert!(!shown.contains("18188954638"));
        assert!(shown.contains("***"));
    }
}
