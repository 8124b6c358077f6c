//! Device configuration
//!
//! Everything the orchestrator needs is supplied at construction time from a
//! TOML file and stays immutable afterwards: broker address, trust anchor,
//! device credential inputs, the declared subscription set, the optional
//! announce message and the periodic publish settings.

use crate::credential::{Credential, CredentialError, HardwareId};
use crate::protocol::{
    topic_matches, validate_client_id, validate_topic_filter, validate_topic_name,
    OutboundMessage, Qos, Subscription, TopicError,
};
use crate::trust::{TrustError, TrustStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub link: LinkSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    pub announce: Option<AnnounceSection>,
    pub periodic: PeriodicSection,
    pub echo: Option<EchoSection>,
}

/// Device identity inputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Prefix of the derived session identifier
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// Hardware address `AA:BB:CC:DD:EE:FF`; falls back to the machine id file
    pub hardware_address: Option<String>,
    #[serde(default = "default_machine_id_path")]
    pub machine_id_path: PathBuf,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            client_id_prefix: default_client_id_prefix(),
            hardware_address: None,
            machine_id_path: default_machine_id_path(),
        }
    }
}

fn default_client_id_prefix() -> String {
    "ESP32S3_".to_string()
}

fn default_machine_id_path() -> PathBuf {
    PathBuf::from("/etc/machine-id")
}

/// Link driver settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    /// How often an established link is re-checked (seconds)
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// Delay before the driver reports a failed association (milliseconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_probe_interval() -> u64 {
    5
}

fn default_retry_delay() -> u64 {
    1000
}

/// Broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL, `mqtt://` or `mqtts://`
    pub url: String,
    /// Path to the CA bundle used to verify the broker
    pub ca_cert_path: Option<PathBuf>,
    /// Inline CA bundle, takes precedence over `ca_cert_path`
    pub ca_cert_pem: Option<String>,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Retained "offline" last-will is registered on this topic when set
    pub status_topic: Option<String>,
}

fn default_keep_alive() -> u64 {
    60
}

/// Message published right after every successful connect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnounceSection {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default)]
    pub retain: bool,
}

impl AnnounceSection {
    pub fn to_message(&self) -> OutboundMessage {
        OutboundMessage {
            topic: self.topic.clone(),
            payload: self.payload.clone().into_bytes(),
            qos: self.qos,
            retain: self.retain,
        }
    }
}

/// Periodic publish settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodicSection {
    pub topic: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default)]
    pub payload: PayloadKind,
}

fn default_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// `Message #N from <client id>`
    #[default]
    Counter,
    /// Simulated temperature reading as JSON
    Temperature,
}

/// Echo received commands back to a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EchoSection {
    pub topic: String,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(#[from] CredentialError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceConfig {
    /// Load configuration from TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DeviceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_id(&self.device.client_id_prefix)?;
        if let Some(mac) = &self.device.hardware_address {
            HardwareId::parse_mac(mac)?;
        }

        let url = self.broker_url()?;
        if url.scheme() == "mqtts" && !self.has_trust_anchor() {
            return Err(ConfigError::InvalidConfig(
                "mqtts:// broker requires ca_cert_path or ca_cert_pem".to_string(),
            ));
        }
        if self.broker.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.keep_alive_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(status_topic) = &self.broker.status_topic {
            validate_topic_name(status_topic)?;
        }

        for subscription in &self.subscriptions {
            validate_topic_filter(&subscription.topic)?;
        }
        if let Some(announce) = &self.announce {
            validate_topic_name(&announce.topic)?;
        }
        if let Some(echo) = &self.echo {
            validate_topic_name(&echo.topic)?;
            // A reply delivered back to the handler would be echoed forever
            if let Some(looping) = self
                .subscriptions
                .iter()
                .find(|s| topic_matches(&s.topic, &echo.topic))
            {
                return Err(ConfigError::InvalidConfig(format!(
                    "echo.topic '{}' is matched by subscription '{}'",
                    echo.topic, looping.topic
                )));
            }
        }
        if self.link.probe_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "link.probe_interval_secs must be greater than 0".to_string(),
            ));
        }

        validate_topic_name(&self.periodic.topic)?;
        if self.periodic.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "periodic.interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed broker URL; only `mqtt` and `mqtts` schemes are accepted
    pub fn broker_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.broker.url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.broker.url.clone()))?;
        match url.scheme() {
            "mqtt" | "mqtts" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::InvalidBrokerUrl(self.broker.url.clone())),
        }
    }

    pub fn has_trust_anchor(&self) -> bool {
        self.broker.ca_cert_pem.is_some() || self.broker.ca_cert_path.is_some()
    }

    /// Resolve the hardware identifier used for the session identifier
    pub fn hardware_id(&self) -> Result<HardwareId, ConfigError> {
        let id = match &self.device.hardware_address {
            Some(mac) => HardwareId::parse_mac(mac)?,
            None => HardwareId::from_machine_id_file(&self.device.machine_id_path)?,
        };
        Ok(id)
    }

    /// Session identity: derived client id plus optional login from the environment
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        let hardware_id = self.hardware_id()?;
        let credential = Credential::derive(&self.device.client_id_prefix, &hardware_id);
        Ok(match self.broker_username() {
            Some(username) => credential.with_login(username, self.broker_password()),
            None => credential,
        })
    }

    /// Trust anchors for the broker; inline PEM wins over the file path
    pub fn trust_store(&self) -> Result<Option<TrustStore>, TrustError> {
        if let Some(pem) = &self.broker.ca_cert_pem {
            return TrustStore::from_pem(pem.as_bytes()).map(Some);
        }
        self.broker
            .ca_cert_path
            .as_deref()
            .map(TrustStore::load)
            .transpose()
    }

    /// Get broker username from environment variable
    pub fn broker_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.broker.username_env.as_ref())
    }

    /// Get broker password from environment variable
    pub fn broker_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.broker.password_env.as_ref())
    }

    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.broker.keep_alive_secs)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_secs(self.periodic.interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.link.probe_interval_secs)
    }

    pub fn link_retry_delay(&self) -> Duration {
        Duration::from_millis(self.link.retry_delay_ms)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
hardware_address = "24:6F:28:AA:BB:CC"

[broker]
url = "mqtt://localhost:1883"

[[subscriptions]]
topic = "deme25/8/esp32s3/commands"
qos = 1

[announce]
topic = "deme25/8/esp32s3/sensor/temperature"
payload = "ESP32-S3 Connected!"

[periodic]
topic = "deme25/8/esp32s3/sensor/temperature"
payload = "temperature"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}
