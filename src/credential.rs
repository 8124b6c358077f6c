//! Device credential derivation
//!
//! The session identifier must be unique per device so two devices never
//! kick each other off the broker. It is derived from a stable hardware
//! identifier: the configured prefix plus the last three bytes of the
//! hardware address in upper-case hex (`ESP32S3_AABBCC`).

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Stable hardware identifier (MAC address or machine id bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareId(Vec<u8>);

impl HardwareId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CredentialError> {
        let bytes = bytes.into();
        if bytes.len() < 3 {
            return Err(CredentialError::HardwareIdTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Parse `AA:BB:CC:DD:EE:FF` (also accepts `-` separators)
    pub fn parse_mac(mac: &str) -> Result<Self, CredentialError> {
        let bytes = mac
            .split([':', '-'])
            .map(|octet| {
                if octet.len() != 2 {
                    return Err(CredentialError::InvalidMac(mac.to_string()));
                }
                u8::from_str_radix(octet, 16)
                    .map_err(|_| CredentialError::InvalidMac(mac.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        if bytes.len() != 6 {
            return Err(CredentialError::InvalidMac(mac.to_string()));
        }
        Self::new(bytes)
    }

    /// Read a hex machine id (e.g. `/etc/machine-id`)
    pub fn from_machine_id_file(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            CredentialError::MachineIdRead {
                path: path.display().to_string(),
                source,
            }
        })?;
        let hex = content.trim();
        if !hex.is_ascii() || hex.len() % 2 != 0 {
            return Err(CredentialError::InvalidMachineId(hex.to_string()));
        }

        let bytes = hex
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                    .ok_or_else(|| CredentialError::InvalidMachineId(hex.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn suffix(&self) -> String {
        self.0[self.0.len() - 3..]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect()
    }
}

/// Session identity; immutable once the session has started
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    client_id: String,
    username: Option<String>,
    password: Option<String>,
}

impl Credential {
    pub fn derive(prefix: &str, hardware_id: &HardwareId) -> Self {
        Self {
            client_id: format!("{prefix}{}", hardware_id.suffix()),
            username: None,
            password: None,
        }
    }

    /// Fixed identifier, used when the caller already owns a unique id
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_login(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

// Keep secrets out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),
    #[error("Hardware identifier must have at least 3 bytes, got {0}")]
    HardwareIdTooShort(usize),
    #[error("Failed to read machine id {path}: {source}")]
    MachineIdRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Machine id is not valid hex: {0}")]
    InvalidMachineId(String),
}
