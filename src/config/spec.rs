//! Configuration types for broker access files.
//!
//! This module defines the structure of `broker-access.yaml`.

use serde::{Deserialize, Serialize};

use crate::access::{AccessDeclaration, AccessEntry};
use crate::platform::BrokerRegistration;

/// Root configuration structure for a broker access file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessConfig {
    /// Cloud Controller connection settings.
    pub platform: PlatformConfig,

    /// Broker whose catalog is reconciled.
    pub broker: BrokerRef,

    /// Desired access entries.
    #[serde(default)]
    pub service_access: Vec<AccessEntry>,
}

/// Cloud Controller connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformConfig {
    /// API endpoint, e.g. `https://api.sys.example.com`.
    pub api: String,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub skip_ssl_validation: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Reference to a registered broker, by name or GUID.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerRef {
    /// Broker name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Broker GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Broker endpoint. When set, the broker is registered before access is reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Basic auth username for the broker endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

const fn default_timeout_secs() -> u64 {
    crate::platform::DEFAULT_TIMEOUT_SECS
}

impl AccessConfig {
    /// Returns the desired access as declarations, in file order.
    #[must_use]
    pub fn declarations(&self) -> Vec<AccessDeclaration> {
        self.service_access
            .iter()
            .cloned()
            .map(AccessDeclaration::from)
            .collect()
    }
}

impl BrokerRef {
    /// Returns the name if set, otherwise the GUID.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.id.as_deref().filter(|i| !i.is_empty()))
    }

    /// Builds the registration for this broker, if a name and URL are set.
    #[must_use]
    pub fn registration(&self, password: &str) -> Option<BrokerRegistration> {
        let name = self.name.as_deref().filter(|n| !n.is_empty())?;
        let url = self.url.as_deref().filter(|u| !u.is_empty())?;
        Some(BrokerRegistration {
            name: name.to_string(),
            url: url.to_string(),
            username: self.username.clone().unwrap_or_default(),
            password: password.to_string(),
        })
    }
}
