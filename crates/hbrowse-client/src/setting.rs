//! Connection settings and cluster configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BrowseError, BrowseResult};

/// Property key for the coordination service client port.
pub const CLIENT_PORT_KEY: &str = "hbase.zookeeper.property.clientPort";
/// Property key for the coordination quorum.
pub const QUORUM_KEY: &str = "hbase.zookeeper.quorum";
/// Property key for the master address.
pub const MASTER_KEY: &str = "hbase.master";

/// Default coordination client port.
pub const DEFAULT_CLIENT_PORT: &str = "2181";

/// Named settings identifying one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSetting {
    /// Unique name of the setting.
    pub name: String,
    /// Master address, `host:port`.
    #[serde(default)]
    pub master_address: String,
    /// Coordination quorum hosts.
    #[serde(default)]
    pub quorum_hosts: Vec<String>,
    /// Coordination client port.
    #[serde(default = "default_client_port")]
    pub client_port: String,
}

fn default_client_port() -> String {
    DEFAULT_CLIENT_PORT.to_string()
}

impl ConnectionSetting {
    /// Creates a setting with the given name and the default client port.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            master_address: String::new(),
            quorum_hosts: Vec::new(),
            client_port: default_client_port(),
        }
    }

    /// Sets the master address.
    pub fn master(mut self, address: impl Into<String>) -> Self {
        self.master_address = address.into();
        self
    }

    /// Adds a quorum host.
    pub fn quorum_host(mut self, host: impl Into<String>) -> Self {
        self.quorum_hosts.push(host.into());
        self
    }

    /// Sets the quorum hosts from a comma separated list.
    pub fn quorum(mut self, hosts: &str) -> Self {
        self.quorum_hosts = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Sets the client port.
    pub fn client_port(mut self, port: impl Into<String>) -> Self {
        self.client_port = port.into();
        self
    }

    /// Validates the setting.
    pub fn validate(&self) -> BrowseResult<()> {
        let invalid = |reason: String| BrowseError::InvalidSetting {
            setting: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.quorum_hosts.is_empty() {
            return Err(invalid("no quorum hosts".to_string()));
        }
        match self.client_port.parse::<u16>() {
            Ok(port) if port > 0 => Ok(()),
            _ => Err(invalid(format!("invalid client port '{}'", self.client_port))),
        }
    }

    /// Builds the cluster configuration for this setting.
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig::new()
            .set(CLIENT_PORT_KEY, &self.client_port)
            .set(QUORUM_KEY, self.quorum_hosts.join(","))
            .set(MASTER_KEY, &self.master_address)
    }
}

impl fmt::Display for ConnectionSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (master={}, quorum={}, port={})",
            self.name,
            if self.master_address.is_empty() {
                "-"
            } else {
                self.master_address.as_str()
            },
            self.quorum_hosts.join(","),
            self.client_port
        )
    }
}

/// Ordered client properties handed to a store driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    properties: Vec<(String, String)>,
}

impl ClusterConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, replacing any previous value.
    pub fn set(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        let key = key.into();
        let value = value.as_ref().to_string();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    /// Gets a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the quorum hosts.
    pub fn quorum_hosts(&self) -> Vec<&str> {
        self.get(QUORUM_KEY)
            .map(|q| q.split(',').filter(|h| !h.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Returns the coordination address list, `host:port,...`.
    pub fn connection_string(&self) -> String {
        let port = self.get(CLIENT_PORT_KEY).unwrap_or(DEFAULT_CLIENT_PORT);
        self.quorum_hosts()
            .iter()
            .map(|h| format!("{h}:{port}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
