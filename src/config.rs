use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv6Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 123;
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 1;
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 3_600;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("update interval {0}s out of range (1..=3600s)")]
    IntervalOutOfRange(u64),
}

/// Target and timing for one LeoNTP server. Fixed once a client is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    /// Only used by callers that poll; the client itself never schedules.
    pub update_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: String::new(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(host: &str) -> Self {
        ClientConfig {
            host: host.to_string(),
            ..Default::default()
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.host_name().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if !(MIN_UPDATE_INTERVAL_SECS..=MAX_UPDATE_INTERVAL_SECS)
            .contains(&self.update_interval_secs)
        {
            return Err(ConfigError::IntervalOutOfRange(self.update_interval_secs));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Host with surrounding whitespace and IPv6 brackets removed.
    pub fn host_name(&self) -> &str {
        let host = self.host.trim();
        host.strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
    }

    /// `host:port` label used as the device display name.
    pub fn label(&self) -> String {
        let host = self.host_name();
        if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Resolve the target, preferring the first address the resolver returns.
    pub fn resolve(&self) -> std::io::Result<SocketAddr> {
        let host = self.host_name();
        (host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", host),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("10.0.0.5");
        assert_eq!(config.port, 123);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.update_interval(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_eq!(ClientConfig::default().validate(), Err(ConfigError::EmptyHost));

        let mut config = ClientConfig::new("10.0.0.5");
        config.timeout_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        let mut config = ClientConfig::new("10.0.0.5");
        config.update_interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::IntervalOutOfRange(0)));
        config.update_interval_secs = 3_601;
        assert_eq!(config.validate(), Err(ConfigError::IntervalOutOfRange(3_601)));
        config.update_interval_secs = 3_600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_label() {
        assert_eq!(ClientConfig::new("ntp.lan").label(), "ntp.lan:123");
        assert_eq!(ClientConfig::new("::1").label(), "[::1]:123");
    }

    #[test]
    fn test_bracketed_ipv6_host() {
        let config = ClientConfig::new("[::1]");
        assert_eq!(config.host_name(), "::1");
        assert_eq!(config.label(), "[::1]:123");
        assert_eq!(config.resolve().unwrap(), "[::1]:123".parse().unwrap());
    }

    #[test]
    fn test_host_with_colon_is_not_bracketed() {
        assert_eq!(ClientConfig::new("ntp.lan:1234").label(), "ntp.lan:1234:123");
        assert_eq!(ClientConfig::new(" 10.0.0.5 ").label(), "10.0.0.5:123");
        assert_eq!(ClientConfig::new("[]").validate(), Err(ConfigError::EmptyHost));
    }

    #[test]
    fn test_resolve_literal() {
        let mut config = ClientConfig::new("127.0.0.1");
        config.port = 1123;
        assert_eq!(config.resolve().unwrap(), "127.0.0.1:1123".parse().unwrap());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "host": "192.168.1.20", "update_interval_secs": 60 }}"#).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.update_interval_secs, 60);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
