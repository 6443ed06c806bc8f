//! probe.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(windows)]
const DEFAULT_LOG_DIR: &str = r"C:\ProgramData\dcprobe\logs";
#[cfg(not(windows))]
const DEFAULT_LOG_DIR: &str = "/var/log/dcprobe";

const DEFAULT_DOMAIN: &str = "corp.example.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Directory holding the per-host CSV logs.
    pub log_dir: PathBuf,
    /// Fully-qualified domain name to probe.
    pub domain: String,
    pub ping_enabled: bool,
    pub ldap_port: u16,
    /// Overrides the detected `MACHINE\user` identity.
    pub host_identity: Option<String>,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra check runs in a retry burst.
    pub count: u32,
    /// Bind latency above which a burst fires.
    pub threshold_ms: u64,
    pub delay_secs: u64,
    /// Also fire a burst when the initial bind produced no latency.
    pub on_bind_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub discovery_secs: u64,
    pub ping_ms: u64,
    pub bind_secs: u64,
    pub channel_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            domain: DEFAULT_DOMAIN.to_string(),
            ping_enabled: true,
            ldap_port: 389,
            host_identity: None,
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            count: 10,
            threshold_ms: 1000,
            delay_secs: 10,
            on_bind_failure: false,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            discovery_secs: 15,
            ping_ms: 1000,
            bind_secs: 30,
            channel_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl TimeoutConfig {
    pub fn discovery(&self) -> Duration {
        Duration::from_secs(self.discovery_secs)
    }

    pub fn ping(&self) -> Duration {
        Duration::from_millis(self.ping_ms)
    }

    pub fn bind(&self) -> Duration {
        Duration::from_secs(self.bind_secs)
    }

    pub fn channel(&self) -> Duration {
        Duration::from_secs(self.channel_secs)
    }
}

impl ProbeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProbeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings no check run can work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.domain.trim().is_empty() {
            anyhow::bail!("domain must not be empty");
        }
        if self.timeouts.ping_ms == 0 {
            anyhow::bail!("timeouts.ping_ms must be greater than zero");
        }
        if self.ldap_port == 0 {
            anyhow::bail!("ldap_port must not be zero");
        }
        Ok(())
    }
}
