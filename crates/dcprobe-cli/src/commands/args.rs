use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use dcprobe_core::ProbeConfig;

/// Options shared by every command that needs a probe configuration.
///
/// Precedence: built-in defaults, then `--config`, then these flags.
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// TOML file with probe settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory for the per-host CSV logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
    /// Fully-qualified domain name to probe
    #[arg(short, long)]
    pub domain: Option<String>,
    /// Skip the ICMP reachability check
    #[arg(long)]
    pub no_ping: bool,
    /// Extra runs in a retry burst
    #[arg(long)]
    pub retry_count: Option<u32>,
    /// Bind latency (ms) above which a retry burst starts
    #[arg(long)]
    pub retry_threshold_ms: Option<u64>,
    /// Seconds to wait before each retry run
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,
    /// Also start a retry burst when the initial bind fails
    #[arg(long)]
    pub retry_on_bind_failure: bool,
    /// Record this identity (MACHINE\user) instead of the detected one
    #[arg(long)]
    pub host_identity: Option<String>,
}

impl ProbeArgs {
    /// Build the effective configuration.
    pub fn resolve(&self) -> anyhow::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ProbeConfig::default(),
        };

        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if self.no_ping {
            config.ping_enabled = false;
        }
        if let Some(count) = self.retry_count {
            config.retry.count = count;
        }
        if let Some(threshold) = self.retry_threshold_ms {
            config.retry.threshold_ms = threshold;
        }
        if let Some(delay) = self.retry_delay_secs {
            config.retry.delay_secs = delay;
        }
        if self.retry_on_bind_failure {
            config.retry.on_bind_failure = true;
        }
        if let Some(identity) = &self.host_identity {
            config.host_identity = Some(identity.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_yield_defaults() {
        let config = ProbeArgs::default().resolve().unwrap();
        assert_eq!(config, ProbeConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.toml");
        std::fs::write(
            &path,
            "domain = \"file.test\"\n[retry]\ncount = 5\nthreshold_ms = 200\n",
        )
        .unwrap();

        let args = ProbeArgs {
            config: Some(path),
            retry_count: Some(3),
            no_ping: true,
            ..ProbeArgs::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.domain, "file.test");
        assert_eq!(config.retry.count, 3);
        assert_eq!(config.retry.threshold_ms, 200);
        assert!(!config.ping_enabled);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = ProbeArgs {
            config: Some(PathBuf::from("/nonexistent/probe.toml")),
            ..ProbeArgs::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn empty_domain_is_rejected() {
        let args = ProbeArgs {
            domain: Some(String::new()),
            ..ProbeArgs::default()
        };
        assert!(args.resolve().is_err());
    }
}
