//! Identity of the machine and user running the probe.

use std::fmt;

/// `MACHINE\user` pair recorded in every check record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub machine: String,
    pub user: Option<String>,
}

impl HostIdentity {
    pub fn new(machine: impl Into<String>, user: Option<String>) -> Self {
        Self {
            machine: machine.into(),
            user,
        }
    }

    /// Detect the local machine and user names from the environment.
    pub fn detect() -> Self {
        let machine = env_non_empty("COMPUTERNAME")
            .or_else(|| env_non_empty("HOSTNAME"))
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string());
        let user = env_non_empty("USERNAME").or_else(|| env_non_empty("USER"));
        Self::new(machine, user)
    }

    /// Parse an override given as `MACHINE\user` or bare `MACHINE`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('\\') {
            Some((machine, user)) if !user.is_empty() => {
                Self::new(machine.trim(), Some(user.trim().to_string()))
            }
            Some((machine, _)) => Self::new(machine.trim(), None),
            None => Self::new(s.trim(), None),
        }
    }

    /// Machine name reduced to characters safe in a file name.
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .machine
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if stem.is_empty() {
            "localhost".to_string()
        } else {
            stem
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}\\{}", self.machine, user),
            None => f.write_str(&self.machine),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
