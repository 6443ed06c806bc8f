//! Shared types used across dcprobe crates.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Display token for a controller or address that could not be determined.
pub const UNRESOLVED: &str = "Unresolved";
/// Display token for a value with no meaningful reading.
pub const NOT_AVAILABLE: &str = "N/A";
/// Display token for a status that was never established.
pub const UNKNOWN: &str = "Unknown";

/// Outcome of the ping step of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingOutcome {
    /// Echo reply received.
    Replied { latency_ms: u64 },
    /// Echo attempted but no reply.
    Failed,
    /// Ping enabled but not attempted because no address was resolved.
    Skipped,
    /// Ping disabled by configuration; never attempted.
    Disabled,
}

impl fmt::Display for PingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingOutcome::Replied { latency_ms } => write!(f, "{latency_ms}"),
            PingOutcome::Failed => f.write_str("Failed"),
            PingOutcome::Skipped => f.write_str(NOT_AVAILABLE),
            PingOutcome::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Result of the directory bind step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindStatus {
    Success,
    Failed,
    Unknown,
}

impl fmt::Display for BindStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindStatus::Success => "Success",
            BindStatus::Failed => "Failed",
            BindStatus::Unknown => UNKNOWN,
        })
    }
}

/// Result of the secure channel verification step.
///
/// `Broken` is a clean answer from the verifier; `Error` means the
/// verification call itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Healthy,
    Broken,
    Error,
    Unknown,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelStatus::Healthy => "Healthy",
            ChannelStatus::Broken => "Broken",
            ChannelStatus::Error => "Error",
            ChannelStatus::Unknown => UNKNOWN,
        })
    }
}

/// The persisted evidence of one check run.
///
/// Absent values stay `None` here; they are turned into display tokens
/// only by [`CheckRecord::to_row`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    pub timestamp: DateTime<Local>,
    pub host_identity: String,
    pub assigned_controller: Option<String>,
    pub controller_address: Option<Ipv4Addr>,
    pub ping_latency_ms: PingOutcome,
    pub directory_dc_used: Option<String>,
    pub directory_bind_latency_ms: Option<u64>,
    pub directory_bind_status: BindStatus,
    pub secure_channel_status: ChannelStatus,
    pub error_summary: String,
}

impl CheckRecord {
    /// Column names, in row order.
    pub const FIELDS: [&'static str; 10] = [
        "timestamp",
        "host_identity",
        "assigned_controller",
        "controller_address",
        "ping_latency_ms",
        "directory_dc_used",
        "directory_bind_latency_ms",
        "directory_bind_status",
        "secure_channel_status",
        "error_summary",
    ];

    /// Format used for the `timestamp` column.
    pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Render every field as text, absent values as their sentinel token.
    pub fn to_row(&self) -> [String; 10] {
        [
            self.timestamp.format(Self::TIMESTAMP_FORMAT).to_string(),
            self.host_identity.clone(),
            self.assigned_controller
                .clone()
                .unwrap_or_else(|| UNRESOLVED.to_string()),
            self.controller_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNRESOLVED.to_string()),
            self.ping_latency_ms.to_string(),
            self.directory_dc_used
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            self.directory_bind_latency_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            self.directory_bind_status.to_string(),
            self.secure_channel_status.to_string(),
            self.error_summary.clone(),
        ]
    }
}

/// Join error notes into a single-line summary.
///
/// Notes keep their order; embedded line breaks become single spaces.
pub fn summarize_errors(notes: &[String]) -> String {
    let joined = notes
        .iter()
        .map(|note| note.trim())
        .filter(|note| !note.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    joined
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}
