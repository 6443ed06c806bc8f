//! Check run — one ordered pass over every probe primitive.
//!
//! A run never stops early. Each step only degrades the fields it owns,
//! plus those of a step that needs its output (no address means no ping).
//! Failures become `None`/sentinel fields and one note each; the notes
//! are joined into the record's error summary once at the end.

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Local;
use dcprobe_core::config::TimeoutConfig;
use dcprobe_core::{
    BindStatus, ChannelStatus, CheckRecord, HostIdentity, PingOutcome, ProbeConfig, ProbeError,
    summarize_errors,
};
use dcprobe_store::ResultStore;
use tracing::{error, info, warn};

use crate::backend::DirectoryBackend;
use crate::probe;

/// Inputs that stay fixed across every run of an invocation.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub domain: String,
    pub host: HostIdentity,
    pub ping_enabled: bool,
    pub timeouts: TimeoutConfig,
}

impl CheckSettings {
    pub fn from_config(config: &ProbeConfig, host: HostIdentity) -> Self {
        Self {
            domain: config.domain.clone(),
            host,
            ping_enabled: config.ping_enabled,
            timeouts: config.timeouts.clone(),
        }
    }
}

/// What one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 1 for the initial run, 2.. for retries.
    pub sequence: u32,
    pub record: CheckRecord,
    /// Bind latency in milliseconds, `None` when the bind did not succeed.
    pub latency_signal: Option<u64>,
    /// Whether the record reached the result store.
    pub persisted: bool,
}

/// Executes check runs against one backend and one result store.
pub struct Checker {
    backend: Arc<dyn DirectoryBackend>,
    store: ResultStore,
    settings: CheckSettings,
}

impl Checker {
    pub fn new(
        backend: Arc<dyn DirectoryBackend>,
        store: ResultStore,
        settings: CheckSettings,
    ) -> Self {
        Self {
            backend,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run every primitive once, persist the record, and return the report.
    pub async fn run(&self, sequence: u32) -> RunReport {
        let record = self.collect(sequence).await;
        let latency_signal = record.directory_bind_latency_ms;

        let persisted = match self.store.append(&record) {
            Ok(()) => {
                info!(sequence, path = ?self.store.path(), "check record written");
                true
            }
            Err(e) => {
                error!(sequence, error = %e, "check record could not be written");
                false
            }
        };

        RunReport {
            sequence,
            record,
            latency_signal,
            persisted,
        }
    }

    /// Run the primitives in order and build the record.
    async fn collect(&self, sequence: u32) -> CheckRecord {
        let backend = self.backend.as_ref();
        let settings = &self.settings;
        let timeouts = &settings.timeouts;
        let domain = settings.domain.as_str();
        let timestamp = Local::now();
        let mut notes: Vec<String> = Vec::new();

        info!(sequence, %domain, host = %settings.host, "check run started");

        // Step 1: assigned controller and its address.
        let assigned_controller =
            match probe::discover_controller(backend, domain, timeouts.discovery()).await {
                Ok(found) => {
                    info!(controller = %found.value, "assigned controller");
                    Some(found.value)
                }
                Err(e) => {
                    note(&mut notes, "assigned controller", &e);
                    None
                }
            };

        let controller_address: Option<Ipv4Addr> = match &assigned_controller {
            Some(controller) => {
                match probe::resolve_address(backend, controller, timeouts.discovery()).await {
                    Ok(resolved) => {
                        info!(address = %resolved.value, "controller address");
                        Some(resolved.value)
                    }
                    Err(e) => {
                        note(&mut notes, "controller address", &e);
                        None
                    }
                }
            }
            None => None,
        };

        // Step 2: reachability.
        let ping_latency_ms = if !settings.ping_enabled {
            info!("ping disabled");
            PingOutcome::Disabled
        } else if controller_address.is_none() {
            info!("ping skipped, no controller address");
            PingOutcome::Skipped
        } else {
            match probe::ping(backend, controller_address, timeouts.ping()).await {
                Ok(reply) => {
                    info!(latency_ms = reply.value, "ping reply");
                    PingOutcome::Replied {
                        latency_ms: reply.value,
                    }
                }
                Err(e) => {
                    note(&mut notes, "ping", &e);
                    PingOutcome::Failed
                }
            }
        };

        // Step 3: the controller actually in use, and a bind against it.
        let directory_dc_used = match probe::discover_actual_controller(
            backend,
            domain,
            &settings.host.machine,
            timeouts.discovery(),
        )
        .await
        {
            Ok(found) => {
                info!(controller = %found.value, "controller in use");
                Some(found.value)
            }
            Err(e) => {
                note(&mut notes, "controller in use", &e);
                None
            }
        };

        let (directory_bind_status, directory_bind_latency_ms) = match &directory_dc_used {
            Some(controller) => {
                match probe::bind_directory(backend, controller, timeouts.bind()).await {
                    Ok(bound) => {
                        info!(latency_ms = bound.value, "directory bind succeeded");
                        (BindStatus::Success, Some(bound.value))
                    }
                    Err(e) => {
                        note(&mut notes, "directory bind", &e);
                        (BindStatus::Failed, None)
                    }
                }
            }
            None => {
                let e = ProbeError::Bind("no controller determined".to_string());
                note(&mut notes, "directory bind", &e);
                (BindStatus::Failed, None)
            }
        };

        // Step 4: secure channel, regardless of everything above.
        let secure_channel_status =
            match probe::check_secure_channel(backend, domain, timeouts.channel()).await {
                Ok(checked) if checked.value => {
                    info!("secure channel healthy");
                    ChannelStatus::Healthy
                }
                Ok(_) => {
                    warn!("secure channel broken");
                    ChannelStatus::Broken
                }
                Err(e) => {
                    note(&mut notes, "secure channel", &e);
                    ChannelStatus::Error
                }
            };

        // Step 5.
        let error_summary = summarize_errors(&notes);

        CheckRecord {
            timestamp,
            host_identity: settings.host.to_string(),
            assigned_controller,
            controller_address,
            ping_latency_ms,
            directory_dc_used,
            directory_bind_latency_ms,
            directory_bind_status,
            secure_channel_status,
            error_summary,
        }
    }
}

/// Report a recovered failure now and keep it for the error summary.
fn note(notes: &mut Vec<String>, step: &str, err: &ProbeError) {
    warn!(step, kind = err.kind(), error = %err, "probe step failed");
    notes.push(format!("{step}: {err}"));
}
