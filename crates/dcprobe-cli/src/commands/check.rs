use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use dcprobe_core::{CheckRecord, HostIdentity, ProbeConfig, NOT_AVAILABLE, UNRESOLVED};
use dcprobe_health::{
    CheckSettings, Checker, RetryController, RetryPolicy, RunReport, SystemDirectory,
};
use dcprobe_store::{ResultStore, ensure_log_dir};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct ReportLine<'a> {
    sequence: u32,
    #[serde(flatten)]
    record: &'a CheckRecord,
}

/// Run the initial check and any retry burst, then exit.
///
/// Only a log directory that cannot be created is an error; every probe
/// failure ends up in the records instead.
pub async fn check(config: ProbeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let host = config
        .host_identity
        .as_deref()
        .map(HostIdentity::parse)
        .unwrap_or_else(HostIdentity::detect);

    ensure_log_dir(&config.log_dir).context("cannot start without a log directory")?;
    let store = ResultStore::new(&config.log_dir, &host);

    info!(
        domain = %config.domain,
        host = %host,
        log = ?store.path(),
        ping = config.ping_enabled,
        "dcprobe check starting"
    );

    let backend = Arc::new(SystemDirectory::new(config.ldap_port));
    let checker = Checker::new(backend, store, CheckSettings::from_config(&config, host));
    let controller = RetryController::new(RetryPolicy::from(&config.retry));

    let summary = controller
        .run(&checker, |report| print_report(report, format))
        .await;

    info!(
        runs = summary.runs,
        persisted = summary.persisted,
        bind_failures = summary.bind_failures,
        retried = summary.retry_triggered,
        trigger_latency_ms = ?summary.trigger_latency_ms,
        "dcprobe check complete"
    );
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let line = ReportLine {
                sequence: report.sequence,
                record: &report.record,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "run report could not be serialized"),
            }
        }
        OutputFormat::Text => println!("{}", format_text(report)),
    }
}

fn format_text(report: &RunReport) -> String {
    let r = &report.record;
    let mut line = format!(
        "[{}] {} dc={} addr={} ping={} used={} bind={} ({}) channel={}",
        report.sequence,
        r.timestamp.format(CheckRecord::TIMESTAMP_FORMAT),
        r.assigned_controller.as_deref().unwrap_or(UNRESOLVED),
        r.controller_address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNRESOLVED.to_string()),
        r.ping_latency_ms,
        r.directory_dc_used.as_deref().unwrap_or(NOT_AVAILABLE),
        r.directory_bind_status,
        r.directory_bind_latency_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        r.secure_channel_status,
    );
    if !r.error_summary.is_empty() {
        line.push_str(" errors=");
        line.push_str(&r.error_summary);
    }
    line
}
