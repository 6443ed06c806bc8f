//! End-to-end check scenarios.
//!
//! Drives the retry controller, check run, and result store together
//! against a scripted directory backend and a temporary log directory.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dcprobe_core::{BindStatus, ChannelStatus, CheckRecord, HostIdentity, ProbeConfig};
use dcprobe_health::{
    BackendFuture, CheckSettings, Checker, DirectoryBackend, RetryController, RetryPolicy,
};
use dcprobe_store::ResultStore;
use tokio::time::Instant;

struct ScriptedDomain {
    assigned: Option<&'static str>,
    address: Ipv4Addr,
    echo_ms: u64,
    in_use: Option<&'static str>,
    bind_latency: Duration,
    binds: AtomicUsize,
}

impl ScriptedDomain {
    fn scenario_a() -> Self {
        Self {
            assigned: Some("DC01"),
            address: Ipv4Addr::new(10, 0, 0, 5),
            echo_ms: 12,
            in_use: Some("DC01"),
            bind_latency: Duration::from_millis(45),
            binds: AtomicUsize::new(0),
        }
    }
}

impl DirectoryBackend for ScriptedDomain {
    fn locate_controller<'a>(&'a self, _domain: &'a str) -> BackendFuture<'a, Option<String>> {
        let answer = match self.assigned {
            Some(dc) => Ok(Some(dc.to_string())),
            None => Err(
                "The specified domain either does not exist or could not be contacted".to_string(),
            ),
        };
        Box::pin(async move { answer })
    }

    fn resolve_host<'a>(&'a self, _hostname: &'a str) -> BackendFuture<'a, Vec<IpAddr>> {
        let address = IpAddr::V4(self.address);
        Box::pin(async move { Ok(vec![address]) })
    }

    fn echo<'a>(&'a self, _address: Ipv4Addr, _timeout: Duration) -> BackendFuture<'a, Duration> {
        let rtt = Duration::from_millis(self.echo_ms);
        Box::pin(async move { Ok(rtt) })
    }

    fn controller_in_use<'a>(
        &'a self,
        _domain: &'a str,
        _host: &'a str,
    ) -> BackendFuture<'a, Option<String>> {
        let answer = self.in_use.map(str::to_string);
        Box::pin(async move { Ok(answer) })
    }

    fn bind<'a>(&'a self, _controller: &'a str) -> BackendFuture<'a, ()> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        let latency = self.bind_latency;
        Box::pin(async move {
            tokio::time::sleep(latency).await;
            Ok(())
        })
    }

    fn verify_secure_channel<'a>(&'a self, _domain: &'a str) -> BackendFuture<'a, bool> {
        Box::pin(async { Ok(true) })
    }
}

fn host() -> HostIdentity {
    HostIdentity::new("WS01", Some("alice".to_string()))
}

fn checker(domain: Arc<ScriptedDomain>, log_dir: &Path) -> Checker {
    let config = ProbeConfig {
        log_dir: log_dir.to_path_buf(),
        domain: "corp.example.com".to_string(),
        ..ProbeConfig::default()
    };
    let settings = CheckSettings::from_config(&config, host());
    Checker::new(domain, ResultStore::new(log_dir, &host()), settings)
}

fn policy(threshold_ms: u64, count: u32, delay_secs: u64) -> RetryPolicy {
    RetryPolicy {
        threshold_ms,
        count,
        delay: Duration::from_secs(delay_secs),
        on_bind_failure: false,
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_a_healthy_domain_writes_one_full_row() {
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(Arc::new(ScriptedDomain::scenario_a()), dir.path());
    let mut records: Vec<CheckRecord> = Vec::new();

    let summary = RetryController::new(policy(1000, 10, 10))
        .run(&checker, |report| records.push(report.record.clone()))
        .await;

    assert_eq!(summary.runs, 1);
    let rows = checker.store().read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[1], "WS01\\alice");
    assert_eq!(row[2], "DC01");
    assert_eq!(row[3], "10.0.0.5");
    assert_eq!(row[4], "12");
    assert_eq!(row[5], "DC01");
    assert_eq!(row[6], "45");
    assert_eq!(row[7], "Success");
    assert_eq!(row[8], "Healthy");
    assert_eq!(row[9], "");
    assert_eq!(records[0].error_summary, "");
}

#[tokio::test(start_paused = true)]
async fn scenario_b_failed_discovery_degrades_without_abort() {
    let dir = tempfile::tempdir().unwrap();
    let domain = Arc::new(ScriptedDomain {
        assigned: None,
        ..ScriptedDomain::scenario_a()
    });
    let checker = checker(domain.clone(), dir.path());

    let summary = RetryController::new(policy(1000, 10, 10))
        .run(&checker, |report| {
            assert_eq!(report.record.directory_bind_status, BindStatus::Success);
            assert_eq!(report.record.secure_channel_status, ChannelStatus::Healthy);
        })
        .await;

    assert_eq!(summary.runs, 1);
    assert_eq!(domain.binds.load(Ordering::SeqCst), 1);
    let rows = checker.store().read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), CheckRecord::FIELDS.len());
    assert_eq!(rows[0][2], "Unresolved");
    assert_eq!(rows[0][3], "Unresolved");
    assert_eq!(rows[0][4], "N/A");
    assert!(rows[0][9].contains("could not be contacted"));
}

#[tokio::test(start_paused = true)]
async fn scenario_c_slow_bind_triggers_spaced_retries() {
    let dir = tempfile::tempdir().unwrap();
    let domain = Arc::new(ScriptedDomain {
        bind_latency: Duration::from_millis(1500),
        ..ScriptedDomain::scenario_a()
    });
    let checker = checker(domain, dir.path());
    let mut finished_at: Vec<Instant> = Vec::new();

    let start = Instant::now();
    let summary = RetryController::new(policy(1000, 3, 2))
        .run(&checker, |_| finished_at.push(Instant::now()))
        .await;

    assert!(start.elapsed() >= Duration::from_secs(6));
    assert_eq!(summary.runs, 4);
    assert_eq!(checker.store().read_rows().unwrap().len(), 4);
    for pair in finished_at.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(2));
    }
}

#[tokio::test(start_paused = true)]
async fn no_controller_in_use_never_binds() {
    let dir = tempfile::tempdir().unwrap();
    let domain = Arc::new(ScriptedDomain {
        in_use: None,
        ..ScriptedDomain::scenario_a()
    });
    let checker = checker(domain.clone(), dir.path());

    RetryController::new(policy(1000, 3, 2))
        .run(&checker, |_| {})
        .await;

    assert_eq!(domain.binds.load(Ordering::SeqCst), 0);
    let rows = checker.store().read_rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][7], "Failed");
}

#[tokio::test(start_paused = true)]
async fn second_invocation_appends_under_one_header() {
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..2 {
        let checker = checker(Arc::new(ScriptedDomain::scenario_a()), dir.path());
        RetryController::new(policy(1000, 3, 2))
            .run(&checker, |_| {})
            .await;
    }

    let store = ResultStore::new(dir.path(), &host());
    let content = std::fs::read_to_string(store.path()).unwrap();
    let headers = content
        .lines()
        .filter(|line| *line == CheckRecord::FIELDS.join(","))
        .count();
    assert_eq!(headers, 1);
    assert_eq!(store.read_rows().unwrap().len(), 2);
}
