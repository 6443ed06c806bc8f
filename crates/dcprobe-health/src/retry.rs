//! Retry controller — escalates to a flat burst of extra check runs when
//! the initial run's bind latency is too high.
//!
//! ```text
//! Initial ──(signal > threshold)──▶ Retrying(2..=count+1) ──▶ Done
//!    └──────────(otherwise)──────────────────────────────────▲
//! ```
//!
//! Retry runs sleep `delay` first and their own latency is ignored, so a
//! burst never extends itself. Run failures are data here, not control
//! flow: the controller always reaches `Done`.

use std::time::Duration;

use dcprobe_core::config::RetryConfig;
use tracing::{debug, info};

use crate::run::{Checker, RunReport};

/// Configured escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub threshold_ms: u64,
    pub count: u32,
    pub delay: Duration,
    /// Treat a run without a bind latency as a trigger too.
    pub on_bind_failure: bool,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            threshold_ms: config.threshold_ms,
            count: config.count,
            delay: config.delay(),
            on_bind_failure: config.on_bind_failure,
        }
    }
}

impl RetryPolicy {
    /// Whether an initial run's latency signal starts a retry burst.
    pub fn triggers(&self, signal: Option<u64>) -> bool {
        match signal {
            Some(latency_ms) => latency_ms > self.threshold_ms,
            None => self.on_bind_failure,
        }
    }
}

/// Position within a retry burst. Lives only for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySession {
    /// Sequence number of the next run (2 for the first retry).
    pub sequence: u32,
    /// Signal of the initial run that started the burst.
    pub trigger_latency_ms: Option<u64>,
    pub policy: RetryPolicy,
}

impl RetrySession {
    fn exhausted(&self) -> bool {
        self.sequence.saturating_sub(1) > self.policy.count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Initial,
    Retrying(RetrySession),
    Done,
}

/// Totals for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSummary {
    pub runs: u32,
    pub persisted: u32,
    /// Runs whose bind did not succeed.
    pub bind_failures: u32,
    pub retry_triggered: bool,
    pub trigger_latency_ms: Option<u64>,
}

impl InvocationSummary {
    fn count(&mut self, report: &RunReport) {
        self.runs += 1;
        if report.persisted {
            self.persisted += 1;
        }
        if report.latency_signal.is_none() {
            self.bind_failures += 1;
        }
    }
}

/// Drives the initial run and, if warranted, one retry burst.
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run the invocation to completion. `on_report` sees every run as it
    /// finishes.
    pub async fn run(
        &self,
        checker: &Checker,
        mut on_report: impl FnMut(&RunReport),
    ) -> InvocationSummary {
        let mut summary = InvocationSummary::default();
        let mut state = RetryState::Initial;

        loop {
            state = match state {
                RetryState::Initial => {
                    let report = checker.run(1).await;
                    summary.count(&report);
                    on_report(&report);

                    if self.policy.triggers(report.latency_signal) {
                        info!(
                            latency_ms = ?report.latency_signal,
                            threshold_ms = self.policy.threshold_ms,
                            retries = self.policy.count,
                            delay_secs = self.policy.delay.as_secs(),
                            "bind latency over threshold, starting retry burst"
                        );
                        summary.retry_triggered = true;
                        summary.trigger_latency_ms = report.latency_signal;
                        RetryState::Retrying(RetrySession {
                            sequence: 2,
                            trigger_latency_ms: report.latency_signal,
                            policy: self.policy,
                        })
                    } else {
                        debug!(latency_ms = ?report.latency_signal, "no retry needed");
                        RetryState::Done
                    }
                }
                RetryState::Retrying(session) if session.exhausted() => {
                    info!(runs = summary.runs, "retry burst finished");
                    RetryState::Done
                }
                RetryState::Retrying(session) => {
                    debug!(
                        sequence = session.sequence,
                        delay_secs = session.policy.delay.as_secs(),
                        "waiting before retry"
                    );
                    tokio::time::sleep(session.policy.delay).await;

                    let report = checker.run(session.sequence).await;
                    summary.count(&report);
                    on_report(&report);

                    match session.sequence.checked_add(1) {
                        Some(sequence) => RetryState::Retrying(RetrySession {
                            sequence,
                            ..session
                        }),
                        None => RetryState::Done,
                    }
                }
                RetryState::Done => break,
            };
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::CheckSettings;
    use crate::testing::FakeDirectory;
    use dcprobe_core::config::TimeoutConfig;
    use dcprobe_core::HostIdentity;
    use dcprobe_store::ResultStore;
    use std::path::Path;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy(threshold_ms: u64, count: u32, delay_secs: u64) -> RetryPolicy {
        RetryPolicy {
            threshold_ms,
            count,
            delay: Duration::from_secs(delay_secs),
            on_bind_failure: false,
        }
    }

    fn checker(fake: FakeDirectory, log_dir: &Path) -> Checker {
        let host = HostIdentity::new("WS01", None);
        let settings = CheckSettings {
            domain: "corp.test".to_string(),
            host: host.clone(),
            ping_enabled: true,
            timeouts: TimeoutConfig::default(),
        };
        Checker::new(Arc::new(fake), ResultStore::new(log_dir, &host), settings)
    }

    fn slow_bind(ms: u64) -> FakeDirectory {
        FakeDirectory {
            bind_delay: Duration::from_millis(ms),
            ..FakeDirectory::healthy()
        }
    }

    #[test]
    fn triggers_only_above_threshold() {
        let p = policy(1000, 3, 2);
        assert!(!p.triggers(Some(999)));
        assert!(!p.triggers(Some(1000)));
        assert!(p.triggers(Some(1001)));
        assert!(!p.triggers(None));
    }

    #[test]
    fn bind_failure_triggers_when_enabled() {
        let p = RetryPolicy {
            on_bind_failure: true,
            ..policy(1000, 3, 2)
        };
        assert!(p.triggers(None));
    }

    #[test]
    fn policy_from_config() {
        let p = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(p, policy(1000, 10, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_bind_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let checker = checker(slow_bind(20), dir.path());
        let controller = RetryController::new(policy(1000, 10, 10));

        let summary = controller.run(&checker, |_| {}).await;
        assert_eq!(summary.runs, 1);
        assert!(!summary.retry_triggered);
        assert_eq!(checker.store().read_rows().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bind_runs_flat_burst() {
        let dir = tempfile::tempdir().unwrap();
        // Every run is slow; retries must still not extend the burst.
        let checker = checker(slow_bind(1500), dir.path());
        let controller = RetryController::new(policy(1000, 3, 2));
        let mut sequences = Vec::new();

        let start = Instant::now();
        let summary = controller
            .run(&checker, |report| sequences.push(report.sequence))
            .await;

        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(summary.runs, 4);
        assert_eq!(summary.persisted, 4);
        assert!(summary.retry_triggered);
        assert_eq!(summary.trigger_latency_ms, Some(1500));
        assert_eq!(checker.store().read_rows().unwrap().len(), 4);
    }

    #[test]
    fn session_bound_holds_at_maximum_count() {
        let session = RetrySession {
            sequence: u32::MAX,
            trigger_latency_ms: Some(1500),
            policy: policy(1000, u32::MAX, 1),
        };
        assert!(!session.exhausted());

        let small = RetrySession {
            sequence: 4,
            policy: policy(1000, 3, 1),
            ..session
        };
        assert!(!small.exhausted());
        assert!(RetrySession { sequence: 5, ..small }.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_count_stops_after_initial() {
        let dir = tempfile::tempdir().unwrap();
        let checker = checker(slow_bind(1500), dir.path());
        let controller = RetryController::new(policy(1000, 0, 2));

        let summary = controller.run(&checker, |_| {}).await;
        assert_eq!(summary.runs, 1);
        assert!(summary.retry_triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_bind_does_not_retry_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeDirectory {
            bind: Err("refused".to_string()),
            ..FakeDirectory::healthy()
        };
        let checker = checker(fake, dir.path());
        let controller = RetryController::new(policy(1000, 3, 2));

        let summary = controller.run(&checker, |_| {}).await;
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.bind_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_bind_retries_when_policy_allows() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeDirectory {
            bind: Err("refused".to_string()),
            ..FakeDirectory::healthy()
        };
        let checker = checker(fake, dir.path());
        let controller = RetryController::new(RetryPolicy {
            on_bind_failure: true,
            ..policy(1000, 2, 1)
        });

        let summary = controller.run(&checker, |_| {}).await;
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.bind_failures, 3);
        assert_eq!(summary.trigger_latency_ms, None);
    }
}
