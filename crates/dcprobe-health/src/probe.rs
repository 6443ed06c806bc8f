//! Probe primitives.
//!
//! Each primitive asks the [`DirectoryBackend`] one question under a
//! timeout and returns either the answer with its elapsed time or a
//! [`ProbeError`] of the primitive's own kind. Primitives never look at
//! each other's results; sequencing is the check run's job.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use dcprobe_core::{ProbeError, ProbeResult};
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{BackendFuture, DirectoryBackend};

/// Extra time granted on top of the echo timeout for process startup.
const ECHO_GRACE: Duration = Duration::from_secs(2);

/// A successful primitive answer and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probed<T> {
    pub value: T,
    pub elapsed: Duration,
}

/// Whole milliseconds of a duration, saturating.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Await a backend call under `limit`, measuring wall-clock time.
async fn timed<T>(limit: Duration, call: BackendFuture<'_, T>) -> Result<Probed<T>, String> {
    let start = Instant::now();
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(Probed {
            value,
            elapsed: start.elapsed(),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(format!("timed out after {}ms", millis(limit))),
    }
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Controller the locator assigns to this client.
pub async fn discover_controller(
    backend: &dyn DirectoryBackend,
    domain: &str,
    timeout: Duration,
) -> ProbeResult<Probed<String>> {
    let probed = timed(timeout, backend.locate_controller(domain))
        .await
        .map_err(ProbeError::Discovery)?;
    let controller = non_empty(probed.value)
        .ok_or_else(|| ProbeError::Discovery(format!("no controller found for {domain}")))?;
    debug!(%domain, %controller, "assigned controller located");
    Ok(Probed {
        value: controller,
        elapsed: probed.elapsed,
    })
}

/// First IPv4 address of `hostname`.
pub async fn resolve_address(
    backend: &dyn DirectoryBackend,
    hostname: &str,
    timeout: Duration,
) -> ProbeResult<Probed<Ipv4Addr>> {
    let probed = timed(timeout, backend.resolve_host(hostname))
        .await
        .map_err(ProbeError::Resolution)?;
    let address = probed
        .value
        .iter()
        .find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| ProbeError::Resolution(format!("no IPv4 record for {hostname}")))?;
    debug!(%hostname, %address, "controller address resolved");
    Ok(Probed {
        value: address,
        elapsed: probed.elapsed,
    })
}

/// Single echo round trip, in milliseconds.
pub async fn ping(
    backend: &dyn DirectoryBackend,
    address: Option<Ipv4Addr>,
    timeout: Duration,
) -> ProbeResult<Probed<u64>> {
    let address =
        address.ok_or_else(|| ProbeError::Unreachable("no address supplied".to_string()))?;
    let probed = timed(timeout + ECHO_GRACE, backend.echo(address, timeout))
        .await
        .map_err(|e| ProbeError::Unreachable(format!("{address}: {e}")))?;
    Ok(Probed {
        value: millis(probed.value),
        elapsed: probed.elapsed,
    })
}

/// Controller this client is actually talking to.
pub async fn discover_actual_controller(
    backend: &dyn DirectoryBackend,
    domain: &str,
    local_host: &str,
    timeout: Duration,
) -> ProbeResult<Probed<String>> {
    let probed = timed(timeout, backend.controller_in_use(domain, local_host))
        .await
        .map_err(ProbeError::Discovery)?;
    let controller = non_empty(probed.value).ok_or_else(|| {
        ProbeError::Discovery(format!("no controller in use by {local_host} for {domain}"))
    })?;
    debug!(%domain, %controller, "controller in use located");
    Ok(Probed {
        value: controller,
        elapsed: probed.elapsed,
    })
}

/// Bind to `controller`; the value is the bind latency in milliseconds.
pub async fn bind_directory(
    backend: &dyn DirectoryBackend,
    controller: &str,
    timeout: Duration,
) -> ProbeResult<Probed<u64>> {
    let controller = controller.trim();
    if controller.is_empty() {
        return Err(ProbeError::Bind("no controller identity".to_string()));
    }
    let probed = timed(timeout, backend.bind(controller))
        .await
        .map_err(|e| ProbeError::Bind(format!("{controller}: {e}")))?;
    Ok(Probed {
        value: millis(probed.elapsed),
        elapsed: probed.elapsed,
    })
}

/// `true` when the secure channel verified healthy, `false` when broken.
pub async fn check_secure_channel(
    backend: &dyn DirectoryBackend,
    domain: &str,
    timeout: Duration,
) -> ProbeResult<Probed<bool>> {
    timed(timeout, backend.verify_secure_channel(domain))
        .await
        .map_err(ProbeError::Channel)
}
