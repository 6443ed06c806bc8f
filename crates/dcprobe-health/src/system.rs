//! Production directory backend built on platform tools and sockets.
//!
//! | Question            | Windows                 | Other platforms          |
//! |---------------------|-------------------------|--------------------------|
//! | assigned controller | `nltest /dsgetdc:`      | `adcli info`             |
//! | controller in use   | `nltest /sc_query:`     | `wbinfo --getdcname=`    |
//! | secure channel      | `nltest /sc_verify:`    | `wbinfo --ping-dc`       |
//! | echo                | `ping -n 1 -w <ms>`     | `ping -c 1 -W <s>`       |
//! | DNS                 | `tokio::net::lookup_host`                          |
//! | bind                | LDAP rootDSE read over TCP (see [`crate::ldap`])   |
//!
//! Tool output parsers are plain functions so they can be tested on any
//! platform.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

use crate::backend::{BackendFuture, DirectoryBackend};
use crate::ldap;

/// Captured result of one external tool invocation.
#[derive(Debug, Clone)]
struct ToolOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl ToolOutput {
    /// First non-empty line of stderr, else of stdout.
    fn detail(&self) -> String {
        first_line(&self.stderr)
            .or_else(|| first_line(&self.stdout))
            .unwrap_or("no output")
            .to_string()
    }
}

fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|l| !l.is_empty())
}

async fn run_tool(program: &str, args: &[String]) -> Result<ToolOutput, String> {
    debug!(%program, ?args, "running directory tool");
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("{program} could not be started: {e}"))?;
    Ok(ToolOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

async fn run_tool_ok(program: &str, args: &[String]) -> Result<String, String> {
    let output = run_tool(program, args).await?;
    if !output.success {
        return Err(format!("{program} failed: {}", output.detail()));
    }
    Ok(output.stdout)
}

#[cfg(windows)]
mod platform {
    use super::*;

    pub async fn locate(domain: &str) -> Result<Option<String>, String> {
        let out = run_tool_ok("nltest", &[format!("/dsgetdc:{domain}")]).await?;
        Ok(parse_dsgetdc(&out))
    }

    pub async fn in_use(domain: &str, host: &str) -> Result<Option<String>, String> {
        let args = [format!("/server:{host}"), format!("/sc_query:{domain}")];
        let out = run_tool_ok("nltest", &args).await?;
        Ok(parse_sc_query(&out))
    }

    pub async fn verify(domain: &str) -> Result<bool, String> {
        // nltest exits non-zero for a broken channel; the status lines decide.
        let out = run_tool("nltest", &[format!("/sc_verify:{domain}")]).await?;
        parse_sc_verify(&out.stdout).ok_or_else(|| format!("nltest: {}", out.detail()))
    }

    pub fn echo_args(address: Ipv4Addr, timeout: Duration) -> Vec<String> {
        vec![
            "-n".to_string(),
            "1".to_string(),
            "-w".to_string(),
            timeout.as_millis().max(1).to_string(),
            address.to_string(),
        ]
    }
}

#[cfg(not(windows))]
mod platform {
    use super::*;

    pub async fn locate(domain: &str) -> Result<Option<String>, String> {
        let out = run_tool_ok("adcli", &["info".to_string(), domain.to_string()]).await?;
        Ok(parse_adcli_info(&out))
    }

    pub async fn in_use(domain: &str, _host: &str) -> Result<Option<String>, String> {
        let out = run_tool_ok("wbinfo", &[format!("--getdcname={domain}")]).await?;
        Ok(parse_wbinfo_dcname(&out))
    }

    pub async fn verify(_domain: &str) -> Result<bool, String> {
        let out = run_tool("wbinfo", &["--ping-dc".to_string()]).await?;
        let text = format!("{}\n{}", out.stdout, out.stderr);
        parse_wbinfo_ping(&text).ok_or_else(|| format!("wbinfo: {}", out.detail()))
    }

    pub fn echo_args(address: Ipv4Addr, timeout: Duration) -> Vec<String> {
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            timeout.as_secs_f64().ceil().max(1.0).to_string(),
            address.to_string(),
        ]
    }
}

/// `DC: \\DC01.corp.example.com` from `nltest /dsgetdc:`.
pub fn parse_dsgetdc(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("DC:")?;
        strip_unc(value)
    })
}

/// `Trusted DC Name \\DC01.corp.example.com` from `nltest /sc_query:`.
pub fn parse_sc_query(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("Trusted DC Name")?;
        strip_unc(value)
    })
}

/// Status lines of `nltest /sc_verify:` that describe the trust itself.
const SC_VERIFY_STATUS_LINES: [&str; 2] =
    ["Trusted DC Connection Status", "Trust Verification Status"];

/// Healthy when every trust status line of `nltest /sc_verify:` reports
/// `NERR_Success`, broken when one does not.
///
/// `None` when the verification call itself failed
/// (`I_NetLogonControl failed: Status = 5 0x5 ERROR_ACCESS_DENIED`) or
/// printed no trust status at all.
pub fn parse_sc_verify(output: &str) -> Option<bool> {
    let mut statuses = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.starts_with("I_NetLogonControl failed") {
            return None;
        }
        let trust_line = SC_VERIFY_STATUS_LINES.iter().any(|p| line.starts_with(p));
        if trust_line && line.contains("Status =") {
            statuses.push(line);
        }
    }
    if statuses.is_empty() {
        return None;
    }
    Some(statuses.iter().all(|line| line.contains("NERR_Success")))
}

/// `domain-controller = dc01.corp.example.com` from `adcli info`.
pub fn parse_adcli_info(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == "domain-controller")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// First line of `wbinfo --getdcname=`, without UNC backslashes.
pub fn parse_wbinfo_dcname(output: &str) -> Option<String> {
    first_line(output).and_then(strip_unc)
}

/// `... dc connection to "dc01" succeeded` / `... failed`.
///
/// Only that line decides. Anything else, such as
/// `failed to call wbcPingDc: WBC_ERR_WINBIND_NOT_AVAILABLE`, means the
/// check could not run and yields `None`.
pub fn parse_wbinfo_ping(output: &str) -> Option<bool> {
    output.lines().find_map(|line| {
        let lower = line.to_lowercase();
        let (_, verdict) = lower.split_once("dc connection to")?;
        let verdict = verdict.trim_end();
        if verdict.ends_with("succeeded") {
            Some(true)
        } else if verdict.ends_with("failed") {
            Some(false)
        } else {
            None
        }
    })
}

static PING_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").ok());

/// Round-trip time from `ping` output (`time=12.3 ms`, `time<1ms`).
pub fn parse_ping_time(output: &str) -> Option<Duration> {
    let re = PING_TIME.as_ref()?;
    let ms: f64 = re.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_micros((ms * 1000.0).round() as u64))
}

fn strip_unc(value: &str) -> Option<String> {
    let name = value.trim().trim_start_matches('\\').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Directory backend that talks to the real domain.
#[derive(Debug, Clone)]
pub struct SystemDirectory {
    ldap_port: u16,
}

impl SystemDirectory {
    pub fn new(ldap_port: u16) -> Self {
        Self { ldap_port }
    }
}

impl DirectoryBackend for SystemDirectory {
    fn locate_controller<'a>(&'a self, domain: &'a str) -> BackendFuture<'a, Option<String>> {
        Box::pin(platform::locate(domain))
    }

    fn resolve_host<'a>(&'a self, hostname: &'a str) -> BackendFuture<'a, Vec<IpAddr>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((hostname, 0))
                .await
                .map_err(|e| format!("lookup of {hostname} failed: {e}"))?;
            Ok(addrs.map(|sa| sa.ip()).collect())
        })
    }

    fn echo<'a>(&'a self, address: Ipv4Addr, timeout: Duration) -> BackendFuture<'a, Duration> {
        Box::pin(async move {
            let out = run_tool("ping", &platform::echo_args(address, timeout)).await?;
            if !out.success {
                return Err(format!("no reply: {}", out.detail()));
            }
            parse_ping_time(&out.stdout).ok_or_else(|| "no round-trip time in reply".to_string())
        })
    }

    fn controller_in_use<'a>(
        &'a self,
        domain: &'a str,
        host: &'a str,
    ) -> BackendFuture<'a, Option<String>> {
        Box::pin(platform::in_use(domain, host))
    }

    fn bind<'a>(&'a self, controller: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut stream = TcpStream::connect((controller, self.ldap_port))
                .await
                .map_err(|e| format!("connect to port {} failed: {e}", self.ldap_port))?;
            let naming_context = ldap::root_dse_session(&mut stream)
                .await
                .map_err(|e| e.to_string())?;
            debug!(%controller, ?naming_context, "rootDSE read");
            Ok(())
        })
    }

    fn verify_secure_channel<'a>(&'a self, domain: &'a str) -> BackendFuture<'a, bool> {
        Box::pin(platform::verify(domain))
    }
}
