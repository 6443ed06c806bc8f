//! In-memory directory backend for unit tests.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::{BackendFuture, DirectoryBackend};

/// How many times each backend method was called.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub locate: usize,
    pub resolve: usize,
    pub echo: usize,
    pub in_use: usize,
    pub bind: usize,
    pub channel: usize,
}

/// Scripted answers for every backend call.
pub struct FakeDirectory {
    pub assigned: Result<Option<String>, String>,
    pub addresses: Result<Vec<IpAddr>, String>,
    pub echo: Result<Duration, String>,
    pub in_use: Result<Option<String>, String>,
    pub bind: Result<(), String>,
    pub bind_delay: Duration,
    pub channel: Result<bool, String>,
    pub calls: Mutex<Calls>,
}

impl FakeDirectory {
    /// DC01 at 10.0.0.5, 12ms echo, instant bind, healthy channel.
    pub fn healthy() -> Self {
        Self {
            assigned: Ok(Some("DC01".to_string())),
            addresses: Ok(vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))]),
            echo: Ok(Duration::from_millis(12)),
            in_use: Ok(Some("DC01".to_string())),
            bind: Ok(()),
            bind_delay: Duration::ZERO,
            channel: Ok(true),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn calls(&self) -> Calls {
        *self.calls.lock().unwrap()
    }

    fn count(&self, f: impl FnOnce(&mut Calls)) {
        f(&mut self.calls.lock().unwrap());
    }
}

impl DirectoryBackend for FakeDirectory {
    fn locate_controller<'a>(&'a self, _domain: &'a str) -> BackendFuture<'a, Option<String>> {
        self.count(|c| c.locate += 1);
        let answer = self.assigned.clone();
        Box::pin(async move { answer })
    }

    fn resolve_host<'a>(&'a self, _hostname: &'a str) -> BackendFuture<'a, Vec<IpAddr>> {
        self.count(|c| c.resolve += 1);
        let answer = self.addresses.clone();
        Box::pin(async move { answer })
    }

    fn echo<'a>(&'a self, _address: Ipv4Addr, _timeout: Duration) -> BackendFuture<'a, Duration> {
        self.count(|c| c.echo += 1);
        let answer = self.echo.clone();
        Box::pin(async move { answer })
    }

    fn controller_in_use<'a>(
        &'a self,
        _domain: &'a str,
        _host: &'a str,
    ) -> BackendFuture<'a, Option<String>> {
        self.count(|c| c.in_use += 1);
        let answer = self.in_use.clone();
        Box::pin(async move { answer })
    }

    fn bind<'a>(&'a self, _controller: &'a str) -> BackendFuture<'a, ()> {
        self.count(|c| c.bind += 1);
        let answer = self.bind.clone();
        let delay = self.bind_delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            answer
        })
    }

    fn verify_secure_channel<'a>(&'a self, _domain: &'a str) -> BackendFuture<'a, bool> {
        self.count(|c| c.channel += 1);
        let answer = self.channel.clone();
        Box::pin(async move { answer })
    }
}
