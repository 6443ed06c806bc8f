//! Collaborator seam between the probe primitives and the operating system.
//!
//! Every directory-service question a check run asks goes through
//! [`DirectoryBackend`]. [`crate::system::SystemDirectory`] answers them
//! with platform tools and sockets; tests inject an in-memory fake.
//!
//! Methods return boxed futures so the trait stays object-safe and a
//! check run can hold an `Arc<dyn DirectoryBackend>`.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::time::Duration;

/// Boxed future alias for backend call results. Errors are plain messages;
/// the primitive that made the call decides the error kind.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// External directory-service operations, injected for testability.
pub trait DirectoryBackend: Send + Sync {
    /// Controller the domain locator assigns to this client.
    /// `Ok(None)` means the locator answered but named no controller.
    fn locate_controller<'a>(&'a self, domain: &'a str) -> BackendFuture<'a, Option<String>>;

    /// All addresses a hostname resolves to.
    fn resolve_host<'a>(&'a self, hostname: &'a str) -> BackendFuture<'a, Vec<IpAddr>>;

    /// Send one echo request; returns the round-trip time.
    fn echo<'a>(&'a self, address: Ipv4Addr, timeout: Duration) -> BackendFuture<'a, Duration>;

    /// Controller `host` is actually using for its secure channel.
    fn controller_in_use<'a>(
        &'a self,
        domain: &'a str,
        host: &'a str,
    ) -> BackendFuture<'a, Option<String>>;

    /// Bind to the controller and read one attribute. Resolves once the
    /// read has been confirmed.
    fn bind<'a>(&'a self, controller: &'a str) -> BackendFuture<'a, ()>;

    /// Verify the machine's secure channel. `Ok(false)` is a clean "broken".
    fn verify_secure_channel<'a>(&'a self, domain: &'a str) -> BackendFuture<'a, bool>;
}
