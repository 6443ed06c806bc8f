//! dcprobe-health — directory connectivity probes and the retry engine.
//!
//! Runs a fixed sequence of probes against the domain, folds the
//! outcomes into one [`dcprobe_core::CheckRecord`], persists it, and
//! re-probes in a bounded burst when the bind is slow.
//!
//! # Architecture
//!
//! ```text
//! RetryController
//!   └── Checker::run(sequence)  (initial run, then 0..count retries)
//!       ├── probe::discover_controller → probe::resolve_address
//!       ├── probe::ping                (unless disabled / no address)
//!       ├── probe::discover_actual_controller → probe::bind_directory
//!       ├── probe::check_secure_channel
//!       └── ResultStore::append
//! ```
//!
//! Every probe goes through a [`DirectoryBackend`]. [`SystemDirectory`]
//! is the production implementation; it shells out to `nltest`/`adcli`/
//! `wbinfo`/`ping` and speaks LDAP for the bind.
//!
//! Exactly one run executes at a time and the controller sleeps between
//! retries, so a `current_thread` runtime is all this needs.

pub mod backend;
pub mod ldap;
pub mod probe;
pub mod retry;
pub mod run;
pub mod system;

#[cfg(test)]
mod testing;

pub use backend::{BackendFuture, DirectoryBackend};
pub use retry::{InvocationSummary, RetryController, RetryPolicy};
pub use run::{CheckSettings, Checker, RunReport};
pub use system::SystemDirectory;
