pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::ProbeConfig;
pub use error::{ProbeError, ProbeResult};
pub use identity::HostIdentity;
pub use types::*;
