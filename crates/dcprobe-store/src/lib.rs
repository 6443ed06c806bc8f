//! dcprobe-store — append-only CSV log of check records.
//!
//! One file per machine, `<log_dir>/<machine>.csv`. The first write
//! creates the file with a header row naming the record fields; every
//! later write appends exactly one row and never touches the header.
//!
//! There is no locking. Two invocations appending to the same file at
//! once can interleave rows, so schedules must not overlap.

pub mod csv;
pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{ResultStore, ensure_log_dir};
