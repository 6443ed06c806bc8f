//! ResultStore — per-host append-only CSV persistence for check records.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use dcprobe_core::{CheckRecord, HostIdentity};
use tracing::debug;

use crate::csv::{encode_row, parse_line};
use crate::error::{StoreError, StoreResult};

/// Create the log directory (and parents) if it does not exist yet.
pub fn ensure_log_dir(dir: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })?;
    debug!(path = ?dir, "log directory ready");
    Ok(())
}

/// Append-only log of check records for one machine.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Store writing to `<log_dir>/<machine>.csv`.
    pub fn new(log_dir: &Path, host: &HostIdentity) -> Self {
        Self {
            path: log_dir.join(format!("{}.csv", host.file_stem())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as one row, writing the header first if the file
    /// is new or empty.
    pub fn append(&self, record: &CheckRecord) -> StoreResult<()> {
        let (mut file, needs_header) = self.open_for_append().map_err(|e| self.persist(e))?;

        let mut buf = String::new();
        if needs_header {
            buf.push_str(&encode_row(&CheckRecord::FIELDS));
            buf.push('\n');
        }
        buf.push_str(&encode_row(&record.to_row()));
        buf.push('\n');

        file.write_all(buf.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| self.persist(e))?;

        debug!(path = ?self.path, header = needs_header, "check record appended");
        Ok(())
    }

    fn open_for_append(&self) -> std::io::Result<(File, bool)> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => Ok((file, true)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new().append(true).open(&self.path)?;
                let empty = file.metadata()?.len() == 0;
                Ok((file, empty))
            }
            Err(e) => Err(e),
        }
    }

    /// Header row, or `None` if the log does not exist or is empty.
    pub fn header(&self) -> StoreResult<Option<Vec<String>>> {
        Ok(self.read_lines()?.into_iter().next())
    }

    /// All data rows, header excluded, oldest first.
    pub fn read_rows(&self) -> StoreResult<Vec<Vec<String>>> {
        Ok(self.read_lines()?.into_iter().skip(1).collect())
    }

    fn read_lines(&self) -> StoreResult<Vec<Vec<String>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.persist(e)),
        };
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .map(|(idx, line)| {
                parse_line(line).ok_or_else(|| StoreError::Malformed {
                    path: self.path.clone(),
                    line: idx + 1,
                })
            })
            .collect()
    }

    fn persist(&self, source: std::io::Error) -> StoreError {
        StoreError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}
