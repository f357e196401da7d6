//! File-backed audit channels.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{AuditChannel, AuditError, AuditLog};

/// Audit log writing one append-only text file per channel under `dir`.
///
/// Each entry group is written with a single `write_all` followed by
/// `sync_data`, so an `Ok` return means the lines reached the disk. Appends to
/// the same channel are serialised within the process.
#[derive(Debug)]
pub struct FileAuditLog {
    dir: PathBuf,
    locks: HashMap<AuditChannel, Mutex<()>>,
}

impl FileAuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let locks = AuditChannel::ALL
            .iter()
            .map(|c| (*c, Mutex::new(())))
            .collect();
        Self {
            dir: dir.into(),
            locks,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, channel: AuditChannel) -> PathBuf {
        self.dir.join(channel.file_name())
    }

    fn write_group(&self, channel: AuditChannel, lines: &[String]) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut buf = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            buf.push_str(line.trim_end_matches('\n'));
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(channel))?;
        file.write_all(buf.as_bytes())?;
        file.sync_data()
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, channel: AuditChannel, lines: &[String]) -> Result<(), AuditError> {
        if lines.is_empty() {
            return Err(AuditError::EmptyEntry(channel));
        }

        let _guard = self
            .locks
            .get(&channel)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner));

        self.write_group(channel, lines)
            .map_err(|source| AuditError::Io { channel, source })
    }
}
