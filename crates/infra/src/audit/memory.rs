use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, PoisonError};

use super::{AuditChannel, AuditError, AuditLog};

/// In-memory audit log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    inner: RwLock<HashMap<AuditChannel, Vec<Vec<String>>>>,
    unavailable: AtomicBool,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail with [`AuditError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All lines appended to `channel`, in append order.
    pub fn lines(&self, channel: AuditChannel) -> Vec<String> {
        self.entries(channel).into_iter().flatten().collect()
    }

    /// Appended entry groups for `channel`, one per `append` call.
    pub fn entries(&self, channel: AuditChannel) -> Vec<Vec<String>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&channel).cloned().unwrap_or_default()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, channel: AuditChannel, lines: &[String]) -> Result<(), AuditError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable(channel));
        }
        if lines.is_empty() {
            return Err(AuditError::EmptyEntry(channel));
        }
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(channel).or_default().push(lines.to_vec());
        Ok(())
    }
}
