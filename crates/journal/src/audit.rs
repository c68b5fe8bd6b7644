use std::path::Path;

use coinvault_core::{AccountId, AuditEvent};
use log::{error, info};
use parking_lot::RwLock;

use crate::error::Result;
use crate::store::JsonLinesFile;

/// Append-only trail of events that move no balance
///
/// Recording never fails the caller: a sink write error is logged and the
/// event is still kept in memory.
pub struct AuditLog {
    events: RwLock<Vec<AuditEvent>>,
    sink: Option<JsonLinesFile>,
}

impl AuditLog {
    pub fn in_memory() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            sink: None,
        }
    }

    /// Open a file-backed log, loading earlier events
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (sink, events): (_, Vec<AuditEvent>) = JsonLinesFile::open(path)?;
        info!("Audit log {} holds {} events", sink.path().display(), events.len());
        Ok(Self {
            events: RwLock::new(events),
            sink: Some(sink),
        })
    }

    pub fn record(&self, event: AuditEvent) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(&event) {
                error!(
                    "Failed to persist audit event {:?} for {}: {}",
                    event.kind, event.account_id, e
                );
            }
        }
        self.events.write().push(event);
    }

    pub fn events(&self, account_id: &AccountId) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| &e.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coinvault_core::{AuditKind, CorrelationId};

    #[test]
    fn test_events_filtered_by_account() {
        let log = AuditLog::in_memory();
        log.record(AuditEvent::new(AccountId::from("a"), AuditKind::PinFailed, "wrong pin", Utc::now()));
        log.record(AuditEvent::new(AccountId::from("b"), AuditKind::PinFailed, "wrong pin", Utc::now()));

        assert_eq!(log.events(&AccountId::from("a")).len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_file_backed_log_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let log = AuditLog::open(&path).unwrap();
        log.record(
            AuditEvent::new(AccountId::from("a"), AuditKind::OrderRejected, "PriceNotMet", Utc::now())
                .with_correlation(CorrelationId::from("order-1")),
        );
        drop(log);

        let reopened = AuditLog::open(&path).unwrap();
        let events = reopened.events(&AccountId::from("a"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, Some(CorrelationId::from("order-1")));
    }
}
