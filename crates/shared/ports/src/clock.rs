use coinvault_core::Timestamp;

/// Source of "now" for price staleness, lockout windows and entry timestamps
///
/// The server runs on wall-clock time; tests drive a manual clock so that
/// freshness and lockout rules can be exercised without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
