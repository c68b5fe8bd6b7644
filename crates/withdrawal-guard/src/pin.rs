use chrono::Duration;
use coinvault_core::Timestamp;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const PIN_LENGTH: usize = 6;

/// Brute-force protection for the withdrawal PIN
#[derive(Debug, Clone)]
pub struct PinPolicy {
    /// Consecutive failures that trigger a lockout
    pub max_attempts: u32,
    /// Failures older than this no longer count
    pub window: Duration,
    pub lockout: Duration,
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
            lockout: Duration::minutes(15),
        }
    }
}

/// Stored PIN digest plus the lockout counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRecord {
    pub salt: String,
    pub hash: String,
    pub failed_attempts: u32,
    pub first_failure_at: Option<Timestamp>,
    pub locked_until: Option<Timestamp>,
}

impl PinRecord {
    /// Remaining lockout at `now`, if any
    pub fn locked_for(&self, now: Timestamp) -> Option<Duration> {
        self.locked_until.filter(|until| *until > now).map(|until| until - now)
    }

    /// Count a failure; returns the attempts left before lockout
    pub fn register_failure(&mut self, now: Timestamp, policy: &PinPolicy) -> u32 {
        let window_expired = self.first_failure_at.is_none_or(|first| now - first > policy.window);
        if window_expired {
            self.failed_attempts = 0;
            self.first_failure_at = Some(now);
        }
        self.failed_attempts += 1;

        if self.failed_attempts >= policy.max_attempts {
            self.locked_until = Some(now + policy.lockout);
            self.failed_attempts = 0;
            self.first_failure_at = None;
            return 0;
        }
        policy.max_attempts - self.failed_attempts
    }

    /// Clear counters after a correct PIN
    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.first_failure_at = None;
        self.locked_until = None;
    }

    /// True if counters changed since `other` (used to skip needless writes)
    pub fn counters_differ(&self, other: &PinRecord) -> bool {
        self.failed_attempts != other.failed_attempts
            || self.first_failure_at != other.first_failure_at
            || self.locked_until != other.locked_until
    }
}

/// Salted, peppered HMAC-SHA256 over the PIN
#[derive(Clone)]
pub struct PinHasher {
    pepper: Vec<u8>,
}

impl PinHasher {
    pub fn new(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: pepper.as_ref().to_vec(),
        }
    }

    pub fn is_valid_format(pin: &str) -> bool {
        pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
    }

    /// New record with a fresh salt
    pub fn create(&self, pin: &str) -> PinRecord {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        PinRecord {
            hash: self.digest(&salt, pin),
            salt,
            failed_attempts: 0,
            first_failure_at: None,
            locked_until: None,
        }
    }

    pub fn digest(&self, salt: &str, pin: &str) -> String {
        hex::encode(self.mac(salt, pin).finalize().into_bytes())
    }

    /// Constant-time comparison against the stored digest
    pub fn verify(&self, record: &PinRecord, pin: &str) -> bool {
        match hex::decode(&record.hash) {
            Ok(expected) => self.mac(&record.salt, pin).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    fn mac(&self, salt: &str, pin: &str) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = match HmacSha256::new_from_slice(&self.pepper) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC takes keys of any size"),
        };
        mac.update(salt.as_bytes());
        mac.update(b":");
        mac.update(pin.as_bytes());
        mac
    }
}

impl std::fmt::Debug for PinHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format() {
        assert!(PinHasher::is_valid_format("123456"));
        assert!(!PinHasher::is_valid_format("12345"));
        assert!(!PinHasher::is_valid_format("12345a"));
        assert!(!PinHasher::is_valid_format("１２３４５６"));
    }

    #[test]
    fn test_verify_uses_salt_and_pepper() {
        let hasher = PinHasher::new("pepper");
        let record = hasher.create("123456");

        assert!(hasher.verify(&record, "123456"));
        assert!(!hasher.verify(&record, "654321"));
        assert!(!PinHasher::new("other").verify(&record, "123456"));
        assert_ne!(hasher.create("123456").salt, record.salt);
    }

    #[test]
    fn test_lockout_after_max_failures() {
        let policy = PinPolicy::default();
        let hasher = PinHasher::new("pepper");
        let mut record = hasher.create("123456");
        let now = Utc::now();

        for expected in (1..5).rev() {
            assert_eq!(record.register_failure(now, &policy), expected);
            assert!(record.locked_for(now).is_none());
        }
        assert_eq!(record.register_failure(now, &policy), 0);
        assert_eq!(record.locked_for(now), Some(Duration::minutes(15)));
        assert!(record.locked_for(now + Duration::minutes(15)).is_none());
    }

    #[test]
    fn test_failures_outside_window_start_over() {
        let policy = PinPolicy::default();
        let mut record = PinHasher::new("p").create("123456");
        let start = Utc::now();

        for _ in 0..4 {
            record.register_failure(start, &policy);
        }
        assert_eq!(record.register_failure(start + Duration::minutes(16), &policy), 4);
    }
}
