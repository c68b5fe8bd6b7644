//! Coinvault Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time, used by the server
//! - [`ManualClock`]: frozen time that only moves when told to, used by tests
//!   that exercise price staleness and PIN lockout windows
//!
//! ## Usage
//!
//! ```ignore
//! use coinvault_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_now();
//! let before = clock.now();
//! clock.advance(Duration::minutes(15)); // lockout window elapses
//! assert_eq!(clock.now() - before, Duration::minutes(15));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use coinvault_ports::Clock;
