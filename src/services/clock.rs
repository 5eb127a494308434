//! Time source for the ledgers

use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use hourglass_rs::{SafeTimeProvider, TimeSource};

/// Shared handle the ledgers read "now" from
pub type Clock = Arc<SafeTimeProvider>;

pub fn system_clock() -> Clock {
    Arc::new(SafeTimeProvider::new(TimeSource::System))
}

/// Clock frozen at `start`. It only moves through `test_control()`.
pub fn test_clock(start: DateTime<Utc>) -> Clock {
    Arc::new(SafeTimeProvider::new(TimeSource::Test(start)))
}
