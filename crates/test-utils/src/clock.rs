use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use cmdctl::clock::{Clock, SharedClock};
use cmdctl::model::Timestamp;
use parking_lot::Mutex;

/// Manually advanced clock. Starts at 2024-01-01T00:00:00Z.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<Timestamp>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Self::start()),
        })
    }

    pub fn start() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Move forward and return the new time.
    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
        *now
    }

    /// One second later; most tests only need strictly increasing times.
    pub fn tick(&self) -> Timestamp {
        self.advance(Duration::from_secs(1))
    }

    pub fn shared(self: &Arc<Self>) -> SharedClock {
        self.clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
