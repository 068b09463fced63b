//! Every timestamp in the quota engine is a [`DateTime<Tz>`] in the single
//! reference timezone of the process. Values coming from the outside world
//! (the system clock, the database) are converted into that zone right at
//! the boundary by the functions in this module.

use chrono::prelude::*;
use chrono_tz::Tz;
use parking_lot::Mutex;

pub type Timestamp = DateTime<Tz>;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;

    fn timezone(&self) -> Tz {
        self.now().timezone()
    }
}

pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().with_timezone(&self.tz)
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Parses an RFC 3339 timestamp and moves it into the reference timezone.
pub(crate) fn parse_timestamp(input: &str, tz: Tz) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(input.trim())
        .ok()
        .map(|at| at.with_timezone(&tz))
}

pub(crate) fn format_timestamp(at: &Timestamp) -> String {
    at.to_rfc3339()
}
