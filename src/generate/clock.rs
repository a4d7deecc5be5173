use chrono::{DateTime, Utc};

use crate::schema::TimestampUnit;

/// Source of wall-clock time for timestamp integers and the `now` format.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn timestamp(clock: &dyn Clock, unit: TimestampUnit) -> i64 {
    let now = clock.now();
    match unit {
        TimestampUnit::Seconds => now.timestamp(),
        TimestampUnit::Milliseconds => now.timestamp_millis(),
    }
}
