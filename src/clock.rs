//! Wall-clock abstraction so stores and the focus timer can be driven
//! deterministically in tests.

use chrono::{DateTime, Local, NaiveDate};

/// Source of "now" and "today"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use chrono::{DateTime, Duration, Local, NaiveDate};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<DateTime<Local>>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Local>) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        /// Start at local noon of `date`, away from any midnight edge
        pub fn at_noon(date: NaiveDate) -> Self {
            let noon = date
                .and_hms_opt(12, 0, 0)
                .and_then(|naive| naive.and_local_timezone(Local).earliest())
                .unwrap_or_else(Local::now);
            Self::new(noon)
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock();
            *now = *now + by;
        }

        pub fn set(&self, to: DateTime<Local>) {
            *self.now.lock() = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Local> {
            *self.now.lock()
        }
    }
}
