//! Time source: monotonic milliseconds and a blocking delay.

use std::time::{Duration, Instant};

pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
    /// Block the calling thread for `ms` milliseconds.
    fn delay_ms(&self, ms: u64);
}

/// Wall clock backed by [`Instant`] and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Test clock: delays advance time instantly and are recorded.
#[doc(hidden)]
pub mod mock {
    use super::Clock;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Default)]
    pub struct ManualClock {
        now: Cell<u64>,
        pub delays: RefCell<Vec<u64>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn advance(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }

        /// Sum of all requested delays.
        pub fn total_delay_ms(&self) -> u64 {
            self.delays.borrow().iter().sum()
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.now.get()
        }

        fn delay_ms(&self, ms: u64) {
            self.delays.borrow_mut().push(ms);
            self.advance(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::ManualClock;
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let c = SystemClock::new();
        let a = c.now_ms();
        c.delay_ms(2);
        assert!(c.now_ms() >= a + 2);
    }

    #[test]
    fn manual_clock_records_delays() {
        let c = ManualClock::new();
        c.delay_ms(25);
        c.delay_ms(25);
        assert_eq!(c.now_ms(), 50);
        assert_eq!(*c.delays.borrow(), vec![25, 25]);
        assert_eq!(c.total_delay_ms(), 50);
    }

    #[test]
    fn manual_clock_advance() {
        let c = ManualClock::new();
        c.advance(7);
        assert_eq!(c.now_ms(), 7);
        assert!(c.delays.borrow().is_empty());
    }
}
