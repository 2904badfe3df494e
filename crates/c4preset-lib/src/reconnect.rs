//! Reopening the pedal after it disappears, with exponential backoff.
//!
//! The schedule runs on the crate's [`Clock`], so the browse loop and tests
//! share one notion of time.

use std::time::Duration;

use crate::clock::Clock;
use crate::device::{self, PlatformDevice, open_device_by_serial};

/// Configuration for reconnection backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Ceiling for the wait between attempts.
    pub max_delay: Duration,
    /// Growth factor applied after each further failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Failure count and the time of the next allowed attempt.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    consecutive_failures: u32,
    /// `None` until the first failure: try immediately.
    next_attempt_ms: Option<u64>,
}

impl ReconnectState {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            next_attempt_ms: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ReconnectConfig::default())
    }

    /// Wait that follows `failures` consecutive failures.
    fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let growth = self
            .config
            .multiplier
            .max(1.0)
            .powi(failures.saturating_sub(1).min(64) as i32);
        let secs = self.config.initial_delay.as_secs_f64() * growth;
        if secs >= self.config.max_delay.as_secs_f64() {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    pub fn should_attempt(&self, now_ms: u64) -> bool {
        self.next_attempt_ms.is_none_or(|at| now_ms >= at)
    }

    /// Milliseconds left before the next attempt is allowed.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.next_attempt_ms
            .map_or(0, |at| at.saturating_sub(now_ms))
    }

    pub fn record_failure(&mut self, now_ms: u64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let wait = self.delay_after(self.consecutive_failures).as_millis() as u64;
        self.next_attempt_ms = Some(now_ms.saturating_add(wait));
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt_ms = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Wait scheduled after the latest failure (zero before any).
    pub fn current_delay(&self) -> Duration {
        self.delay_after(self.consecutive_failures)
    }
}

/// Run `open` if the backoff allows it, updating the schedule from the result.
///
/// Returns `None` when it is too early to retry or the attempt failed. A
/// device returned here is new to the controller and must go through a fresh
/// mount and discovery.
pub fn try_reopen_with<T>(
    state: &mut ReconnectState,
    clock: &impl Clock,
    open: impl FnOnce() -> device::Result<T>,
) -> Option<T> {
    let now = clock.now_ms();
    if !state.should_attempt(now) {
        return None;
    }
    match open() {
        Ok(dev) => {
            if state.consecutive_failures() > 0 {
                log::info!(
                    "C4 Synth reopened after {} failed attempts",
                    state.consecutive_failures()
                );
            }
            state.record_success();
            Some(dev)
        }
        Err(e) => {
            state.record_failure(now);
            log::warn!(
                "reconnect failed: {e} (attempt {}, retry in {:.1}s)",
                state.consecutive_failures(),
                state.current_delay().as_secs_f64()
            );
            None
        }
    }
}

/// Reopen the pedal by serial (empty selects the first C4 Synth).
pub fn try_reopen(
    state: &mut ReconnectState,
    clock: &impl Clock,
    device_serial: &str,
) -> Option<PlatformDevice> {
    try_reopen_with(state, clock, || open_device_by_serial(device_serial))
}
