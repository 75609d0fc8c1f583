//! Single-shot reconnect scheduling after a transport fault.
//!
//! A room subscription is cheap to re-open, so a fault schedules exactly one
//! attempt after a fixed delay. A failed attempt schedules the next one the
//! same way; there is no exponential growth and no attempt cap. A successful
//! connection cancels whatever is pending.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnect scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay between a fault and the next attempt. Default: 2 s.
    pub delay: Duration,
    /// Jitter factor (0.0 to 1.0). Applied as ±jitter to the delay. Default: 0.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            jitter: 0.0,
        }
    }
}

/// Pending reconnect timer. At most one is ever armed.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    config: ReconnectConfig,
    due_at: Option<Duration>,
    attempts: u32,
}

impl ReconnectSchedule {
    /// Create an idle schedule.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            due_at: None,
            attempts: 0,
        }
    }

    /// Arm the timer relative to `now` and return when it fires.
    ///
    /// If a timer is already armed it is kept as is, so repeated fault
    /// reports cannot push the attempt further out or stack attempts.
    pub fn schedule(&mut self, now: Duration) -> Duration {
        if let Some(due) = self.due_at {
            return due;
        }
        let due = now + self.jittered_delay();
        self.due_at = Some(due);
        due
    }

    /// Returns `true` and disarms the timer if it has fired by `now`.
    pub fn take_due(&mut self, now: Duration) -> bool {
        match self.due_at {
            Some(due) if now >= due => {
                self.due_at = None;
                self.attempts = self.attempts.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    /// Disarm the timer and reset the attempt counter (after a success).
    pub fn cancel(&mut self) {
        self.due_at = None;
        self.attempts = 0;
    }

    /// When the armed timer fires, if any.
    pub fn pending(&self) -> Option<Duration> {
        self.due_at
    }

    /// Attempts fired since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn jittered_delay(&self) -> Duration {
        let base = self.config.delay;
        if self.config.jitter <= 0.0 {
            return base;
        }
        let jitter = self.config.jitter.min(1.0);
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor)
    }
}
