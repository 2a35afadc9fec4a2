//! Runtime-free pieces of the session connection.
//!
//! Free of tokio and socket types so the retry math and close-code rules can be
//! exercised directly in tests.

use std::fmt;
use std::time::Duration;

/// Normal closure: the peer is done, nothing to report.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Reported when the socket vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// The server refused the session (bad code, name taken, full room).
pub const POLICY_VIOLATION: u16 = 1008;

const APPLICATION_CODES: std::ops::RangeInclusive<u16> = 4000..=4999;

/// Monotonically increasing tag carried by every socket event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a close code should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// Clean shutdown; no retry, no error.
    Normal,
    /// The server rejected us; retrying would fail the same way.
    Rejected,
    /// Network or server hiccup; retry while the connection is still wanted.
    Retryable,
}

pub fn classify_close(code: u16) -> CloseClass {
    match code {
        NORMAL_CLOSURE => CloseClass::Normal,
        POLICY_VIOLATION => CloseClass::Rejected,
        c if APPLICATION_CODES.contains(&c) => CloseClass::Rejected,
        _ => CloseClass::Retryable,
    }
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive abnormal closes tolerated; the last one is terminal.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the `failures`-th consecutive failure:
    /// `min(base * 2^(failures - 1), max)`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Consecutive failure counter driving reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    failures: u32,
}

impl BackoffState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Count one more abnormal close.
    ///
    /// Returns the delay before the next attempt, or `None` once the budget is
    /// spent.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= policy.max_attempts {
            return None;
        }
        Some(policy.delay_for(self.failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_close() {
        assert_eq!(classify_close(1000), CloseClass::Normal);
        assert_eq!(classify_close(1008), CloseClass::Rejected);
        assert_eq!(classify_close(4000), CloseClass::Rejected);
        assert_eq!(classify_close(4404), CloseClass::Rejected);
        assert_eq!(classify_close(4999), CloseClass::Rejected);
        assert_eq!(classify_close(1001), CloseClass::Retryable);
        assert_eq!(classify_close(1006), CloseClass::Retryable);
        assert_eq!(classify_close(1011), CloseClass::Retryable);
        assert_eq!(classify_close(5000), CloseClass::Retryable);
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
        assert_eq!(policy.delay_for(200), Duration::from_millis(10_000));
    }

    #[test]
    fn test_backoff_budget() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let mut backoff = BackoffState::default();

        assert_eq!(backoff.record_failure(&policy), Some(Duration::from_millis(1_000)));
        assert_eq!(backoff.record_failure(&policy), Some(Duration::from_millis(2_000)));
        assert_eq!(backoff.record_failure(&policy), None);
        assert_eq!(backoff.failures(), 3);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
    }
}
