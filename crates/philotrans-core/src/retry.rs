//! Bounded retry with exponential backoff, as a plain state machine.
//!
//! The dispatcher owns the loop and the sleeping; this module only decides
//! what happens next after each attempt.

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the attempt that follows `attempt` (1-based):
    /// base × 2^(attempt-1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (1-based) is in flight.
    Attempting(u32),
    /// Attempt `n` failed transiently; wait before attempt `n + 1`.
    BackingOff(u32, Duration),
    Succeeded,
    /// Gave up after `attempts` tries.
    Failed { attempts: u32, retryable: bool },
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    pub fn on_success(self) -> Self {
        match self {
            RetryState::Attempting(_) => RetryState::Succeeded,
            other => other,
        }
    }

    pub fn on_failure(self, policy: &RetryPolicy, retryable: bool) -> Self {
        match self {
            RetryState::Attempting(n) if retryable && n < policy.max_attempts => {
                RetryState::BackingOff(n, policy.delay_after(n))
            }
            RetryState::Attempting(n) => RetryState::Failed {
                attempts: n,
                retryable,
            },
            other => other,
        }
    }

    pub fn resume(self) -> Self {
        match self {
            RetryState::BackingOff(n, _) => RetryState::Attempting(n + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed { .. })
    }
}
