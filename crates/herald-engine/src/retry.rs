//! Retry policy: pure decisions about whether and when to try again.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use herald_platform::PlatformError;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network/timeout/rate-limit/5xx: may succeed later.
    Transient,
    /// Validation, missing record, auth: repeating cannot help.
    Terminal,
}

/// A failed publish attempt, classified for the retry policy.
///
/// Expected failure modes come back as this type, never as a panic; only
/// programming errors propagate.
#[derive(Debug, Clone)]
pub struct PublishError {
    pub message: String,
    pub class: ErrorClass,
}

impl PublishError {
    /// A failure that retrying cannot fix.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class: ErrorClass::Terminal,
        }
    }

    /// A failure worth retrying with backoff.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class: ErrorClass::Transient,
        }
    }
}

impl From<PlatformError> for PublishError {
    fn from(err: PlatformError) -> Self {
        let class = if err.is_transient() {
            ErrorClass::Transient
        } else {
            ErrorClass::Terminal
        };
        Self {
            message: err.to_string(),
            class,
        }
    }
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the backoff delay.
    Retry { delay: Duration },
    /// Terminal failure; record and move on.
    GiveUp,
}

/// Capped exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            backoff_factor: 2,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given 0-based attempt:
    /// `min(initial * factor^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = (self.backoff_factor as u64).saturating_pow(attempt);
        let ms = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Decide what to do after attempt `attempt` (0-based) failed with
    /// `class`. Terminal errors never retry, regardless of attempt count.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        if class == ErrorClass::Terminal {
            return RetryDecision::GiveUp;
        }
        if attempt + 1 >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.delay_for(attempt),
        }
    }
}
