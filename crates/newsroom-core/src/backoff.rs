use serde::{Deserialize, Serialize};

/// Bounded exponential retry policy for role invocations.
///
/// `max_retries` counts retries after the first attempt, so a bound of 2
/// allows 3 invocations in total.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Policy without waits, for tests and dry runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the given 1-based attempt.
    ///
    /// Attempt 1: immediate
    /// Attempt 2: base
    /// Attempt n: base * 2^(n-2), capped at max_delay_ms
    pub fn delay_ms(&self, attempt_number: u32) -> u64 {
        match attempt_number {
            0 | 1 => 0,
            n => {
                let shift = (n - 2).min(31);
                self.base_delay_ms.saturating_mul(1u64 << shift).min(self.max_delay_ms)
            }
        }
    }
}
