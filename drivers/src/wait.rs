/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains the bounded polling primitive shared by the AES and TRNG
    drivers.

--*/

use std::time::Duration;

/// Number of polls allowed before a handshake is declared timed out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1_000_000;

/// How long a driver may spin on a status register.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollBudget {
    pub max_attempts: u32,

    /// Sleep between attempts; `None` spins.
    pub delay: Option<Duration>,
}

impl PollBudget {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: None,
        }
    }

    pub const fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    /// 1,000,000 polls with a 1 µs sleep between them.
    pub const fn aes_default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS).with_delay(Duration::from_micros(1))
    }

    /// 1,000,000 polls with no sleep.
    pub const fn trng_default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Evaluate `predicate` until it returns true or the budget runs out.
///
/// Returns the number of polls it took, or `None` on timeout.
pub fn until<F>(budget: &PollBudget, mut predicate: F) -> Option<u32>
where
    F: FnMut() -> bool,
{
    for attempt in 1..=budget.max_attempts {
        if predicate() {
            return Some(attempt);
        }
        if let Some(delay) = budget.delay {
            std::thread::sleep(delay);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_counts_polls() {
        let mut polls = 0;
        let budget = PollBudget::new(10);
        assert_eq!(
            until(&budget, || {
                polls += 1;
                polls == 4
            }),
            Some(4)
        );
    }

    #[test]
    fn test_until_times_out() {
        let mut polls = 0;
        assert_eq!(
            until(&PollBudget::new(3), || {
                polls += 1;
                false
            }),
            None
        );
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_zero_budget_never_polls() {
        assert_eq!(until(&PollBudget::new(0), || true), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PollBudget::aes_default().max_attempts, 1_000_000);
        assert_eq!(
            PollBudget::aes_default().delay,
            Some(Duration::from_micros(1))
        );
        assert_eq!(PollBudget::trng_default().delay, None);
    }
}
