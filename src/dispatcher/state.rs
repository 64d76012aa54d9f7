use std::time::Duration;

/// Delivery state of one event for one subscription.
///
/// ```text
/// Pending -> Attempting(1)
/// Attempting(n) -> Success(n)                  on 2xx
/// Attempting(n) -> Retrying(n, delay)          on failure, n < max_retries + 1
/// Attempting(n) -> Exhausted(n)                on failure, n = max_retries + 1
/// Retrying(n, _) -> Attempting(n + 1)          once the delay has elapsed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Success { attempt: u32 },
    Exhausted { attempts: u32 },
}

impl DeliveryState {
    /// Leave `Pending` or `Retrying` for the next attempt. Other states are
    /// returned unchanged.
    pub fn next_attempt(self) -> Self {
        match self {
            DeliveryState::Pending => DeliveryState::Attempting { attempt: 1 },
            DeliveryState::Retrying { attempt, .. } => DeliveryState::Attempting {
                attempt: attempt.saturating_add(1),
            },
            other => other,
        }
    }

    /// Fold the result of the current attempt into the state. Only
    /// meaningful from `Attempting`; other states are returned unchanged.
    pub fn record(
        self,
        succeeded: bool,
        max_retries: u32,
        backoff: impl FnOnce(u32) -> Duration,
    ) -> Self {
        let DeliveryState::Attempting { attempt } = self else {
            return self;
        };

        if succeeded {
            return DeliveryState::Success { attempt };
        }

        let max_attempts = max_retries.saturating_add(1);
        if attempt < max_attempts {
            DeliveryState::Retrying {
                attempt,
                delay: backoff(attempt),
            }
        } else {
            DeliveryState::Exhausted { attempts: attempt }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryState::Success { .. } | DeliveryState::Exhausted { .. }
        )
    }

    /// Attempts made so far.
    pub fn attempts(self) -> u32 {
        match self {
            DeliveryState::Pending => 0,
            DeliveryState::Attempting { attempt } => attempt.saturating_sub(1),
            DeliveryState::Retrying { attempt, .. } | DeliveryState::Success { attempt } => attempt,
            DeliveryState::Exhausted { attempts } => attempts,
        }
    }
}
