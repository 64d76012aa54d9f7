use std::time::Duration;

const MAX_JITTER_RATIO: f64 = 0.5;
const MAX_EXPONENT: u32 = 30;

/// Exponential backoff with multiplicative jitter.
///
/// `delay(n) = min(base * 2^(n-1) * (1 + jitter), cap)` with
/// `jitter` in `[0, ratio]` and `ratio <= 0.5`, so even a maximally
/// jittered delay stays below the next attempt's un-jittered one and the
/// sequence never shrinks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    jitter_ratio: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, jitter_ratio: f64) -> Self {
        let jitter_ratio = if jitter_ratio.is_finite() {
            jitter_ratio.clamp(0.0, MAX_JITTER_RATIO)
        } else {
            0.0
        };
        Self {
            base,
            cap: cap.max(base),
            jitter_ratio,
        }
    }

    pub fn without_jitter(base: Duration, cap: Duration) -> Self {
        Self::new(base, cap, 0.0)
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }

    /// `sample` is a uniform draw in `[0, 1]`.
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_EXPONENT);
        let factor = f64::from(1u32 << exponent);
        let jitter = 1.0 + self.jitter_ratio * sample.clamp(0.0, 1.0);
        let raw_ms = self.base.as_millis() as f64 * factor * jitter;
        let capped_ms = raw_ms.min(self.cap.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}
