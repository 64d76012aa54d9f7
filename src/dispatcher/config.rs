use std::time::Duration;

use super::backoff::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on delivery attempts in flight across all subscriptions.
    pub max_in_flight: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_jitter_ratio: f64,
    pub user_agent: String,
    pub max_response_body_bytes: usize,
}

impl DispatcherConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("RELAY_MAX_IN_FLIGHT")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.max_in_flight = parsed.max(1);
        }
        if let Ok(value) = std::env::var("RELAY_RETRY_BASE_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry_base_delay_ms = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_RETRY_MAX_DELAY_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.retry_max_delay_ms = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_RETRY_JITTER_RATIO")
            && let Ok(parsed) = value.parse::<f64>()
        {
            config.retry_jitter_ratio = parsed;
        }
        if let Ok(value) = std::env::var("RELAY_USER_AGENT")
            && !value.trim().is_empty()
        {
            config.user_agent = value;
        }

        config
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
            self.retry_jitter_ratio,
        )
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 32,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 300_000,
            retry_jitter_ratio: 0.25,
            user_agent: "relay-webhooks/0.1".to_string(),
            max_response_body_bytes: 4_096,
        }
    }
}
