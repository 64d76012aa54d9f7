use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

use super::EventKind;

/// One delivery attempt of one event to one subscription.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeliveryLog {
    pub id: Uuid,
    /// May reference a subscription that has since been deleted.
    pub subscription_id: Uuid,
    pub event_id: Uuid,
    pub event_kind: EventKind,
    pub attempt_number: u32,
    pub success: bool,
    pub response_status: Option<u16>,
    pub error_kind: Option<DeliveryErrorKind>,
    pub error_message: Option<String>,
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub attempted_at: String,
    pub next_retry_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    Timeout,
    Network,
    HttpStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListLogsResponse {
    pub logs: Vec<DeliveryLog>,
    pub next_before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct DeliveryStats {
    pub since: String,
    pub total_deliveries: i64,
    pub successful_deliveries: i64,
    /// Chains still waiting on a scheduled retry.
    pub pending_deliveries: i64,
    /// Chains that exhausted their retries without a success.
    pub failed_deliveries: i64,
    pub total_attempts: i64,
    pub average_attempts: f64,
}
