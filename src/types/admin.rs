use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

use super::EventKind;

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct TestEndpointRequest {
    pub url: String,
    pub secret: Option<String>,
    pub timeout_secs: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct TestEndpointResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct SendTestEventRequest {
    pub event: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct SendTestEventResponse {
    pub event_id: Uuid,
    pub event: EventKind,
    pub matched_subscriptions: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct EventKindsResponse {
    pub events: Vec<EventKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum InboundStatus {
    Forwarded,
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct InboundResponse {
    pub status: InboundStatus,
    pub event_id: Option<Uuid>,
    pub event: Option<EventKind>,
    pub matched_subscriptions: usize,
}
