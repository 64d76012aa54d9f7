use serde::{Deserialize, Serialize};
use specta::Type;

/// Body of every outbound webhook request.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}
