use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

use super::EventKind;

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateSubscriptionRequest {
    pub target_url: String,
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub active: Option<bool>,
    pub description: Option<String>,
}

/// Partial update. Absent fields are left untouched; `clear_secret` drops
/// the signing secret so deliveries go out unsigned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
pub struct UpdateSubscriptionRequest {
    pub target_url: Option<String>,
    pub events: Option<Vec<String>>,
    pub secret: Option<String>,
    pub clear_secret: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub active: Option<bool>,
    pub description: Option<String>,
}

/// A subscription as exposed to admin callers. The secret itself is never
/// echoed back.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub target_url: String,
    pub events: Vec<EventKind>,
    pub has_secret: bool,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    pub timeout_secs: u32,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateSubscriptionResponse {
    pub id: Uuid,
    pub subscription: SubscriptionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListSubscriptionsResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
}
