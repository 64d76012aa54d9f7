mod store;
pub mod validation;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use uuid::Uuid;

use crate::types::{EventKind, SubscriptionResponse};

pub use store::{RegistryError, create, delete, get, list, list_matching, update};
pub use validation::ValidationError;

/// A registered subscriber endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub target_url: String,
    pub events: BTreeSet<EventKind>,
    pub secret: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    pub timeout: Duration,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl WebhookSubscription {
    pub fn matches(&self, kind: EventKind) -> bool {
        self.active && self.events.contains(&kind)
    }

    pub fn timeout_secs(&self) -> u32 {
        u32::try_from(self.timeout.as_secs()).unwrap_or(u32::MAX)
    }
}

impl From<&WebhookSubscription> for SubscriptionResponse {
    fn from(sub: &WebhookSubscription) -> Self {
        Self {
            id: sub.id,
            target_url: sub.target_url.clone(),
            events: sub.events.iter().copied().collect(),
            has_secret: sub.secret.is_some(),
            headers: sub.headers.clone(),
            max_retries: sub.max_retries,
            timeout_secs: sub.timeout_secs(),
            active: sub.active,
            description: sub.description.clone(),
            created_at: sub.created_at.clone(),
            updated_at: sub.updated_at.clone(),
        }
    }
}
