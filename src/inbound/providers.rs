use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::types::EventKind;

/// A provider event translated into the internal taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub kind: EventKind,
    pub data: Value,
}

/// Translates one provider's vocabulary into [`EventKind`]s.
pub trait ProviderNormalizer: Send + Sync {
    fn name(&self) -> &str;

    /// Event type embedded in the body, used when the request carries no
    /// event header.
    fn event_type(&self, body: &Value) -> Option<String>;

    /// `None` when the provider event has no internal counterpart.
    fn normalize(&self, event_type: &str, body: &Value) -> Option<NormalizedEvent>;
}

/// Table-driven normaliser: a fixed provider-event → kind mapping, a body
/// field holding the event type, and a JSON pointer to the business object.
#[derive(Debug, Clone)]
pub struct VocabularyProvider {
    name: String,
    type_field: String,
    object_pointer: String,
    mappings: HashMap<String, EventKind>,
}

impl VocabularyProvider {
    pub fn new(
        name: impl Into<String>,
        type_field: impl Into<String>,
        object_pointer: impl Into<String>,
        mappings: &[(&str, EventKind)],
    ) -> Self {
        Self {
            name: name.into(),
            type_field: type_field.into(),
            object_pointer: object_pointer.into(),
            mappings: mappings
                .iter()
                .map(|(event, kind)| ((*event).to_string(), *kind))
                .collect(),
        }
    }

    pub fn stripe() -> Self {
        Self::new(
            "stripe",
            "type",
            "/data/object",
            &[
                ("payment_intent.succeeded", EventKind::PaymentReceived),
                ("charge.succeeded", EventKind::PaymentReceived),
                ("payment_intent.payment_failed", EventKind::PaymentFailed),
                ("charge.failed", EventKind::PaymentFailed),
                ("charge.refunded", EventKind::PaymentRefunded),
                ("invoice.paid", EventKind::SubscriptionRenewed),
                ("customer.subscription.created", EventKind::SubscriptionCreated),
                ("customer.subscription.deleted", EventKind::SubscriptionCancelled),
            ],
        )
    }

    pub fn paypal() -> Self {
        Self::new(
            "paypal",
            "event_type",
            "/resource",
            &[
                ("PAYMENT.CAPTURE.COMPLETED", EventKind::PaymentReceived),
                ("PAYMENT.CAPTURE.DENIED", EventKind::PaymentFailed),
                ("PAYMENT.CAPTURE.REFUNDED", EventKind::PaymentRefunded),
                ("BILLING.SUBSCRIPTION.CANCELLED", EventKind::SubscriptionCancelled),
                ("BILLING.SUBSCRIPTION.EXPIRED", EventKind::SubscriptionExpired),
            ],
        )
    }

    /// Carrier aggregator feed.
    pub fn shipping() -> Self {
        Self::new(
            "shipping",
            "type",
            "/data",
            &[
                ("shipment.in_transit", EventKind::OrderShipped),
                ("shipment.shipped", EventKind::OrderShipped),
                ("shipment.delivered", EventKind::OrderDelivered),
                ("shipment.exception", EventKind::OrderStatusChanged),
            ],
        )
    }
}

impl ProviderNormalizer for VocabularyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self, body: &Value) -> Option<String> {
        body.get(&self.type_field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn normalize(&self, event_type: &str, body: &Value) -> Option<NormalizedEvent> {
        let kind = *self.mappings.get(event_type)?;
        let object = body
            .pointer(&self.object_pointer)
            .cloned()
            .unwrap_or(Value::Null);

        Some(NormalizedEvent {
            kind,
            data: json!({
                "provider": self.name,
                "provider_event": event_type,
                "object": object,
            }),
        })
    }
}

/// Registration table of provider normalisers keyed by provider name.
#[derive(Clone, Default)]
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn ProviderNormalizer>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut router = Self::new();
        router.register(VocabularyProvider::stripe());
        router.register(VocabularyProvider::paypal());
        router.register(VocabularyProvider::shipping());
        router
    }

    /// Replaces any normaliser already registered under the same name.
    pub fn register(&mut self, provider: impl ProviderNormalizer + 'static) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, provider: &str) -> Option<&Arc<dyn ProviderNormalizer>> {
        self.providers.get(provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Resolve and translate an inbound event. A declared type (from the
    /// request headers) wins over the one embedded in the body.
    pub fn route(
        &self,
        provider: &str,
        declared_type: Option<&str>,
        body: &Value,
    ) -> Option<NormalizedEvent> {
        let normalizer = self.providers.get(provider)?;
        let event_type = match declared_type {
            Some(event_type) => event_type.to_string(),
            None => normalizer.event_type(body)?,
        };
        normalizer.normalize(&event_type, body)
    }
}
