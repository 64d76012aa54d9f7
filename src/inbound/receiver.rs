use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::dispatcher::{DispatchError, Dispatcher, EVENT_HEADER};
use crate::signature::{self, SIGNATURE_HEADER, SIGNATURE_HEADER_ALT};
use crate::types::EventKind;

use super::providers::{ProviderNormalizer, ProviderRouter};

pub const EVENT_HEADER_ALT: &str = "x-event-type";

/// Where normalised inbound events go.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, kind: EventKind, data: Value) -> Result<EmitReceipt, DispatchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitReceipt {
    pub event_id: Uuid,
    pub matched: usize,
}

#[async_trait]
impl EventSink for Dispatcher {
    async fn emit(&self, kind: EventKind, data: Value) -> Result<EmitReceipt, DispatchError> {
        let handle = Dispatcher::emit(self, kind, data).await?;
        Ok(EmitReceipt {
            event_id: handle.event_id,
            matched: handle.matched(),
        })
    }
}

#[derive(Debug, Error)]
pub enum InboundError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to dispatch event: {0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Forwarded {
        event_id: Uuid,
        kind: EventKind,
        matched: usize,
    },
    /// Authenticated, but the provider or event has no internal mapping.
    Ignored {
        event_type: Option<String>,
    },
}

#[derive(Clone)]
pub struct InboundReceiver {
    secrets: HashMap<String, String>,
    router: Arc<ProviderRouter>,
    sink: Arc<dyn EventSink>,
}

impl InboundReceiver {
    pub fn new(
        secrets: HashMap<String, String>,
        router: ProviderRouter,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            secrets,
            router: Arc::new(router),
            sink,
        }
    }

    /// Authenticate, translate and forward one provider callback.
    ///
    /// Nothing in the body is looked at until the signature over the raw
    /// bytes has been verified.
    pub async fn receive(
        &self,
        provider: &str,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> Result<InboundOutcome, InboundError> {
        let Some(secret) = self.secrets.get(provider).filter(|s| !s.is_empty()) else {
            tracing::warn!(provider, "inbound webhook for provider without a secret");
            return Err(InboundError::Unauthenticated("unknown provider"));
        };

        let Some(provided) = header_str(headers, SIGNATURE_HEADER)
            .or_else(|| header_str(headers, SIGNATURE_HEADER_ALT))
        else {
            tracing::warn!(provider, "inbound webhook without signature");
            return Err(InboundError::Unauthenticated("missing signature"));
        };

        if !signature::verify(raw_body, provided, secret) {
            tracing::warn!(provider, "inbound webhook signature mismatch");
            return Err(InboundError::Unauthenticated("invalid signature"));
        }

        let body: Value = serde_json::from_slice(raw_body)
            .map_err(|err| InboundError::InvalidPayload(err.to_string()))?;

        let declared =
            header_str(headers, EVENT_HEADER).or_else(|| header_str(headers, EVENT_HEADER_ALT));

        let Some(normalized) = self.router.route(provider, declared, &body) else {
            let event_type = declared.map(str::to_string).or_else(|| {
                self.router
                    .get(provider)
                    .and_then(|normalizer| normalizer.event_type(&body))
            });
            tracing::info!(
                provider,
                event_type = event_type.as_deref().unwrap_or("unknown"),
                "ignoring unmapped inbound event"
            );
            return Ok(InboundOutcome::Ignored { event_type });
        };

        let kind = normalized.kind;
        let receipt = self.sink.emit(kind, normalized.data).await?;

        tracing::info!(
            provider,
            event = %kind,
            event_id = %receipt.event_id,
            matched = receipt.matched,
            "forwarded inbound event"
        );

        Ok(InboundOutcome::Forwarded {
            event_id: receipt.event_id,
            kind,
            matched: receipt.matched,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
