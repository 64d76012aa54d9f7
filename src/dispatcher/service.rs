use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::delivery_log::{self, NewDeliveryLog};
use crate::registry::{self, RegistryError, ValidationError, WebhookSubscription, validation};
use crate::signature;
use crate::time::{format_utc, now_utc};
use crate::types::{EventKind, TestEndpointResult, WebhookEnvelope};

use super::backoff::BackoffPolicy;
use super::config::DispatcherConfig;
use super::request::{self, AttemptOutcome, DeliveryHeaders};
use super::state::DeliveryState;

const TEST_EVENT: &str = "webhook.test";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to serialize event envelope: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fans emitted events out to matching subscriptions.
///
/// Cloning is cheap; clones share the HTTP client and the in-flight limit.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    pool: SqlitePool,
    config: DispatcherConfig,
    backoff: BackoffPolicy,
    http: reqwest::Client,
    in_flight: Semaphore,
}

/// An event serialized once; every attempt to every subscriber sends and
/// signs these exact bytes.
#[derive(Debug)]
struct PreparedEvent {
    id: Uuid,
    kind: EventKind,
    timestamp: String,
    body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub subscription_id: Uuid,
    pub event_id: Uuid,
    pub state: DeliveryState,
}

/// Returned by [`Dispatcher::emit`]. Dropping it detaches the pipelines;
/// they keep running to completion.
#[derive(Debug)]
pub struct EmitHandle {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub subscription_ids: Vec<Uuid>,
    tasks: Vec<JoinHandle<DeliveryOutcome>>,
}

impl EmitHandle {
    pub fn matched(&self) -> usize {
        self.subscription_ids.len()
    }

    /// Wait for every pipeline to reach `Success` or `Exhausted`.
    pub async fn wait(self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => tracing::error!(
                    event_id = %self.event_id,
                    error = %err,
                    "delivery pipeline task failed"
                ),
            }
        }
        outcomes
    }
}

impl Dispatcher {
    pub fn new(pool: SqlitePool, config: DispatcherConfig) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                backoff: config.backoff(),
                in_flight: Semaphore::new(config.max_in_flight.max(1)),
                config,
                http,
            }),
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Deliver an event to every active subscription whose event set
    /// contains `kind`, as of now. Subscriptions registered after the
    /// snapshot do not receive this event.
    pub async fn emit(
        &self,
        kind: EventKind,
        data: serde_json::Value,
    ) -> Result<EmitHandle, DispatchError> {
        let timestamp = now_utc();
        let envelope = WebhookEnvelope {
            event: kind.as_str().to_string(),
            data,
            timestamp: timestamp.clone(),
        };
        let event = Arc::new(PreparedEvent {
            id: Uuid::new_v4(),
            kind,
            timestamp,
            body: Bytes::from(serde_json::to_vec(&envelope)?),
        });

        let subscriptions = registry::list_matching(&self.inner.pool, kind).await?;

        if subscriptions.is_empty() {
            tracing::debug!(event_id = %event.id, event = %kind, "no subscriptions match event");
        } else {
            tracing::info!(
                event_id = %event.id,
                event = %kind,
                subscription_count = subscriptions.len(),
                "dispatching event"
            );
        }

        let subscription_ids = subscriptions.iter().map(|sub| sub.id).collect();
        let tasks = subscriptions
            .into_iter()
            .map(|sub| tokio::spawn(Arc::clone(&self.inner).run_pipeline(sub, Arc::clone(&event))))
            .collect();

        Ok(EmitHandle {
            event_id: event.id,
            kind,
            subscription_ids,
            tasks,
        })
    }

    /// One synchronous attempt with a synthetic payload. Neither the
    /// registry nor the delivery log is touched.
    pub async fn test_endpoint(
        &self,
        url: &str,
        secret: Option<&str>,
        timeout: Duration,
    ) -> Result<TestEndpointResult, DispatchError> {
        let url = validation::validate_target_url(url)?;
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        validation::validate_timeout_secs(timeout_secs)?;
        let secret = secret.map(validation::validate_secret).transpose()?;

        let timestamp = now_utc();
        let envelope = WebhookEnvelope {
            event: TEST_EVENT.to_string(),
            data: serde_json::json!({
                "message": "connectivity check",
                "test": true,
            }),
            timestamp: timestamp.clone(),
        };
        let body = Bytes::from(serde_json::to_vec(&envelope)?);
        let headers = request::build_headers(&DeliveryHeaders {
            extra: &Default::default(),
            event: TEST_EVENT,
            event_id: Uuid::new_v4(),
            attempt: 1,
            timestamp: &timestamp,
            signature: secret.as_deref().map(|secret| signature::sign(secret, &body)),
        });

        let outcome = request::send(
            &self.inner.http,
            &url,
            headers,
            body,
            timeout,
            self.inner.config.max_response_body_bytes,
        )
        .await;

        tracing::info!(
            target_url = %url,
            success = outcome.success,
            status = ?outcome.status,
            "endpoint test finished"
        );

        Ok(TestEndpointResult {
            success: outcome.success,
            status_code: outcome.status,
            latency_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            error: outcome.error_message,
        })
    }
}

impl Inner {
    async fn run_pipeline(
        self: Arc<Self>,
        sub: WebhookSubscription,
        event: Arc<PreparedEvent>,
    ) -> DeliveryOutcome {
        let mut state = DeliveryState::Pending;

        while !state.is_terminal() {
            state = match state {
                DeliveryState::Pending => state.next_attempt(),
                DeliveryState::Retrying { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    state.next_attempt()
                }
                DeliveryState::Attempting { attempt } => {
                    let attempted_at = now_utc();
                    let outcome = self.attempt(&sub, &event, attempt).await;
                    let next = state.record(outcome.success, sub.max_retries, |n| {
                        self.backoff.delay(n)
                    });
                    self.record(&sub, &event, attempt, &outcome, attempted_at, next)
                        .await;
                    next
                }
                DeliveryState::Success { .. } | DeliveryState::Exhausted { .. } => state,
            };
        }

        match state {
            DeliveryState::Success { attempt } => tracing::info!(
                subscription_id = %sub.id,
                event_id = %event.id,
                attempt,
                "webhook delivered"
            ),
            _ => tracing::warn!(
                subscription_id = %sub.id,
                event_id = %event.id,
                attempts = state.attempts(),
                "webhook delivery exhausted"
            ),
        }

        DeliveryOutcome {
            subscription_id: sub.id,
            event_id: event.id,
            state,
        }
    }

    async fn attempt(
        &self,
        sub: &WebhookSubscription,
        event: &PreparedEvent,
        attempt: u32,
    ) -> AttemptOutcome {
        // The permit covers the HTTP call only, never a backoff wait.
        let _permit = self.in_flight.acquire().await.ok();

        let headers = request::build_headers(&DeliveryHeaders {
            extra: &sub.headers,
            event: event.kind.as_str(),
            event_id: event.id,
            attempt,
            timestamp: &event.timestamp,
            signature: sub
                .secret
                .as_deref()
                .map(|secret| signature::sign(secret, &event.body)),
        });

        request::send(
            &self.http,
            &sub.target_url,
            headers,
            event.body.clone(),
            sub.timeout,
            self.config.max_response_body_bytes,
        )
        .await
    }

    /// Best effort: a failed write is logged and delivery carries on.
    async fn record(
        &self,
        sub: &WebhookSubscription,
        event: &PreparedEvent,
        attempt: u32,
        outcome: &AttemptOutcome,
        attempted_at: String,
        next: DeliveryState,
    ) {
        let next_retry_at = match next {
            DeliveryState::Retrying { delay, .. } => chrono::Duration::from_std(delay)
                .ok()
                .map(|delay| format_utc(Utc::now() + delay)),
            _ => None,
        };

        if !outcome.success {
            tracing::warn!(
                subscription_id = %sub.id,
                event_id = %event.id,
                attempt,
                status = ?outcome.status,
                error = outcome.error_message.as_deref().unwrap_or("unknown"),
                next_retry_at = next_retry_at.as_deref().unwrap_or("none"),
                "webhook attempt failed"
            );
        }

        let entry = NewDeliveryLog {
            subscription_id: sub.id,
            event_id: event.id,
            event_kind: event.kind,
            attempt_number: attempt,
            success: outcome.success,
            response_status: outcome.status,
            error_kind: outcome.error_kind,
            error_message: outcome.error_message.clone(),
            response_body: outcome.response_body.clone(),
            duration_ms: u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
            attempted_at,
            next_retry_at,
        };

        if let Err(err) = delivery_log::append(&self.pool, &entry).await {
            tracing::error!(
                subscription_id = %sub.id,
                event_id = %event.id,
                attempt,
                error = %err,
                "failed to write delivery log"
            );
        }
    }
}
