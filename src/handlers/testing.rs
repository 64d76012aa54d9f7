use std::time::Duration;

use axum::{Json, extract::State};
use serde_json::json;

use crate::{
    error::ApiError,
    extractors::ValidJson,
    registry::validation::DEFAULT_TIMEOUT_SECS,
    state::AppState,
    types::{
        EventKind, SendTestEventRequest, SendTestEventResponse, TestEndpointRequest,
        TestEndpointResult,
    },
};

use super::map_dispatch_error;

pub async fn test_endpoint_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TestEndpointRequest>,
) -> Result<Json<TestEndpointResult>, ApiError> {
    let timeout = Duration::from_secs(u64::from(
        req.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    ));

    let result = state
        .dispatcher
        .test_endpoint(&req.url, req.secret.as_deref(), timeout)
        .await
        .map_err(map_dispatch_error)?;
    Ok(Json(result))
}

/// Emit an operator-chosen event through the normal fan-out path. Returns
/// as soon as deliveries are scheduled.
pub async fn send_test_event_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<SendTestEventRequest>,
) -> Result<Json<SendTestEventResponse>, ApiError> {
    let kind: EventKind = req
        .event
        .trim()
        .parse()
        .map_err(|err| ApiError::validation(format!("{err}")))?;
    let data = req.data.unwrap_or_else(|| json!({ "test": true }));

    let handle = state
        .dispatcher
        .emit(kind, data)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(SendTestEventResponse {
        event_id: handle.event_id,
        event: handle.kind,
        matched_subscriptions: handle.subscription_ids,
    }))
}
