use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use crate::{
    error::ApiError,
    inbound::{InboundError, InboundOutcome},
    state::AppState,
    types::{InboundResponse, InboundStatus},
};

/// Provider-facing endpoint. The body is taken as raw bytes so the
/// signature is checked against exactly what was sent.
pub async fn inbound_webhook_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundResponse>, ApiError> {
    let provider = provider.to_ascii_lowercase();
    let outcome = state
        .receiver
        .receive(&provider, &headers, &body)
        .await
        .map_err(map_inbound_error)?;

    let response = match outcome {
        InboundOutcome::Forwarded {
            event_id,
            kind,
            matched,
        } => InboundResponse {
            status: InboundStatus::Forwarded,
            event_id: Some(event_id),
            event: Some(kind),
            matched_subscriptions: matched,
        },
        InboundOutcome::Ignored { .. } => InboundResponse {
            status: InboundStatus::Ignored,
            event_id: None,
            event: None,
            matched_subscriptions: 0,
        },
    };
    Ok(Json(response))
}

fn map_inbound_error(err: InboundError) -> ApiError {
    match err {
        InboundError::Unauthenticated(reason) => ApiError::unauthorized(reason),
        InboundError::InvalidPayload(message) => ApiError::validation(message),
        InboundError::Dispatch(err) => super::map_dispatch_error(err),
    }
}
