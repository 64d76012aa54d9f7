use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::{
    error::ApiError,
    extractors::{IdPath, ValidJson, ValidQuery},
    registry,
    state::AppState,
    types::{
        CreateSubscriptionRequest, CreateSubscriptionResponse, EventKind, EventKindsResponse,
        ListSubscriptionsResponse, SubscriptionResponse, TestEndpointResult,
        UpdateSubscriptionRequest,
    },
};

use super::{map_dispatch_error, map_registry_error};

#[derive(Debug, Deserialize)]
pub struct ListSubscriptionsQuery {
    active_only: Option<bool>,
}

pub async fn list_event_kinds_handler() -> Json<EventKindsResponse> {
    Json(EventKindsResponse {
        events: EventKind::ALL.to_vec(),
    })
}

pub async fn create_subscription_handler(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<CreateSubscriptionResponse>), ApiError> {
    let sub = registry::create(&state.pool, &req)
        .await
        .map_err(map_registry_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSubscriptionResponse {
            id: sub.id,
            subscription: SubscriptionResponse::from(&sub),
        }),
    ))
}

pub async fn list_subscriptions_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListSubscriptionsQuery>,
) -> Result<Json<ListSubscriptionsResponse>, ApiError> {
    let subscriptions = registry::list(&state.pool, query.active_only.unwrap_or(false))
        .await
        .map_err(map_registry_error)?;

    Ok(Json(ListSubscriptionsResponse {
        subscriptions: subscriptions.iter().map(SubscriptionResponse::from).collect(),
    }))
}

pub async fn get_subscription_handler(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let sub = registry::get(&state.pool, id)
        .await
        .map_err(map_registry_error)?;
    Ok(Json(SubscriptionResponse::from(&sub)))
}

pub async fn update_subscription_handler(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidJson(req): ValidJson<UpdateSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let sub = registry::update(&state.pool, id, &req)
        .await
        .map_err(map_registry_error)?;
    Ok(Json(SubscriptionResponse::from(&sub)))
}

pub async fn delete_subscription_handler(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<StatusCode, ApiError> {
    registry::delete(&state.pool, id)
        .await
        .map_err(map_registry_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Probe a stored subscription's endpoint with its own secret and timeout.
pub async fn test_subscription_handler(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Json<TestEndpointResult>, ApiError> {
    let sub = registry::get(&state.pool, id)
        .await
        .map_err(map_registry_error)?;

    let result = state
        .dispatcher
        .test_endpoint(&sub.target_url, sub.secret.as_deref(), sub.timeout)
        .await
        .map_err(map_dispatch_error)?;
    Ok(Json(result))
}
