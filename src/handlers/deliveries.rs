use axum::{Json, extract::State};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    delivery_log::{self, ListLogsParams, LogCursor},
    error::ApiError,
    extractors::ValidQuery,
    state::AppState,
    time::format_utc,
    types::{DeliveryStats, ListLogsResponse},
};

use super::map_log_error;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const DEFAULT_STATS_HOURS: i64 = 24;
const MAX_STATS_HOURS: i64 = 720;

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    subscription_id: Option<String>,
    event_id: Option<String>,
    limit: Option<i64>,
    before: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    attempted_at: String,
    id: String,
}

pub async fn list_logs_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ListLogsQuery>,
) -> Result<Json<ListLogsResponse>, ApiError> {
    let params = ListLogsParams {
        subscription_id: query
            .subscription_id
            .as_deref()
            .map(|raw| parse_uuid("subscription_id", raw))
            .transpose()?,
        event_id: query
            .event_id
            .as_deref()
            .map(|raw| parse_uuid("event_id", raw))
            .transpose()?,
        limit: parse_limit(query.limit)?,
        before: query.before.as_deref().map(decode_cursor).transpose()?,
    };

    let result = delivery_log::list_logs(&state.pool, &params)
        .await
        .map_err(map_log_error)?;
    let next_before = result.next_before.as_ref().map(encode_cursor).transpose()?;

    Ok(Json(ListLogsResponse {
        logs: result.logs,
        next_before,
    }))
}

pub async fn stats_handler(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<StatsQuery>,
) -> Result<Json<DeliveryStats>, ApiError> {
    let hours = query.hours.unwrap_or(DEFAULT_STATS_HOURS);
    if !(1..=MAX_STATS_HOURS).contains(&hours) {
        return Err(ApiError::validation(format!(
            "hours must be between 1 and {MAX_STATS_HOURS}"
        )));
    }

    let since = format_utc(Utc::now() - Duration::hours(hours));
    let stats = delivery_log::stats(&state.pool, &since)
        .await
        .map_err(map_log_error)?;
    Ok(Json(stats))
}

fn parse_limit(limit: Option<i64>) -> Result<i64, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::validation(format!("{field} must be a UUID")))
}

fn decode_cursor(raw: &str) -> Result<LogCursor, ApiError> {
    let invalid = || ApiError::validation("before must be a valid cursor");

    let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
    let payload: CursorPayload = serde_json::from_slice(&decoded).map_err(|_| invalid())?;
    DateTime::parse_from_rfc3339(&payload.attempted_at).map_err(|_| invalid())?;
    let id = Uuid::parse_str(&payload.id).map_err(|_| invalid())?;

    Ok(LogCursor {
        attempted_at: payload.attempted_at,
        id,
    })
}

fn encode_cursor(cursor: &LogCursor) -> Result<String, ApiError> {
    let payload = CursorPayload {
        attempted_at: cursor.attempted_at.clone(),
        id: cursor.id.to_string(),
    };
    let encoded = serde_json::to_vec(&payload)
        .map_err(|_| ApiError::internal("failed to encode cursor"))?;
    Ok(URL_SAFE_NO_PAD.encode(encoded))
}
