use sqlx::{QueryBuilder, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{DeliveryErrorKind, DeliveryLog, DeliveryStats, EventKind};

#[derive(Debug, Error)]
pub enum DeliveryLogError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt delivery log row: {0}")]
    Parse(String),
}

/// A record of one finished attempt, written once and never updated.
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub subscription_id: Uuid,
    pub event_id: Uuid,
    pub event_kind: EventKind,
    pub attempt_number: u32,
    pub success: bool,
    pub response_status: Option<u16>,
    pub error_kind: Option<DeliveryErrorKind>,
    pub error_message: Option<String>,
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub attempted_at: String,
    pub next_retry_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogCursor {
    pub attempted_at: String,
    pub id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ListLogsParams {
    pub subscription_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub limit: i64,
    pub before: Option<LogCursor>,
}

#[derive(Debug, Clone)]
pub struct ListLogsResult {
    pub logs: Vec<DeliveryLog>,
    pub next_before: Option<LogCursor>,
}

pub async fn append(pool: &SqlitePool, entry: &NewDeliveryLog) -> Result<Uuid, DeliveryLogError> {
    let id = Uuid::new_v4();
    let duration_ms = i64::try_from(entry.duration_ms).unwrap_or(i64::MAX);

    sqlx::query(
        r"
        INSERT INTO webhook_delivery_logs (
            id,
            subscription_id,
            event_id,
            event_kind,
            attempt_number,
            success,
            response_status,
            error_kind,
            error_message,
            response_body,
            duration_ms,
            attempted_at,
            next_retry_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(id.to_string())
    .bind(entry.subscription_id.to_string())
    .bind(entry.event_id.to_string())
    .bind(entry.event_kind.as_str())
    .bind(i64::from(entry.attempt_number))
    .bind(entry.success)
    .bind(entry.response_status.map(i64::from))
    .bind(entry.error_kind.map(error_kind_to_str))
    .bind(entry.error_message.as_deref())
    .bind(entry.response_body.as_deref())
    .bind(duration_ms)
    .bind(&entry.attempted_at)
    .bind(entry.next_retry_at.as_deref())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Newest first, optionally narrowed to one subscription and/or event.
pub async fn list_logs(
    pool: &SqlitePool,
    params: &ListLogsParams,
) -> Result<ListLogsResult, DeliveryLogError> {
    let mut query = QueryBuilder::new(
        "SELECT \
            id, \
            subscription_id, \
            event_id, \
            event_kind, \
            attempt_number, \
            success, \
            response_status, \
            error_kind, \
            error_message, \
            response_body, \
            duration_ms, \
            attempted_at, \
            next_retry_at \
        FROM webhook_delivery_logs \
        WHERE 1 = 1",
    );

    if let Some(subscription_id) = params.subscription_id {
        query.push(" AND subscription_id = ");
        query.push_bind(subscription_id.to_string());
    }

    if let Some(event_id) = params.event_id {
        query.push(" AND event_id = ");
        query.push_bind(event_id.to_string());
    }

    if let Some(cursor) = &params.before {
        query.push(" AND (attempted_at < ");
        query.push_bind(&cursor.attempted_at);
        query.push(" OR (attempted_at = ");
        query.push_bind(&cursor.attempted_at);
        query.push(" AND id < ");
        query.push_bind(cursor.id.to_string());
        query.push("))");
    }

    query.push(" ORDER BY attempted_at DESC, id DESC LIMIT ");
    query.push_bind(params.limit + 1);

    let rows: Vec<LogRow> = query.build_query_as().fetch_all(pool).await?;

    let limit = usize::try_from(params.limit).unwrap_or(0);
    let has_more = rows.len() > limit;

    let mut logs = Vec::with_capacity(rows.len().min(limit));
    for row in rows.into_iter().take(limit) {
        logs.push(DeliveryLog::try_from(row)?);
    }

    let next_before = if has_more {
        logs.last().map(|log| LogCursor {
            attempted_at: log.attempted_at.clone(),
            id: log.id,
        })
    } else {
        None
    };

    Ok(ListLogsResult { logs, next_before })
}

/// Every attempt for one (subscription, event) chain in attempt order.
pub async fn list_chain(
    pool: &SqlitePool,
    subscription_id: Uuid,
    event_id: Uuid,
) -> Result<Vec<DeliveryLog>, DeliveryLogError> {
    let rows = sqlx::query_as::<_, LogRow>(
        r"
        SELECT
            id,
            subscription_id,
            event_id,
            event_kind,
            attempt_number,
            success,
            response_status,
            error_kind,
            error_message,
            response_body,
            duration_ms,
            attempted_at,
            next_retry_at
        FROM webhook_delivery_logs
        WHERE subscription_id = ?
          AND event_id = ?
        ORDER BY attempt_number ASC
        ",
    )
    .bind(subscription_id.to_string())
    .bind(event_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DeliveryLog::try_from).collect()
}

/// Aggregates over chains that had at least one attempt at or after `since`.
/// Every attempt of such a chain is counted, including ones before `since`.
///
/// A chain is successful when any attempt succeeded, pending while its
/// latest record still schedules a retry, and failed otherwise.
pub async fn stats(pool: &SqlitePool, since: &str) -> Result<DeliveryStats, DeliveryLogError> {
    let row = sqlx::query_as::<_, StatsRow>(
        r"
        SELECT
            COUNT(*) AS total_deliveries,
            COALESCE(SUM(succeeded), 0) AS successful_deliveries,
            COALESCE(SUM(CASE WHEN succeeded = 0 AND settled = 0 THEN 1 ELSE 0 END), 0)
                AS pending_deliveries,
            COALESCE(SUM(attempts), 0) AS total_attempts
        FROM (
            SELECT
                MAX(success) AS succeeded,
                MAX(next_retry_at IS NULL) AS settled,
                COUNT(*) AS attempts
            FROM webhook_delivery_logs
            WHERE (subscription_id, event_id) IN (
                SELECT subscription_id, event_id
                FROM webhook_delivery_logs
                WHERE attempted_at >= ?
            )
            GROUP BY subscription_id, event_id
        )
        ",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    let average_attempts = if row.total_deliveries > 0 {
        row.total_attempts as f64 / row.total_deliveries as f64
    } else {
        0.0
    };

    Ok(DeliveryStats {
        since: since.to_string(),
        total_deliveries: row.total_deliveries,
        successful_deliveries: row.successful_deliveries,
        pending_deliveries: row.pending_deliveries,
        failed_deliveries: row.total_deliveries
            - row.successful_deliveries
            - row.pending_deliveries,
        total_attempts: row.total_attempts,
        average_attempts,
    })
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: String,
    subscription_id: String,
    event_id: String,
    event_kind: String,
    attempt_number: i64,
    success: bool,
    response_status: Option<i64>,
    error_kind: Option<String>,
    error_message: Option<String>,
    response_body: Option<String>,
    duration_ms: i64,
    attempted_at: String,
    next_retry_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total_deliveries: i64,
    successful_deliveries: i64,
    pending_deliveries: i64,
    total_attempts: i64,
}

impl TryFrom<LogRow> for DeliveryLog {
    type Error = DeliveryLogError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let error_kind = match row.error_kind.as_deref() {
            Some(kind) => Some(parse_error_kind(kind)?),
            None => None,
        };
        let response_status = match row.response_status {
            Some(status) => Some(u16::try_from(status).map_err(|_| {
                DeliveryLogError::Parse(format!("invalid response status: {status}"))
            })?),
            None => None,
        };

        Ok(DeliveryLog {
            id: parse_uuid("log id", &row.id)?,
            subscription_id: parse_uuid("subscription id", &row.subscription_id)?,
            event_id: parse_uuid("event id", &row.event_id)?,
            event_kind: row
                .event_kind
                .parse()
                .map_err(|err| DeliveryLogError::Parse(format!("{err}")))?,
            attempt_number: u32::try_from(row.attempt_number).map_err(|_| {
                DeliveryLogError::Parse(format!("invalid attempt number: {}", row.attempt_number))
            })?,
            success: row.success,
            response_status,
            error_kind,
            error_message: row.error_message,
            response_body: row.response_body,
            duration_ms: u64::try_from(row.duration_ms).unwrap_or(0),
            attempted_at: row.attempted_at,
            next_retry_at: row.next_retry_at,
        })
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DeliveryLogError> {
    Uuid::parse_str(value).map_err(|err| DeliveryLogError::Parse(format!("invalid {field}: {err}")))
}

fn error_kind_to_str(kind: DeliveryErrorKind) -> &'static str {
    match kind {
        DeliveryErrorKind::Timeout => "timeout",
        DeliveryErrorKind::Network => "network",
        DeliveryErrorKind::HttpStatus => "http_status",
    }
}

fn parse_error_kind(kind: &str) -> Result<DeliveryErrorKind, DeliveryLogError> {
    match kind {
        "timeout" => Ok(DeliveryErrorKind::Timeout),
        "network" => Ok(DeliveryErrorKind::Network),
        "http_status" => Ok(DeliveryErrorKind::HttpStatus),
        other => Err(DeliveryLogError::Parse(format!("unknown error kind: {other}"))),
    }
}
