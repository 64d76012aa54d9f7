use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::time::now_utc;
use crate::types::{CreateSubscriptionRequest, EventKind, UpdateSubscriptionRequest};

use super::WebhookSubscription;
use super::validation::{self, ValidatedSubscription, ValidationError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("subscription {0} not found")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt subscription row: {0}")]
    Parse(String),
}

const SELECT_COLUMNS: &str = "\
    id, target_url, events, secret, headers, max_retries, timeout_secs, active, \
    description, created_at, updated_at";

pub async fn create(
    pool: &SqlitePool,
    req: &CreateSubscriptionRequest,
) -> Result<WebhookSubscription, RegistryError> {
    let validated = validation::validate_create(req)?;
    let id = Uuid::new_v4();
    let now = now_utc();
    let (events, headers) = encode_sets(&validated)?;

    sqlx::query(
        r"
        INSERT INTO webhook_subscriptions (
            id,
            target_url,
            events,
            secret,
            headers,
            max_retries,
            timeout_secs,
            active,
            description,
            created_at,
            updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(id.to_string())
    .bind(&validated.target_url)
    .bind(&events)
    .bind(validated.secret.as_deref())
    .bind(&headers)
    .bind(i64::from(validated.max_retries))
    .bind(i64::from(validated.timeout_secs))
    .bind(validated.active)
    .bind(validated.description.as_deref())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(
        subscription_id = %id,
        target_url = %validated.target_url,
        events = validated.events.len(),
        "webhook subscription created"
    );

    Ok(assemble(id, validated, now.clone(), now))
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<WebhookSubscription, RegistryError> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM webhook_subscriptions WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(RegistryError::NotFound(id))?;

    row.try_into()
}

pub async fn update(
    pool: &SqlitePool,
    id: Uuid,
    req: &UpdateSubscriptionRequest,
) -> Result<WebhookSubscription, RegistryError> {
    let mut tx = pool.begin().await?;

    let current: WebhookSubscription = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM webhook_subscriptions WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(RegistryError::NotFound(id))?
    .try_into()?;

    let validated = validation::apply_update(&current, req)?;
    let (events, headers) = encode_sets(&validated)?;
    let now = now_utc();

    sqlx::query(
        r"
        UPDATE webhook_subscriptions
        SET target_url = ?,
            events = ?,
            secret = ?,
            headers = ?,
            max_retries = ?,
            timeout_secs = ?,
            active = ?,
            description = ?,
            updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(&validated.target_url)
    .bind(&events)
    .bind(validated.secret.as_deref())
    .bind(&headers)
    .bind(i64::from(validated.max_retries))
    .bind(i64::from(validated.timeout_secs))
    .bind(validated.active)
    .bind(validated.description.as_deref())
    .bind(&now)
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(subscription_id = %id, active = validated.active, "webhook subscription updated");

    Ok(assemble(id, validated, current.created_at, now))
}

/// Delivery logs referencing the subscription are left in place.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), RegistryError> {
    let result = sqlx::query("DELETE FROM webhook_subscriptions WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RegistryError::NotFound(id));
    }

    tracing::info!(subscription_id = %id, "webhook subscription deleted");
    Ok(())
}

/// All subscriptions in creation order.
pub async fn list(
    pool: &SqlitePool,
    active_only: bool,
) -> Result<Vec<WebhookSubscription>, RegistryError> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM webhook_subscriptions \
         WHERE (? = 0 OR active = 1) \
         ORDER BY created_at ASC, rowid ASC"
    ))
    .bind(active_only)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Active subscriptions whose event set contains `kind`.
pub async fn list_matching(
    pool: &SqlitePool,
    kind: EventKind,
) -> Result<Vec<WebhookSubscription>, RegistryError> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM webhook_subscriptions \
         WHERE active = 1 \
           AND EXISTS (SELECT 1 FROM json_each(webhook_subscriptions.events) e WHERE e.value = ?) \
         ORDER BY created_at ASC, rowid ASC"
    ))
    .bind(kind.as_str())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

fn encode_sets(validated: &ValidatedSubscription) -> Result<(String, String), RegistryError> {
    let events = serde_json::to_string(&validated.events)
        .map_err(|err| RegistryError::Parse(format!("invalid events JSON: {err}")))?;
    let headers = serde_json::to_string(&validated.headers)
        .map_err(|err| RegistryError::Parse(format!("invalid headers JSON: {err}")))?;
    Ok((events, headers))
}

fn assemble(
    id: Uuid,
    validated: ValidatedSubscription,
    created_at: String,
    updated_at: String,
) -> WebhookSubscription {
    WebhookSubscription {
        id,
        target_url: validated.target_url,
        events: validated.events,
        secret: validated.secret,
        headers: validated.headers,
        max_retries: validated.max_retries,
        timeout: Duration::from_secs(u64::from(validated.timeout_secs)),
        active: validated.active,
        description: validated.description,
        created_at,
        updated_at,
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    target_url: String,
    events: String,
    secret: Option<String>,
    headers: String,
    max_retries: i64,
    timeout_secs: i64,
    active: bool,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SubscriptionRow> for WebhookSubscription {
    type Error = RegistryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let events: BTreeSet<EventKind> = serde_json::from_str(&row.events)
            .map_err(|err| RegistryError::Parse(format!("invalid events JSON: {err}")))?;
        let headers: BTreeMap<String, String> = serde_json::from_str(&row.headers)
            .map_err(|err| RegistryError::Parse(format!("invalid headers JSON: {err}")))?;
        let max_retries = u32::try_from(row.max_retries)
            .map_err(|_| RegistryError::Parse(format!("invalid max_retries: {}", row.max_retries)))?;
        let timeout_secs = u64::try_from(row.timeout_secs).map_err(|_| {
            RegistryError::Parse(format!("invalid timeout_secs: {}", row.timeout_secs))
        })?;

        Ok(WebhookSubscription {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| RegistryError::Parse(format!("invalid subscription id: {err}")))?,
            target_url: row.target_url,
            events,
            secret: row.secret,
            headers,
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
            active: row.active,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
