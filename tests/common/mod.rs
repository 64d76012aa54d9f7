#![allow(dead_code, clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::{collections::HashMap, fs, sync::Arc, time::Duration};

use relay::{
    dispatcher::{Dispatcher, DispatcherConfig},
    inbound::{InboundReceiver, ProviderRouter},
    registry::{self, WebhookSubscription},
    state::AppState,
    types::CreateSubscriptionRequest,
};
use sqlx::{
    Connection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tempfile::NamedTempFile;

pub struct TestDb {
    pub pool: sqlx::SqlitePool,
    _db_file: NamedTempFile,
}

pub async fn setup_db() -> TestDb {
    let db_file = NamedTempFile::new().expect("create temp sqlite file");
    let options = SqliteConnectOptions::new()
        .filename(db_file.path())
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(500));

    let mut conn = sqlx::SqliteConnection::connect_with(&options)
        .await
        .expect("connect sqlite");

    let mut entries: Vec<_> = fs::read_dir("migrations")
        .expect("read migrations dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("sql"))
        .collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let contents = fs::read_to_string(entry.path()).expect("read migration");
        for stmt in contents.split(';') {
            let stmt = stmt.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(&mut conn)
                    .await
                    .expect("run migration");
            }
        }
    }
    conn.close().await.expect("close migration conn");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect pool");

    TestDb {
        pool,
        _db_file: db_file,
    }
}

/// Millisecond backoff without jitter so retry chains finish quickly.
pub fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 40,
        retry_jitter_ratio: 0.0,
        ..DispatcherConfig::default()
    }
}

pub fn dispatcher(pool: &sqlx::SqlitePool) -> Dispatcher {
    Dispatcher::new(pool.clone(), fast_config()).expect("build dispatcher")
}

pub fn subscription_request(target_url: &str, events: &[&str]) -> CreateSubscriptionRequest {
    CreateSubscriptionRequest {
        target_url: target_url.to_string(),
        events: events.iter().map(|e| (*e).to_string()).collect(),
        secret: None,
        headers: None,
        max_retries: None,
        timeout_secs: None,
        active: None,
        description: None,
    }
}

pub async fn subscribe(
    pool: &sqlx::SqlitePool,
    req: CreateSubscriptionRequest,
) -> WebhookSubscription {
    registry::create(pool, &req).await.expect("create subscription")
}

pub fn app_state(
    pool: &sqlx::SqlitePool,
    admin_token: Option<&str>,
    provider_secrets: &[(&str, &str)],
) -> AppState {
    let dispatcher = dispatcher(pool);
    let secrets: HashMap<String, String> = provider_secrets
        .iter()
        .map(|(provider, secret)| ((*provider).to_string(), (*secret).to_string()))
        .collect();
    let receiver = InboundReceiver::new(
        secrets,
        ProviderRouter::with_defaults(),
        Arc::new(dispatcher.clone()),
    );

    AppState {
        pool: pool.clone(),
        dispatcher,
        receiver,
        admin_api_token: admin_token.map(Arc::from),
    }
}

pub async fn count_logs(pool: &sqlx::SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM webhook_delivery_logs")
        .fetch_one(pool)
        .await
        .expect("count logs")
}

/// Poll until at least `expected` log rows exist.
pub async fn wait_for_logs(pool: &sqlx::SqlitePool, expected: i64) {
    for _ in 0..200 {
        if count_logs(pool).await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {expected} delivery log rows");
}
