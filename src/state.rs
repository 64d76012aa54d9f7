use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{dispatcher::Dispatcher, inbound::InboundReceiver};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub dispatcher: Dispatcher,
    pub receiver: InboundReceiver,
    pub admin_api_token: Option<Arc<str>>,
}
