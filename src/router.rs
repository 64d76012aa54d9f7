use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    auth::admin_auth,
    handlers::{
        deliveries::{list_logs_handler, stats_handler},
        inbound::inbound_webhook_handler,
        subscriptions::{
            create_subscription_handler, delete_subscription_handler, get_subscription_handler,
            list_event_kinds_handler, list_subscriptions_handler, test_subscription_handler,
            update_subscription_handler,
        },
        testing::{send_test_event_handler, test_endpoint_handler},
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/webhooks/events", get(list_event_kinds_handler))
        .route(
            "/api/webhooks",
            get(list_subscriptions_handler).post(create_subscription_handler),
        )
        .route("/api/webhooks/logs", get(list_logs_handler))
        .route("/api/webhooks/stats", get(stats_handler))
        .route("/api/webhooks/test-endpoint", post(test_endpoint_handler))
        .route("/api/webhooks/send-test", post(send_test_event_handler))
        .route(
            "/api/webhooks/:id",
            get(get_subscription_handler)
                .patch(update_subscription_handler)
                .delete(delete_subscription_handler),
        )
        .route("/api/webhooks/:id/test", post(test_subscription_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route("/webhooks/inbound/:provider", post(inbound_webhook_handler))
        .merge(admin)
        .with_state(state)
}
