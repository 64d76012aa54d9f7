pub mod admin;
pub mod api_error;
pub mod delivery_log;
pub mod envelope;
pub mod event_kind;
pub mod subscription;

#[allow(unused_imports)]
pub use admin::{
    EventKindsResponse, InboundResponse, InboundStatus, SendTestEventRequest,
    SendTestEventResponse, TestEndpointRequest, TestEndpointResult,
};
#[allow(unused_imports)]
pub use api_error::{ApiErrorCode, ApiErrorResponse};
#[allow(unused_imports)]
pub use delivery_log::{DeliveryErrorKind, DeliveryLog, DeliveryStats, ListLogsResponse};
#[allow(unused_imports)]
pub use envelope::WebhookEnvelope;
#[allow(unused_imports)]
pub use event_kind::{EventKind, UnknownEventKind};
#[allow(unused_imports)]
pub use subscription::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, ListSubscriptionsResponse,
    SubscriptionResponse, UpdateSubscriptionRequest,
};
