mod backoff;
mod config;
mod request;
mod service;
mod state;

pub use backoff::BackoffPolicy;
pub use config::DispatcherConfig;
pub use request::{
    ATTEMPT_HEADER, EVENT_HEADER, EVENT_ID_HEADER, RESERVED_HEADERS, TIMESTAMP_HEADER,
};
pub use service::{DeliveryOutcome, DispatchError, Dispatcher, EmitHandle};
pub use state::DeliveryState;
