pub mod deliveries;
pub mod inbound;
pub mod subscriptions;
pub mod testing;

use crate::{
    delivery_log::DeliveryLogError, dispatcher::DispatchError, error::ApiError,
    registry::RegistryError,
};

fn map_registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::Validation(err) => ApiError::validation(err.0),
        RegistryError::NotFound(id) => ApiError::not_found(format!("subscription {id} not found")),
        RegistryError::Db(db) => ApiError::Db(db),
        RegistryError::Parse(message) => ApiError::internal(message),
    }
}

fn map_log_error(err: DeliveryLogError) -> ApiError {
    match err {
        DeliveryLogError::Db(db) => ApiError::Db(db),
        DeliveryLogError::Parse(message) => ApiError::internal(message),
    }
}

fn map_dispatch_error(err: DispatchError) -> ApiError {
    match err {
        DispatchError::Registry(err) => map_registry_error(err),
        DispatchError::Validation(err) => ApiError::validation(err.0),
        DispatchError::Serialize(err) => ApiError::internal(format!("serialization failed: {err}")),
        DispatchError::Client(err) => ApiError::internal(format!("http client error: {err}")),
    }
}
