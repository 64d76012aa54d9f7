pub mod auth;
pub mod config;
pub mod delivery_log;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod inbound;
pub mod registry;
pub mod router;
pub mod signature;
pub mod state;
pub mod time;
pub mod types;
