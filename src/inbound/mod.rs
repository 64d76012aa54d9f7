//! Provider callbacks: authenticate, translate into the internal taxonomy,
//! hand off to the dispatcher.

mod providers;
mod receiver;

pub use providers::{NormalizedEvent, ProviderNormalizer, ProviderRouter, VocabularyProvider};
pub use receiver::{
    EVENT_HEADER_ALT, EmitReceipt, EventSink, InboundError, InboundOutcome, InboundReceiver,
};
