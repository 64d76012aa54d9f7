mod store;

pub use store::{
    DeliveryLogError, ListLogsParams, ListLogsResult, LogCursor, NewDeliveryLog, append,
    list_chain, list_logs, stats,
};
