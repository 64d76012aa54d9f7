use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use specta::Type;

/// Internal business events eligible for webhook fan-out.
///
/// Wire tags are `domain.action`. Provider-specific tags never appear here;
/// they are translated at the inbound boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type,
)]
pub enum EventKind {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.updated")]
    OrderUpdated,
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged,
    #[serde(rename = "order.paid")]
    OrderPaid,
    #[serde(rename = "order.shipped")]
    OrderShipped,
    #[serde(rename = "order.delivered")]
    OrderDelivered,
    #[serde(rename = "order.cancelled")]
    OrderCancelled,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.blocked")]
    UserBlocked,
    #[serde(rename = "user.verified")]
    UserVerified,
    #[serde(rename = "subscription.created")]
    SubscriptionCreated,
    #[serde(rename = "subscription.renewed")]
    SubscriptionRenewed,
    #[serde(rename = "subscription.expired")]
    SubscriptionExpired,
    #[serde(rename = "subscription.cancelled")]
    SubscriptionCancelled,
    #[serde(rename = "payment.received")]
    PaymentReceived,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "payment.refunded")]
    PaymentRefunded,
    #[serde(rename = "inventory.low")]
    InventoryLow,
    #[serde(rename = "inventory.out_of_stock")]
    InventoryOutOfStock,
    #[serde(rename = "system.maintenance")]
    SystemMaintenance,
    #[serde(rename = "system.error")]
    SystemError,
}

impl EventKind {
    pub const ALL: [EventKind; 22] = [
        EventKind::OrderCreated,
        EventKind::OrderUpdated,
        EventKind::OrderStatusChanged,
        EventKind::OrderPaid,
        EventKind::OrderShipped,
        EventKind::OrderDelivered,
        EventKind::OrderCancelled,
        EventKind::UserCreated,
        EventKind::UserUpdated,
        EventKind::UserBlocked,
        EventKind::UserVerified,
        EventKind::SubscriptionCreated,
        EventKind::SubscriptionRenewed,
        EventKind::SubscriptionExpired,
        EventKind::SubscriptionCancelled,
        EventKind::PaymentReceived,
        EventKind::PaymentFailed,
        EventKind::PaymentRefunded,
        EventKind::InventoryLow,
        EventKind::InventoryOutOfStock,
        EventKind::SystemMaintenance,
        EventKind::SystemError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order.created",
            EventKind::OrderUpdated => "order.updated",
            EventKind::OrderStatusChanged => "order.status_changed",
            EventKind::OrderPaid => "order.paid",
            EventKind::OrderShipped => "order.shipped",
            EventKind::OrderDelivered => "order.delivered",
            EventKind::OrderCancelled => "order.cancelled",
            EventKind::UserCreated => "user.created",
            EventKind::UserUpdated => "user.updated",
            EventKind::UserBlocked => "user.blocked",
            EventKind::UserVerified => "user.verified",
            EventKind::SubscriptionCreated => "subscription.created",
            EventKind::SubscriptionRenewed => "subscription.renewed",
            EventKind::SubscriptionExpired => "subscription.expired",
            EventKind::SubscriptionCancelled => "subscription.cancelled",
            EventKind::PaymentReceived => "payment.received",
            EventKind::PaymentFailed => "payment.failed",
            EventKind::PaymentRefunded => "payment.refunded",
            EventKind::InventoryLow => "inventory.low",
            EventKind::InventoryOutOfStock => "inventory.out_of_stock",
            EventKind::SystemMaintenance => "system.maintenance",
            EventKind::SystemError => "system.error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownEventKind(value.to_string()))
    }
}
