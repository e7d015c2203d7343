//! Order history log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use novus_core::{OrderId, UserId};

use crate::order::{OrderAmended, OrderEvent, OrderStatus};

/// One line of an order's history: who moved it to which status, and when.
///
/// `changed_by_name` is the display name the user had at the time, kept so
/// the log stays readable without a user directory.
///
/// An entry with status `Delivered` is the order's delivery record; there is
/// at most one per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_by: UserId,
    pub changed_by_name: String,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// History line for an event, if the event is one that gets logged.
    pub fn for_event(
        event: &OrderEvent,
        changed_by: UserId,
        changed_by_name: &str,
    ) -> Option<Self> {
        let (order_id, status, notes) = match event {
            OrderEvent::OrderPlaced(e) => (
                e.order_id,
                OrderStatus::Pending,
                format!("Order '{}' created for {} unit(s)", e.name, e.quantity),
            ),
            OrderEvent::OrderAmended(e) => (
                e.order_id,
                OrderStatus::Pending,
                amended_notes(e),
            ),
            OrderEvent::OrderApproved(e) => {
                let consumed = e
                    .deductions
                    .iter()
                    .map(|d| format!("{} {}", d.amount, d.material))
                    .collect::<Vec<_>>()
                    .join(", ");
                let prefix = if e.reapproved { "Re-approved" } else { "Approved" };
                (
                    e.order_id,
                    OrderStatus::Approved,
                    format!("{prefix}; consumed {consumed}"),
                )
            }
            OrderEvent::OrderCancelled(e) => (
                e.order_id,
                OrderStatus::Cancelled,
                "Order cancelled".to_string(),
            ),
            OrderEvent::OrderDelivered(e) => (
                e.order_id,
                OrderStatus::Delivered,
                format!(
                    "Order {} has been delivered to client {}",
                    e.order_id, e.client_id
                ),
            ),
            OrderEvent::OrderDeleted(_) => return None,
        };

        Some(Self {
            order_id,
            status,
            changed_by,
            changed_by_name: changed_by_name.to_string(),
            notes,
            recorded_at: event.occurred_at(),
        })
    }
}

fn amended_notes(e: &OrderAmended) -> String {
    let mut changed = Vec::new();
    if e.name.is_some() {
        changed.push("name");
    }
    if e.product_id.is_some() {
        changed.push("product");
    }
    if e.client_id.is_some() {
        changed.push("client");
    }
    if e.quantity.is_some() {
        changed.push("quantity");
    }
    if e.deadline.is_some() {
        changed.push("deadline");
    }
    format!("Order details updated: {}", changed.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::order::{OrderCancelled, OrderDeleted};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap()
    }

    #[test]
    fn entry_keeps_user_name_and_event_time() {
        let order_id = OrderId::new();
        let user = UserId::new();
        let event = OrderEvent::OrderCancelled(OrderCancelled {
            order_id,
            occurred_at: at(),
        });

        let entry = HistoryEntry::for_event(&event, user, "Dana").unwrap();
        assert_eq!(entry.order_id, order_id);
        assert_eq!(entry.status, OrderStatus::Cancelled);
        assert_eq!(entry.changed_by, user);
        assert_eq!(entry.changed_by_name, "Dana");
        assert_eq!(entry.recorded_at, at());
    }

    #[test]
    fn amendment_notes_list_changed_fields() {
        let event = OrderEvent::OrderAmended(OrderAmended {
            order_id: OrderId::new(),
            name: None,
            product_id: Some(novus_core::ProductId::new()),
            client_id: Some(novus_core::ClientId::new()),
            quantity: None,
            deadline: None,
            required: None,
            occurred_at: at(),
        });

        let entry = HistoryEntry::for_event(&event, UserId::new(), "Dana").unwrap();
        assert_eq!(entry.notes, "Order details updated: product, client");
    }

    #[test]
    fn deletions_are_not_logged() {
        let event = OrderEvent::OrderDeleted(OrderDeleted {
            order_id: OrderId::new(),
            occurred_at: at(),
        });
        assert!(HistoryEntry::for_event(&event, UserId::new(), "Dana").is_none());
    }
}
