//! Production orders domain module.
//!
//! Business rules for the order lifecycle (Pending → Approved → Delivered,
//! Pending → Cancelled, re-approval of cancelled orders), implemented purely
//! as deterministic domain logic (no IO, no storage).

pub mod client;
pub mod history;
pub mod order;

pub use client::{Client, ClientRef};
pub use history::HistoryEntry;
pub use order::{
    AmendOrder, ApproveOrder, CancelOrder, DeleteOrder, DeliverOrder, Order, OrderAmended,
    OrderApproved, OrderCancelled, OrderCommand, OrderDeleted, OrderDelivered, OrderEvent,
    OrderPlaced, OrderRecord, OrderStatus, PlaceOrder, StockDeduction,
};
