use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use novus_core::{Aggregate, AggregateRoot, ClientId, DomainError, OrderId, ProductId};
use novus_inventory::{Quantity, RequiredMaterials, StockLevels};
use novus_products::ProductStatus;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Approved,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Approved => "Approved",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown order status '{other}' \
                 (expected pending, approved, delivered or cancelled)"
            ))),
        }
    }
}

/// Stock to remove from one material when an order is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDeduction {
    pub material: String,
    pub amount: f64,
}

/// Plain, storable view of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub name: String,
    pub product_id: ProductId,
    pub client_id: ClientId,
    pub quantity: Quantity,
    pub deadline: NaiveDate,
    pub required: RequiredMaterials,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    name: String,
    product_id: Option<ProductId>,
    client_id: Option<ClientId>,
    quantity: Option<Quantity>,
    deadline: Option<NaiveDate>,
    required: RequiredMaterials,
    status: OrderStatus,
    created_at: Option<DateTime<Utc>>,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed order for `PlaceOrder` to fill in.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            name: String::new(),
            product_id: None,
            client_id: None,
            quantity: None,
            deadline: None,
            required: RequiredMaterials::default(),
            status: OrderStatus::Pending,
            created_at: None,
            created: false,
        }
    }

    /// Rebuild a placed order from its stored record.
    pub fn restore(record: OrderRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            product_id: Some(record.product_id),
            client_id: Some(record.client_id),
            quantity: Some(record.quantity),
            deadline: Some(record.deadline),
            required: record.required,
            status: record.status,
            created_at: Some(record.created_at),
            created: true,
        }
    }

    /// Storable view; `None` until the order has been placed.
    pub fn to_record(&self) -> Option<OrderRecord> {
        if !self.created {
            return None;
        }
        Some(OrderRecord {
            id: self.id,
            name: self.name.clone(),
            product_id: self.product_id?,
            client_id: self.client_id?,
            quantity: self.quantity?,
            deadline: self.deadline?,
            required: self.required.clone(),
            status: self.status,
            created_at: self.created_at?,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn quantity(&self) -> Option<Quantity> {
        self.quantity
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }

    /// Materials snapshot taken when the order was placed (or last amended).
    pub fn required(&self) -> &RequiredMaterials {
        &self.required
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: PlaceOrder.
///
/// `required` must be computed from the product's current materials and
/// `quantity`; it becomes the order's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub name: String,
    pub product_id: ProductId,
    pub client_id: ClientId,
    pub quantity: Quantity,
    pub deadline: NaiveDate,
    pub required: RequiredMaterials,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendOrder. `None` fields are left unchanged.
///
/// A new `product_id` or `quantity` must come with the matching recomputed
/// `required`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendOrder {
    pub order_id: OrderId,
    pub name: Option<String>,
    pub product_id: Option<ProductId>,
    pub client_id: Option<ClientId>,
    pub quantity: Option<Quantity>,
    pub deadline: Option<NaiveDate>,
    pub required: Option<RequiredMaterials>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveOrder.
///
/// Carries what the decision depends on: the product's status and the stock
/// levels of the order's materials read inside the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproveOrder {
    pub order_id: OrderId,
    pub product_status: ProductStatus,
    pub stock: StockLevels,
    /// User confirmed approving an order that was cancelled.
    pub confirm_reapproval: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeliverOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverOrder {
    pub order_id: OrderId,
    /// A delivery record for this order already exists in the history log.
    pub delivery_recorded: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    AmendOrder(AmendOrder),
    ApproveOrder(ApproveOrder),
    CancelOrder(CancelOrder),
    DeliverOrder(DeliverOrder),
    DeleteOrder(DeleteOrder),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub name: String,
    pub product_id: ProductId,
    pub client_id: ClientId,
    pub quantity: Quantity,
    pub deadline: NaiveDate,
    pub required: RequiredMaterials,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAmended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAmended {
    pub order_id: OrderId,
    pub name: Option<String>,
    pub product_id: Option<ProductId>,
    pub client_id: Option<ClientId>,
    pub quantity: Option<Quantity>,
    pub deadline: Option<NaiveDate>,
    pub required: Option<RequiredMaterials>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderApproved.
///
/// `deductions` lists every material to decrement; the caller applies all of
/// them together with the status change or none at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderApproved {
    pub order_id: OrderId,
    pub deductions: Vec<StockDeduction>,
    pub reapproved: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderAmended(OrderAmended),
    OrderApproved(OrderApproved),
    OrderCancelled(OrderCancelled),
    OrderDelivered(OrderDelivered),
    OrderDeleted(OrderDeleted),
}

impl OrderEvent {
    /// Stable event name (e.g. for log fields).
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderAmended(_) => "orders.order.amended",
            OrderEvent::OrderApproved(_) => "orders.order.approved",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderDelivered(_) => "orders.order.delivered",
            OrderEvent::OrderDeleted(_) => "orders.order.deleted",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderAmended(e) => e.occurred_at,
            OrderEvent::OrderApproved(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
            OrderEvent::OrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.name = e.name.clone();
                self.product_id = Some(e.product_id);
                self.client_id = Some(e.client_id);
                self.quantity = Some(e.quantity);
                self.deadline = Some(e.deadline);
                self.required = e.required.clone();
                self.status = OrderStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::OrderAmended(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(product_id) = e.product_id {
                    self.product_id = Some(product_id);
                }
                if let Some(client_id) = e.client_id {
                    self.client_id = Some(client_id);
                }
                if let Some(quantity) = e.quantity {
                    self.quantity = Some(quantity);
                }
                if let Some(deadline) = e.deadline {
                    self.deadline = Some(deadline);
                }
                if let Some(required) = &e.required {
                    self.required = required.clone();
                }
            }
            OrderEvent::OrderApproved(_) => {
                self.status = OrderStatus::Approved;
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::OrderDelivered(_) => {
                self.status = OrderStatus::Delivered;
            }
            OrderEvent::OrderDeleted(_) => {
                self.created = false;
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::AmendOrder(cmd) => self.handle_amend(cmd),
            OrderCommand::ApproveOrder(cmd) => self.handle_approve(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::DeliverOrder(cmd) => self.handle_deliver(cmd),
            OrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Order {
    fn ensure_placed(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invalid_id(format!(
                "command targets order {order_id}, loaded order is {}",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("order {} already exists", cmd.order_id)));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("please enter an order name"));
        }
        if cmd.required.is_empty() {
            return Err(DomainError::validation(
                "required materials must be calculated before placing an order",
            ));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            name: name.to_string(),
            product_id: cmd.product_id,
            client_id: cmd.client_id,
            quantity: cmd.quantity,
            deadline: cmd.deadline,
            required: cmd.required.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if !self.is_modifiable() {
            return Err(DomainError::invalid_transition(format!(
                "only pending orders can be updated (order {} is {})",
                self.id, self.status
            )));
        }

        let name = match &cmd.name {
            Some(name) if name.trim().is_empty() => {
                return Err(DomainError::validation("order name cannot be empty"));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        if (cmd.quantity.is_some() || cmd.product_id.is_some()) && cmd.required.is_none() {
            return Err(DomainError::validation(
                "a new product or quantity needs recalculated required materials",
            ));
        }
        if matches!(&cmd.required, Some(required) if required.is_empty()) {
            return Err(DomainError::validation("required materials cannot be empty"));
        }
        if name.is_none()
            && cmd.product_id.is_none()
            && cmd.client_id.is_none()
            && cmd.quantity.is_none()
            && cmd.deadline.is_none()
        {
            return Err(DomainError::validation("nothing to update"));
        }

        Ok(vec![OrderEvent::OrderAmended(OrderAmended {
            order_id: cmd.order_id,
            name,
            product_id: cmd.product_id,
            client_id: cmd.client_id,
            quantity: cmd.quantity,
            deadline: cmd.deadline,
            required: cmd.required.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if !cmd.product_status.allows_production() {
            return Err(DomainError::invalid_transition(format!(
                "product for order {} is {}; only approved products can be produced",
                self.id, cmd.product_status
            )));
        }

        let reapproved = match self.status {
            OrderStatus::Pending => false,
            OrderStatus::Approved => {
                return Err(DomainError::conflict(format!(
                    "order {} has already been approved",
                    self.id
                )));
            }
            OrderStatus::Delivered => {
                return Err(DomainError::invalid_transition(format!(
                    "order {} has been delivered and can no longer change",
                    self.id
                )));
            }
            OrderStatus::Cancelled if !cmd.confirm_reapproval => {
                return Err(DomainError::invalid_transition(format!(
                    "order {} is cancelled; approving it again must be confirmed",
                    self.id
                )));
            }
            OrderStatus::Cancelled => true,
        };

        let shortages = cmd.stock.shortages(&self.required);
        if !shortages.is_empty() {
            return Err(DomainError::InsufficientStock(shortages));
        }

        let deductions = self
            .required
            .iter()
            .map(|(material, amount)| StockDeduction {
                material: material.to_string(),
                amount,
            })
            .collect();

        Ok(vec![OrderEvent::OrderApproved(OrderApproved {
            order_id: cmd.order_id,
            deductions,
            reapproved,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        match self.status {
            OrderStatus::Pending => Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            })]),
            OrderStatus::Cancelled => Err(DomainError::conflict(format!(
                "order {} is already cancelled",
                self.id
            ))),
            status => Err(DomainError::invalid_transition(format!(
                "only pending orders can be cancelled (order {} is {status})",
                self.id
            ))),
        }
    }

    fn handle_deliver(&self, cmd: &DeliverOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if cmd.delivery_recorded || self.status == OrderStatus::Delivered {
            return Err(DomainError::conflict(format!(
                "order {} has already been marked as delivered",
                self.id
            )));
        }
        if self.status != OrderStatus::Approved {
            return Err(DomainError::invalid_transition(format!(
                "order {} is not approved yet",
                self.id
            )));
        }
        let client_id = self
            .client_id
            .ok_or_else(|| DomainError::not_found(format!("client of order {}", self.id)))?;

        Ok(vec![OrderEvent::OrderDelivered(OrderDelivered {
            order_id: cmd.order_id,
            client_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_placed()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status == OrderStatus::Delivered {
            return Err(DomainError::invalid_transition(format!(
                "order {} has been delivered and can no longer change",
                self.id
            )));
        }

        Ok(vec![OrderEvent::OrderDeleted(OrderDeleted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
