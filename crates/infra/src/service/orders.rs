//! Order desk: calculation, entry and the order lifecycle.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use novus_auth::{Permission, Session, authorize};
use novus_core::{Aggregate, ClientId, DomainError, Entity, OrderId, ProductId};
use novus_inventory::{Quantity, RequiredMaterials, StockLevels};
use novus_orders::{
    AmendOrder, ApproveOrder, CancelOrder, ClientRef, DeleteOrder, DeliverOrder, HistoryEntry,
    Order, OrderCommand, OrderEvent, OrderRecord, OrderStatus, PlaceOrder,
};
use novus_products::{Product, ProductRef};

use super::ServiceError;
use crate::store::{Repository, UnitOfWork};

/// Order entry form. Raw quantity text is validated by the service.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub name: String,
    pub product: Option<ProductId>,
    pub client: Option<ClientId>,
    pub quantity: String,
    pub deadline: Option<NaiveDate>,
}

/// Edits to a pending order. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub name: Option<String>,
    pub product: Option<ProductId>,
    pub client: Option<ClientId>,
    pub quantity: Option<String>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct OrderService<R> {
    repo: R,
}

impl<R: Repository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Materials needed to build `quantity` units of `product`.
    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name)
    )]
    pub async fn calculate_requirements(
        &self,
        session: &Session,
        product: Option<ProductId>,
        quantity: &str,
    ) -> Result<RequiredMaterials, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let product_id =
            product.ok_or_else(|| DomainError::validation("please select a product"))?;
        let quantity = Quantity::parse(quantity)?;

        let mut uow = self.repo.begin().await?;
        let materials = uow
            .get_product_materials(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;

        Ok(novus_inventory::requirements_from_text(&materials, quantity)?)
    }

    /// Per-unit materials text of a product, as entered.
    pub async fn product_materials(
        &self,
        session: &Session,
        product_id: ProductId,
    ) -> Result<String, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        uow.get_product_materials(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")).into())
    }

    #[instrument(
        skip(self, session, form),
        fields(
            user_id = %session.user_id,
            user = %session.display_name,
            order_id = tracing::field::Empty
        )
    )]
    pub async fn create_order(
        &self,
        session: &Session,
        form: NewOrder,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_CREATE)?;

        if form.name.trim().is_empty() {
            return Err(DomainError::validation("please enter an order name").into());
        }
        let product_id = form
            .product
            .ok_or_else(|| DomainError::validation("please select a product"))?;
        let client_id = form
            .client
            .ok_or_else(|| DomainError::validation("please select a client"))?;
        let quantity = Quantity::parse(&form.quantity)?;
        let deadline = form
            .deadline
            .ok_or_else(|| DomainError::validation("please select a deadline"))?;

        let mut uow = self.repo.begin().await?;
        let product = load_product(uow.as_mut(), product_id).await?;
        if uow.get_client(client_id).await?.is_none() {
            return Err(DomainError::not_found(format!("client {client_id}")).into());
        }

        let order_id = OrderId::new();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let mut order = Order::empty(order_id);
        let events = decide(
            &mut order,
            OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                name: form.name,
                product_id,
                client_id,
                quantity,
                deadline,
                required: product.requirements(quantity)?,
                occurred_at: Utc::now(),
            }),
        )?;

        let record = placed(&order)?;
        uow.insert_order(&record).await?;
        write_history(uow.as_mut(), &events, session).await?;
        uow.commit().await?;

        info!(
            product_id = %product_id,
            client_id = %client_id,
            quantity = %quantity,
            "order created"
        );
        Ok(record)
    }

    #[instrument(
        skip(self, session, changes),
        fields(user_id = %session.user_id, user = %session.display_name, order_id = %order_id)
    )]
    pub async fn update_order(
        &self,
        session: &Session,
        order_id: OrderId,
        changes: OrderChanges,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_UPDATE)?;
        let quantity = changes.quantity.as_deref().map(Quantity::parse).transpose()?;

        let mut uow = self.repo.begin().await?;
        let mut order = load_order(uow.as_mut(), order_id).await?;

        let new_product = match changes.product {
            Some(product_id) => Some(load_product(uow.as_mut(), product_id).await?),
            None => None,
        };
        if let Some(client_id) = changes.client {
            if uow.get_client(client_id).await?.is_none() {
                return Err(DomainError::not_found(format!("client {client_id}")).into());
            }
        }

        // The snapshot is only rebuilt when the order can still change.
        let rebuild = quantity.is_some() || new_product.is_some();
        let required = if rebuild && order.is_modifiable() {
            let product = match new_product {
                Some(product) => product,
                None => load_product(uow.as_mut(), current_product(&order)?).await?,
            };
            let quantity = match quantity.or(order.quantity()) {
                Some(quantity) => quantity,
                None => return Err(DomainError::not_found(format!("order {order_id}")).into()),
            };
            Some(product.requirements(quantity)?)
        } else {
            None
        };

        let events = decide(
            &mut order,
            OrderCommand::AmendOrder(AmendOrder {
                order_id,
                name: changes.name,
                product_id: changes.product,
                client_id: changes.client,
                quantity,
                deadline: changes.deadline,
                required,
                occurred_at: Utc::now(),
            }),
        )?;

        let record = placed(&order)?;
        uow.update_order(&record).await?;
        write_history(uow.as_mut(), &events, session).await?;
        uow.commit().await?;

        info!("order updated");
        Ok(record)
    }

    /// Approve an order, consuming its materials from stock.
    ///
    /// Stock is read, checked and deducted in one transaction: either every
    /// material is decremented and the order becomes Approved, or nothing
    /// changes.
    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name, order_id = %order_id)
    )]
    pub async fn approve_order(
        &self,
        session: &Session,
        order_id: OrderId,
        confirm_reapproval: bool,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_APPROVE)?;

        let mut uow = self.repo.begin().await?;
        let mut order = load_order(uow.as_mut(), order_id).await?;
        let product = load_product(uow.as_mut(), current_product(&order)?).await?;

        let mut stock = StockLevels::new();
        for (material, _) in order.required().iter() {
            if let Some(available) = uow.get_stock(material).await? {
                stock.set(material, available);
            }
        }

        let events = decide(
            &mut order,
            OrderCommand::ApproveOrder(ApproveOrder {
                order_id,
                product_status: product.status(),
                stock,
                confirm_reapproval,
                occurred_at: Utc::now(),
            }),
        )?;

        for event in &events {
            if let OrderEvent::OrderApproved(approved) = event {
                for deduction in &approved.deductions {
                    uow.deduct_stock(&deduction.material, deduction.amount).await?;
                }
            }
        }
        uow.set_order_status(order_id, order.status()).await?;
        write_history(uow.as_mut(), &events, session).await?;
        uow.commit().await?;

        info!(materials = order.required().len(), "order approved");
        placed(&order)
    }

    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name, order_id = %order_id)
    )]
    pub async fn cancel_order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_CANCEL)?;

        let mut uow = self.repo.begin().await?;
        let mut order = load_order(uow.as_mut(), order_id).await?;
        let events = decide(
            &mut order,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
        )?;

        uow.set_order_status(order_id, order.status()).await?;
        write_history(uow.as_mut(), &events, session).await?;
        uow.commit().await?;

        info!("order cancelled");
        placed(&order)
    }

    /// Mark an approved order as delivered and write its delivery record.
    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name, order_id = %order_id)
    )]
    pub async fn deliver_order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_DELIVER)?;

        let mut uow = self.repo.begin().await?;
        let mut order = load_order(uow.as_mut(), order_id).await?;
        let delivery_recorded = uow.has_delivery_record(order_id).await?;

        let events = decide(
            &mut order,
            OrderCommand::DeliverOrder(DeliverOrder {
                order_id,
                delivery_recorded,
                occurred_at: Utc::now(),
            }),
        )?;

        write_history(uow.as_mut(), &events, session).await?;
        uow.set_order_status(order_id, order.status()).await?;
        uow.commit().await?;

        info!("order delivered");
        placed(&order)
    }

    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name, order_id = %order_id)
    )]
    pub async fn delete_order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<(), ServiceError> {
        authorize(session, &Permission::ORDERS_DELETE)?;

        let mut uow = self.repo.begin().await?;
        let mut order = load_order(uow.as_mut(), order_id).await?;
        decide(
            &mut order,
            OrderCommand::DeleteOrder(DeleteOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
        )?;

        uow.delete_order(order_id).await?;
        uow.commit().await?;

        info!("order deleted");
        Ok(())
    }

    pub async fn get_order(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<OrderRecord, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        uow.get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")).into())
    }

    /// Orders, newest first.
    pub async fn list_orders(
        &self,
        session: &Session,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow.list_orders(status).await?)
    }

    /// History of one order, newest first.
    pub async fn order_history(
        &self,
        session: &Session,
        order_id: OrderId,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        if uow.get_order(order_id).await?.is_none() {
            return Err(DomainError::not_found(format!("order {order_id}")).into());
        }
        Ok(uow.list_history(order_id).await?)
    }

    /// Products to pick from when entering an order.
    pub async fn product_refs(&self, session: &Session) -> Result<Vec<ProductRef>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow
            .list_products()
            .await?
            .iter()
            .map(Entity::reference)
            .collect())
    }

    /// Clients to pick from when entering an order.
    pub async fn client_refs(&self, session: &Session) -> Result<Vec<ClientRef>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow
            .list_clients()
            .await?
            .iter()
            .map(Entity::reference)
            .collect())
    }
}

async fn load_order(uow: &mut dyn UnitOfWork, order_id: OrderId) -> Result<Order, ServiceError> {
    let record = uow
        .get_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))?;
    Ok(Order::restore(record))
}

async fn load_product(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
) -> Result<Product, ServiceError> {
    Ok(uow
        .get_product(product_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?)
}

/// Run a command against the order and fold the resulting events into it.
fn decide(order: &mut Order, command: OrderCommand) -> Result<Vec<OrderEvent>, ServiceError> {
    let events = order.handle(&command).inspect_err(|err| {
        warn!(order_id = %order.id_typed(), error = %err, "order command rejected");
    })?;
    for event in &events {
        debug!(event_type = event.event_type(), "applying order event");
        order.apply(event);
    }
    Ok(events)
}

fn current_product(order: &Order) -> Result<ProductId, ServiceError> {
    order.product_id().ok_or_else(|| {
        DomainError::not_found(format!("product of order {}", order.id_typed())).into()
    })
}

fn placed(order: &Order) -> Result<OrderRecord, ServiceError> {
    order
        .to_record()
        .ok_or_else(|| DomainError::not_found(format!("order {}", order.id_typed())).into())
}

async fn write_history(
    uow: &mut dyn UnitOfWork,
    events: &[OrderEvent],
    session: &Session,
) -> Result<(), ServiceError> {
    for event in events {
        if let Some(entry) =
            HistoryEntry::for_event(event, session.user_id, &session.display_name)
        {
            uow.insert_history(&entry).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use novus_auth::Role;
    use novus_core::UserId;
    use novus_products::ProductStatus;

    use crate::service::CatalogService;
    use crate::store::SqliteStore;

    struct Desk {
        store: SqliteStore,
        orders: OrderService<SqliteStore>,
        catalog: CatalogService<SqliteStore>,
        admin: Session,
        product: ProductId,
        client: ClientId,
    }

    fn session(role: Role) -> Session {
        Session::new(UserId::new(), "Dana", role)
    }

    /// Store seeded with one Approved "Bench" product (Steel - 2; Glue - 1),
    /// one client, and the given stock.
    async fn desk(stock: &[(&str, f64)]) -> Desk {
        let store = SqliteStore::in_memory().await.unwrap();
        let orders = OrderService::new(store.clone());
        let catalog = CatalogService::new(store.clone());
        let admin = session(Role::ADMIN);

        for (name, available) in stock {
            catalog.add_material(&admin, name, *available).await.unwrap();
        }
        let product = catalog
            .add_product(&admin, "Bench", "Steel - 2; Glue - 1")
            .await
            .unwrap();
        let product = *product.id();
        catalog
            .set_product_status(&admin, product, ProductStatus::Approved)
            .await
            .unwrap();
        let client = *catalog.add_client(&admin, "Acme").await.unwrap().id();

        Desk {
            store,
            orders,
            catalog,
            admin,
            product,
            client,
        }
    }

    fn form(desk: &Desk, quantity: &str) -> NewOrder {
        NewOrder {
            name: "Park benches".into(),
            product: Some(desk.product),
            client: Some(desk.client),
            quantity: quantity.into(),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 15),
        }
    }

    async fn stock_of(desk: &Desk, material: &str) -> Option<f64> {
        let mut uow = desk.store.begin().await.unwrap();
        uow.get_stock(material).await.unwrap()
    }

    #[tokio::test]
    async fn calculates_requirements_from_product_materials() {
        let desk = desk(&[]).await;
        let required = desk
            .orders
            .calculate_requirements(&desk.admin, Some(desk.product), " 5 ")
            .await
            .unwrap();
        assert_eq!(required.get("Steel"), Some(10.0));
        assert_eq!(required.get("Glue"), Some(5.0));
    }

    #[tokio::test]
    async fn calculation_rejects_missing_product_and_bad_quantity() {
        let desk = desk(&[]).await;
        let err = desk
            .orders
            .calculate_requirements(&desk.admin, None, "5")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        for bad in ["", "0", "-3", "2.5", "abc"] {
            let err = desk
                .orders
                .calculate_requirements(&desk.admin, Some(desk.product), bad)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{bad:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn product_without_materials_cannot_be_calculated() {
        let desk = desk(&[]).await;
        let bare = desk.catalog.add_product(&desk.admin, "Blank", "").await.unwrap();
        let err = desk
            .orders
            .calculate_requirements(&desk.admin, Some(*bare.id()), "2")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref msg) if msg.contains("no materials")));
    }

    #[tokio::test]
    async fn created_order_is_pending_with_snapshot_and_history() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.required.get("Steel"), Some(10.0));

        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored, order);

        let history = desk.orders.order_history(&desk.admin, order.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, OrderStatus::Pending);
        assert_eq!(history[0].changed_by, desk.admin.user_id);
    }

    #[tokio::test]
    async fn create_validates_every_field() {
        let desk = desk(&[]).await;
        let cases = [
            NewOrder { name: " ".into(), ..form(&desk, "5") },
            NewOrder { product: None, ..form(&desk, "5") },
            NewOrder { client: None, ..form(&desk, "5") },
            NewOrder { deadline: None, ..form(&desk, "5") },
            form(&desk, "zero"),
        ];
        for case in cases {
            let err = desk.orders.create_order(&desk.admin, case).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
        }
        assert!(desk.orders.list_orders(&desk.admin, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_not_recomputed_when_product_changes() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        sqlx::query("UPDATE products SET materials = 'Steel - 9' WHERE product_id = ?1")
            .bind(desk.product.to_string())
            .execute(desk.store.pool())
            .await
            .unwrap();

        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored.required, order.required);

        desk.orders.approve_order(&desk.admin, order.id, false).await.unwrap();
        assert_eq!(stock_of(&desk, "Steel").await, Some(90.0));
        assert_eq!(stock_of(&desk, "Glue").await, Some(95.0));
    }

    #[tokio::test]
    async fn approval_deducts_stock() {
        let desk = desk(&[("Steel", 20.0), ("Glue", 5.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        let approved = desk.orders.approve_order(&desk.admin, order.id, false).await.unwrap();

        assert_eq!(approved.status, OrderStatus::Approved);
        assert_eq!(stock_of(&desk, "Steel").await, Some(10.0));
        assert_eq!(stock_of(&desk, "Glue").await, Some(0.0));
    }

    #[tokio::test]
    async fn shortage_rejects_approval_without_touching_stock() {
        let desk = desk(&[("Steel", 8.0), ("Glue", 50.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();

        match err {
            ServiceError::InsufficientStock(shortages) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].material, "Steel");
                assert_eq!(shortages[0].available, Some(8.0));
            }
            other => panic!("expected shortage, got {other:?}"),
        }
        assert_eq!(stock_of(&desk, "Steel").await, Some(8.0));
        assert_eq!(stock_of(&desk, "Glue").await, Some(50.0));
        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn missing_inventory_row_counts_as_short() {
        let desk = desk(&[("Steel", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Glue: not found in inventory"), "{err}");
        assert_eq!(stock_of(&desk, "Steel").await, Some(100.0));
    }

    #[tokio::test]
    async fn unapproved_product_blocks_approval() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.catalog
            .set_product_status(&desk.admin, desk.product, ProductStatus::Pending)
            .await
            .unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(stock_of(&desk, "Steel").await, Some(100.0));
    }

    #[tokio::test]
    async fn approving_twice_is_a_conflict() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.approve_order(&desk.admin, order.id, false).await.unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(stock_of(&desk, "Steel").await, Some(98.0));
    }

    #[tokio::test]
    async fn failure_mid_deduction_rolls_back_everything() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        // Glue is deducted before Steel; make the Steel update fail.
        sqlx::query(
            r#"
            CREATE TRIGGER fail_steel BEFORE UPDATE ON materials
            WHEN NEW.name = 'Steel'
            BEGIN
                SELECT RAISE(ABORT, 'disk unavailable');
            END
            "#,
        )
        .execute(desk.store.pool())
        .await
        .unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)), "got {err:?}");

        assert_eq!(stock_of(&desk, "Glue").await, Some(100.0));
        assert_eq!(stock_of(&desk, "Steel").await, Some(100.0));
        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        let history = desk.orders.order_history(&desk.admin, order.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_order_needs_confirmation_to_reapprove() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.cancel_order(&desk.admin, order.id).await.unwrap();

        let err = desk
            .orders
            .approve_order(&desk.admin, order.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));

        let approved = desk.orders.approve_order(&desk.admin, order.id, true).await.unwrap();
        assert_eq!(approved.status, OrderStatus::Approved);
        assert_eq!(stock_of(&desk, "Steel").await, Some(98.0));
    }

    #[tokio::test]
    async fn cancel_rules() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();

        let cancelled = desk.orders.cancel_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let err = desk.orders.cancel_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let other = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.approve_order(&desk.admin, other.id, false).await.unwrap();
        let err = desk.orders.cancel_order(&desk.admin, other.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn delivery_happens_once() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();

        let err = desk.orders.deliver_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));

        desk.orders.approve_order(&desk.admin, order.id, false).await.unwrap();
        let delivered = desk.orders.deliver_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        let err = desk.orders.deliver_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let history = desk.orders.order_history(&desk.admin, order.id).await.unwrap();
        let deliveries: Vec<_> = history
            .iter()
            .filter(|h| h.status == OrderStatus::Delivered)
            .collect();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].notes.contains(&desk.client.to_string()));
        assert_eq!(history[0].status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn delivered_orders_are_immutable() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.approve_order(&desk.admin, order.id, false).await.unwrap();
        desk.orders.deliver_order(&desk.admin, order.id).await.unwrap();

        let err = desk.orders.delete_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        let err = desk
            .orders
            .update_order(
                &desk.admin,
                order.id,
                OrderChanges {
                    name: Some("Renamed".into()),
                    ..OrderChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn quantity_update_recomputes_snapshot() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        let updated = desk
            .orders
            .update_order(
                &desk.admin,
                order.id,
                OrderChanges {
                    quantity: Some("2".into()),
                    deadline: NaiveDate::from_ymd_opt(2027, 1, 10),
                    ..OrderChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.quantity.get(), 2);
        assert_eq!(updated.required.get("Steel"), Some(4.0));
        assert_eq!(updated.name, "Park benches");
        assert_eq!(updated.created_at, order.created_at);
        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn update_moves_order_to_another_product_and_client() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();
        let stool = *desk
            .catalog
            .add_product(&desk.admin, "Stool", "Oak - 3")
            .await
            .unwrap()
            .id();
        let globex = *desk.catalog.add_client(&desk.admin, "Globex").await.unwrap().id();

        let updated = desk
            .orders
            .update_order(
                &desk.admin,
                order.id,
                OrderChanges {
                    product: Some(stool),
                    client: Some(globex),
                    ..OrderChanges::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.product_id, stool);
        assert_eq!(updated.client_id, globex);
        assert_eq!(updated.quantity.get(), 5);
        assert_eq!(updated.required.get("Oak"), Some(15.0));
        assert_eq!(updated.required.get("Steel"), None);
        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn update_rejects_unknown_product_or_client() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();

        for changes in [
            OrderChanges {
                product: Some(ProductId::new()),
                ..OrderChanges::default()
            },
            OrderChanges {
                client: Some(ClientId::new()),
                ..OrderChanges::default()
            },
        ] {
            let err = desk
                .orders
                .update_order(&desk.admin, order.id, changes)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::NotFound(_)), "got {err:?}");
        }
        let stored = desk.orders.get_order(&desk.admin, order.id).await.unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn history_records_who_made_each_change() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "5")).await.unwrap();
        let clerk = Session::new(UserId::new(), "Sam", Role::MANAGER);
        desk.orders.cancel_order(&clerk, order.id).await.unwrap();

        let history = desk.orders.order_history(&desk.admin, order.id).await.unwrap();
        let names: Vec<_> = history
            .iter()
            .map(|entry| (entry.status, entry.changed_by_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![(OrderStatus::Cancelled, "Sam"), (OrderStatus::Pending, "Dana")]
        );
        assert_eq!(history[0].changed_by, clerk.user_id);
        assert_eq!(history[1].changed_by, desk.admin.user_id);
    }

    #[tokio::test]
    async fn delete_removes_order() {
        let desk = desk(&[]).await;
        let order = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.delete_order(&desk.admin, order.id).await.unwrap();

        let err = desk.orders.get_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = desk.orders.delete_order(&desk.admin, order.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn staff_cannot_approve() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let staff = session(Role::STAFF);
        let order = desk.orders.create_order(&staff, form(&desk, "1")).await.unwrap();

        let err = desk.orders.approve_order(&staff, order.id, false).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(stock_of(&desk, "Steel").await, Some(100.0));
        let stored = desk.orders.get_order(&staff, order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_exposes_refs() {
        let desk = desk(&[("Steel", 100.0), ("Glue", 100.0)]).await;
        let first = desk.orders.create_order(&desk.admin, form(&desk, "1")).await.unwrap();
        desk.orders.create_order(&desk.admin, form(&desk, "2")).await.unwrap();
        desk.orders.approve_order(&desk.admin, first.id, false).await.unwrap();

        let all = desk.orders.list_orders(&desk.admin, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let approved = desk
            .orders
            .list_orders(&desk.admin, Some(OrderStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, first.id);

        let products = desk.orders.product_refs(&desk.admin).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, desk.product);
        assert_eq!(products[0].label, "Bench");
        let clients = desk.orders.client_refs(&desk.admin).await.unwrap();
        assert_eq!(clients[0].label, "Acme");

        let text = desk
            .orders
            .product_materials(&desk.admin, desk.product)
            .await
            .unwrap();
        assert_eq!(text, "Steel - 2; Glue - 1");
    }
}
