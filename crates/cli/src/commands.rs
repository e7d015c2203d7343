use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;

use novus_auth::Session;
use novus_core::{ClientId, OrderId, ProductId};
use novus_infra::{
    AppConfig, CatalogService, NewOrder, OrderChanges, OrderService, SqliteStore,
};
use novus_orders::OrderStatus;
use novus_products::ProductStatus;

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and its tables
    Init,
    /// Manage raw materials and stock
    #[command(subcommand)]
    Material(MaterialCommands),
    /// Manage products
    #[command(subcommand)]
    Product(ProductCommands),
    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommands),
    /// Enter and process orders
    #[command(subcommand)]
    Order(OrderCommands),
}

#[derive(Subcommand)]
pub enum MaterialCommands {
    /// Register a material with its opening stock
    Add { name: String, available: f64 },
    /// Add received stock to a material
    Restock { name: String, amount: f64 },
    /// List materials and stock levels
    List,
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Register a product
    Add {
        name: String,
        /// Per-unit materials, e.g. "Steel - 2; Glue - 1"
        #[arg(short, long, default_value = "")]
        materials: String,
    },
    /// Change a product's status (pending, approved, cancelled)
    Status { id: ProductId, status: ProductStatus },
    /// Show a product's per-unit materials
    Materials { id: ProductId },
    /// List products
    List,
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a client
    Add { name: String },
    /// List clients
    List,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Calculate the materials an order would need
    Calc {
        #[arg(short, long)]
        product: Option<ProductId>,
        #[arg(short, long, default_value = "")]
        quantity: String,
    },
    /// Enter a new order
    Create {
        #[arg(short, long, default_value = "")]
        name: String,
        #[arg(short, long)]
        product: Option<ProductId>,
        #[arg(short, long)]
        client: Option<ClientId>,
        #[arg(short, long, default_value = "")]
        quantity: String,
        /// Deadline as YYYY-MM-DD
        #[arg(short, long)]
        deadline: Option<NaiveDate>,
    },
    /// Change a pending order
    Update {
        id: OrderId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        product: Option<ProductId>,
        #[arg(short, long)]
        client: Option<ClientId>,
        #[arg(short, long)]
        quantity: Option<String>,
        #[arg(short, long)]
        deadline: Option<NaiveDate>,
    },
    /// Approve an order and consume its materials
    Approve {
        id: OrderId,
        /// Confirm approving an order that was cancelled
        #[arg(long)]
        confirm: bool,
    },
    /// Cancel a pending order
    Cancel { id: OrderId },
    /// Mark an approved order as delivered
    Deliver { id: OrderId },
    /// Delete an order that has not been delivered
    Delete { id: OrderId },
    /// Show one order
    Show { id: OrderId },
    /// List orders, newest first
    List {
        #[arg(short, long)]
        status: Option<OrderStatus>,
    },
    /// Show an order's history, newest first
    History { id: OrderId },
}

pub async fn handle_command(
    command: Commands,
    store: &SqliteStore,
    session: &Session,
    config: &AppConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Init => print_json(&json!({ "database": config.database_url, "ready": true })),
        Commands::Material(cmd) => {
            handle_material(cmd, CatalogService::new(store.clone()), session).await
        }
        Commands::Product(cmd) => handle_product(cmd, store, session).await,
        Commands::Client(cmd) => {
            handle_client(cmd, CatalogService::new(store.clone()), session).await
        }
        Commands::Order(cmd) => handle_order(cmd, OrderService::new(store.clone()), session).await,
    }
}

async fn handle_material(
    command: MaterialCommands,
    catalog: CatalogService<SqliteStore>,
    session: &Session,
) -> anyhow::Result<()> {
    match command {
        MaterialCommands::Add { name, available } => {
            print_json(&catalog.add_material(session, &name, available).await?)
        }
        MaterialCommands::Restock { name, amount } => {
            print_json(&catalog.restock(session, &name, amount).await?)
        }
        MaterialCommands::List => print_json(&catalog.list_materials(session).await?),
    }
}

async fn handle_product(
    command: ProductCommands,
    store: &SqliteStore,
    session: &Session,
) -> anyhow::Result<()> {
    let catalog = CatalogService::new(store.clone());
    match command {
        ProductCommands::Add { name, materials } => {
            print_json(&catalog.add_product(session, &name, &materials).await?)
        }
        ProductCommands::Status { id, status } => {
            print_json(&catalog.set_product_status(session, id, status).await?)
        }
        ProductCommands::Materials { id } => {
            let orders = OrderService::new(store.clone());
            let text = orders.product_materials(session, id).await?;
            print_json(&json!({ "product_id": id, "materials": text }))
        }
        ProductCommands::List => print_json(&catalog.list_products(session).await?),
    }
}

async fn handle_client(
    command: ClientCommands,
    catalog: CatalogService<SqliteStore>,
    session: &Session,
) -> anyhow::Result<()> {
    match command {
        ClientCommands::Add { name } => print_json(&catalog.add_client(session, &name).await?),
        ClientCommands::List => print_json(&catalog.list_clients(session).await?),
    }
}

async fn handle_order(
    command: OrderCommands,
    orders: OrderService<SqliteStore>,
    session: &Session,
) -> anyhow::Result<()> {
    match command {
        OrderCommands::Calc { product, quantity } => {
            print_json(&orders.calculate_requirements(session, product, &quantity).await?)
        }
        OrderCommands::Create {
            name,
            product,
            client,
            quantity,
            deadline,
        } => {
            let form = NewOrder {
                name,
                product,
                client,
                quantity,
                deadline,
            };
            print_json(&orders.create_order(session, form).await?)
        }
        OrderCommands::Update {
            id,
            name,
            product,
            client,
            quantity,
            deadline,
        } => {
            let changes = OrderChanges {
                name,
                product,
                client,
                quantity,
                deadline,
            };
            print_json(&orders.update_order(session, id, changes).await?)
        }
        OrderCommands::Approve { id, confirm } => {
            print_json(&orders.approve_order(session, id, confirm).await?)
        }
        OrderCommands::Cancel { id } => print_json(&orders.cancel_order(session, id).await?),
        OrderCommands::Deliver { id } => print_json(&orders.deliver_order(session, id).await?),
        OrderCommands::Delete { id } => {
            orders.delete_order(session, id).await?;
            print_json(&json!({ "deleted": id }))
        }
        OrderCommands::Show { id } => print_json(&orders.get_order(session, id).await?),
        OrderCommands::List { status } => print_json(&orders.list_orders(session, status).await?),
        OrderCommands::History { id } => print_json(&orders.order_history(session, id).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Commands,
    }

    #[test]
    fn order_create_parses_typed_arguments() {
        let product = ProductId::new();
        let harness = Harness::try_parse_from([
            "novus",
            "order",
            "create",
            "--name",
            "Benches",
            "--product",
            &product.to_string(),
            "--quantity",
            "5",
            "--deadline",
            "2026-12-01",
        ])
        .unwrap();

        match harness.command {
            Commands::Order(OrderCommands::Create {
                product: parsed,
                deadline,
                client,
                ..
            }) => {
                assert_eq!(parsed, Some(product));
                assert_eq!(deadline, NaiveDate::from_ymd_opt(2026, 12, 1));
                assert!(client.is_none());
            }
            _ => panic!("expected order create"),
        }
    }

    #[test]
    fn order_update_accepts_product_and_client() {
        let id = OrderId::new();
        let product = ProductId::new();
        let client = ClientId::new();
        let harness = Harness::try_parse_from([
            "novus",
            "order",
            "update",
            &id.to_string(),
            "-p",
            &product.to_string(),
            "--client",
            &client.to_string(),
        ])
        .unwrap();

        match harness.command {
            Commands::Order(OrderCommands::Update {
                id: parsed,
                product: new_product,
                client: new_client,
                quantity,
                ..
            }) => {
                assert_eq!(parsed, id);
                assert_eq!(new_product, Some(product));
                assert_eq!(new_client, Some(client));
                assert!(quantity.is_none());
            }
            _ => panic!("expected order update"),
        }
    }

    #[test]
    fn list_accepts_status_filter() {
        let harness =
            Harness::try_parse_from(["novus", "order", "list", "--status", "approved"]).unwrap();
        assert!(matches!(
            harness.command,
            Commands::Order(OrderCommands::List {
                status: Some(OrderStatus::Approved)
            })
        ));
    }

    #[test]
    fn malformed_ids_are_rejected_by_the_parser() {
        assert!(Harness::try_parse_from(["novus", "order", "show", "not-a-uuid"]).is_err());
    }
}
