//! Catalog upkeep: materials and stock, products, clients.

use tracing::{info, instrument};

use novus_auth::{Permission, Session, authorize};
use novus_core::{ClientId, DomainError, MaterialId, ProductId};
use novus_inventory::Material;
use novus_orders::Client;
use novus_products::{Product, ProductStatus};

use super::ServiceError;
use crate::store::Repository;

#[derive(Debug, Clone)]
pub struct CatalogService<R> {
    repo: R,
}

impl<R: Repository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name)
    )]
    pub async fn add_material(
        &self,
        session: &Session,
        name: &str,
        available: f64,
    ) -> Result<Material, ServiceError> {
        authorize(session, &Permission::CATALOG_MANAGE)?;
        let material = Material::new(MaterialId::new(), name, available)?;

        let mut uow = self.repo.begin().await?;
        uow.insert_material(&material).await?;
        uow.commit().await?;

        info!("material registered");
        Ok(material)
    }

    /// Add received stock to an existing material.
    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name)
    )]
    pub async fn restock(
        &self,
        session: &Session,
        name: &str,
        amount: f64,
    ) -> Result<Material, ServiceError> {
        authorize(session, &Permission::CATALOG_MANAGE)?;

        let mut uow = self.repo.begin().await?;
        let mut material = uow
            .get_material(name.trim())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("material '{}'", name.trim())))?;
        material.restock(amount)?;
        uow.set_stock(material.name(), material.available()).await?;
        uow.commit().await?;

        info!(available = material.available(), "material restocked");
        Ok(material)
    }

    pub async fn list_materials(&self, session: &Session) -> Result<Vec<Material>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow.list_materials().await?)
    }

    /// Register a product. New products start Pending.
    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name)
    )]
    pub async fn add_product(
        &self,
        session: &Session,
        name: &str,
        materials: &str,
    ) -> Result<Product, ServiceError> {
        authorize(session, &Permission::CATALOG_MANAGE)?;
        let product = Product::new(ProductId::new(), name, materials)?;

        let mut uow = self.repo.begin().await?;
        uow.insert_product(&product).await?;
        uow.commit().await?;

        info!("product registered");
        Ok(product)
    }

    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name, product_id = %product_id)
    )]
    pub async fn set_product_status(
        &self,
        session: &Session,
        product_id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, ServiceError> {
        authorize(session, &Permission::CATALOG_MANAGE)?;

        let mut uow = self.repo.begin().await?;
        let mut product = uow
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        product.set_status(status);
        uow.set_product_status(product_id, status).await?;
        uow.commit().await?;

        info!(status = %status, "product status changed");
        Ok(product)
    }

    pub async fn list_products(&self, session: &Session) -> Result<Vec<Product>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow.list_products().await?)
    }

    #[instrument(
        skip(self, session),
        fields(user_id = %session.user_id, user = %session.display_name)
    )]
    pub async fn add_client(&self, session: &Session, name: &str) -> Result<Client, ServiceError> {
        authorize(session, &Permission::CATALOG_MANAGE)?;
        let client = Client::new(ClientId::new(), name)?;

        let mut uow = self.repo.begin().await?;
        uow.insert_client(&client).await?;
        uow.commit().await?;

        info!("client registered");
        Ok(client)
    }

    pub async fn list_clients(&self, session: &Session) -> Result<Vec<Client>, ServiceError> {
        authorize(session, &Permission::ORDERS_READ)?;
        let mut uow = self.repo.begin().await?;
        Ok(uow.list_clients().await?)
    }
}
