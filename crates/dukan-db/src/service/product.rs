//! # Product Service
//!
//! Catalog operations: create, update, soft-delete, restore.
//!
//! Stock mutations never happen here; they go through the stock, order,
//! debt, and refund services so every lot change is journaled.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::repository::product as product_repo;
use dukan_core::validation::{
    generate_sku, validate_barcode, validate_exchange_rate, validate_required, validate_sku,
};
use dukan_core::{Currency, LedgerError, Money, Product, SoftDeletable};

/// Input for creating or repricing a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    /// Generated when absent.
    pub sku: Option<String>,
    pub barcode: Option<String>,
    /// List price in `currency`; normalized to the reference currency
    /// before storage.
    pub list_price: Money,
    pub currency: Currency,
    pub exchange_rate: Money,
}

/// Service for the product catalog.
#[derive(Debug, Clone)]
pub struct ProductService {
    pool: SqlitePool,
}

impl ProductService {
    pub fn new(pool: SqlitePool) -> Self {
        ProductService { pool }
    }

    /// Creates a product with zero stock.
    pub async fn create(&self, store_id: &str, input: ProductInput) -> DbResult<Product> {
        let (sku, normalized_price) = validate_input(&input)?;

        let mut product = Product::new(
            store_id,
            input.name.trim(),
            sku,
            normalized_price,
            input.currency,
            input.exchange_rate,
            Utc::now(),
        );
        product.barcode = input.barcode;

        let mut tx = self.pool.begin().await?;
        product_repo::insert(&mut *tx, &product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Updates a product's descriptive fields and price snapshot.
    pub async fn update(&self, id: &str, input: ProductInput) -> DbResult<Product> {
        let (sku, normalized_price) = validate_input(&input)?;

        let mut tx = self.pool.begin().await?;
        let mut product = product_repo::fetch_live(&mut *tx, id).await?;

        product.name = input.name.trim().to_string();
        product.sku = sku;
        product.barcode = input.barcode;
        product.list_price_micros = normalized_price.micros();
        product.currency = input.currency;
        product.exchange_rate_micros = input.exchange_rate.micros();
        product.updated_at = Utc::now();

        product_repo::update(&mut *tx, &product).await?;
        tx.commit().await?;

        Ok(product)
    }

    /// Flags a product deleted. Its lots stay untouched so a restore picks
    /// up exactly where the delete left off.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut product = product_repo::fetch(&mut *tx, id).await?;
        if product.mark_deleted(Utc::now()) {
            product_repo::update(&mut *tx, &product).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Clears a product's deleted flag.
    pub async fn restore(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut product = product_repo::fetch(&mut *tx, id).await?;
        if product.mark_restored() {
            product_repo::update(&mut *tx, &product).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Fetches a live product.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        product_repo::fetch_live(&mut conn, id).await
    }

    /// Finds a live product by SKU.
    pub async fn find_by_sku(&self, store_id: &str, sku: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        product_repo::find_by_sku(&mut conn, store_id, sku).await
    }

    /// Lists a store's live products.
    pub async fn list(&self, store_id: &str) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        product_repo::list(&mut conn, store_id).await
    }
}

/// Validates the shared create/update input, returning the (possibly
/// generated) SKU and the reference-currency list price.
fn validate_input(input: &ProductInput) -> DbResult<(String, Money)> {
    validate_required("name", &input.name).map_err(LedgerError::from)?;
    validate_exchange_rate(input.exchange_rate).map_err(LedgerError::from)?;
    if let Some(barcode) = &input.barcode {
        validate_barcode(barcode).map_err(LedgerError::from)?;
    }
    let sku = match &input.sku {
        Some(sku) => {
            validate_sku(sku).map_err(LedgerError::from)?;
            sku.clone()
        }
        None => generate_sku(),
    };
    let normalized =
        dukan_core::money::normalize(input.list_price, input.currency, input.exchange_rate)?;
    Ok((sku, normalized))
}
