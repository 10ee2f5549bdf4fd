//! Shared fixtures for service tests. An isolated in-memory database per
//! test, plus seeding shortcuts.

use crate::pool::{Database, DbConfig};
use crate::service::product::ProductInput;
use crate::service::stock::ImportInput;
use dukan_core::{Currency, Money, Product, StockImportRecord, StockPool, Store};

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) async fn seed_store(db: &Database) -> Store {
    db.stores().create("Chorsu Dukan").await.unwrap()
}

pub(crate) async fn seed_product(db: &Database, store_id: &str, name: &str) -> Product {
    db.products()
        .create(
            store_id,
            ProductInput {
                name: name.to_string(),
                sku: None,
                barcode: None,
                list_price: Money::from_major(5),
                currency: Currency::Usd,
                exchange_rate: Money::from_major(1),
            },
        )
        .await
        .unwrap()
}

/// Imports `quantity` units at `unit_cost_major` into the given pool. Note
/// that this moves cash: the import's total cost leaves the account.
pub(crate) async fn seed_stock(
    db: &Database,
    product_id: &str,
    quantity: i64,
    unit_cost_major: i64,
    pool: StockPool,
) -> StockImportRecord {
    db.stock()
        .import(ImportInput {
            product_id: product_id.to_string(),
            quantity,
            unit_price: Money::from_major(unit_cost_major),
            currency: Currency::Usd,
            exchange_rate: Money::from_major(1),
            pool,
        })
        .await
        .unwrap()
}

pub(crate) async fn product_state(db: &Database, product_id: &str) -> (i64, i64, Money) {
    let product = db.products().get(product_id).await.unwrap();
    (
        product.shelf_qty,
        product.warehouse_qty,
        product.average_cost(),
    )
}

pub(crate) async fn balance(db: &Database, store_id: &str) -> Money {
    db.cash().balance(store_id).await.unwrap().recorded
}
