//! # Product Repository
//!
//! Row access for products and their stock lots.
//!
//! ## Save Strategy for Lots
//! ```text
//! StockAggregate mutates lots in memory (consume / produce / transfer)
//!       │
//!       ▼
//! save_stock():  UPDATE products  (cached totals, avg cost, lot_seq)
//!                DELETE stock_lots WHERE product_id = ?
//!                INSERT each live lot
//! ```
//! Replacing the lot set wholesale keeps the persistence dumb: whatever
//! merging and zero-lot removal the aggregate did in memory is exactly what
//! lands on disk. `created_at`/`seq` are carried by the lots themselves, so
//! FIFO order survives the rewrite.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{Product, StockAggregate, StockLot};

const PRODUCT_COLUMNS: &str = "id, store_id, name, sku, barcode, count_type, \
     shelf_qty, warehouse_qty, average_cost_micros, list_price_micros, \
     currency, exchange_rate_micros, in_stock, lot_seq, \
     is_deleted, deleted_at, created_at, updated_at";

const LOT_COLUMNS: &str =
    "id, product_id, pool, quantity, unit_cost_micros, debt_document_id, created_at, seq";

/// Inserts a product.
pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    debug!(id = %product.id, sku = %product.sku, "Inserting product");

    sqlx::query(
        "INSERT INTO products (id, store_id, name, sku, barcode, count_type, \
             shelf_qty, warehouse_qty, average_cost_micros, list_price_micros, \
             currency, exchange_rate_micros, in_stock, lot_seq, \
             is_deleted, deleted_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
    )
    .bind(&product.id)
    .bind(&product.store_id)
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.barcode)
    .bind(product.count_type)
    .bind(product.shelf_qty)
    .bind(product.warehouse_qty)
    .bind(product.average_cost_micros)
    .bind(product.list_price_micros)
    .bind(product.currency)
    .bind(product.exchange_rate_micros)
    .bind(product.in_stock)
    .bind(product.lot_seq)
    .bind(product.is_deleted)
    .bind(product.deleted_at)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates every mutable column of a product.
pub async fn update(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    sqlx::query(
        "UPDATE products SET name = ?2, sku = ?3, barcode = ?4, count_type = ?5, \
             shelf_qty = ?6, warehouse_qty = ?7, average_cost_micros = ?8, \
             list_price_micros = ?9, currency = ?10, exchange_rate_micros = ?11, \
             in_stock = ?12, lot_seq = ?13, is_deleted = ?14, deleted_at = ?15, \
             updated_at = ?16 \
         WHERE id = ?1",
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.barcode)
    .bind(product.count_type)
    .bind(product.shelf_qty)
    .bind(product.warehouse_qty)
    .bind(product.average_cost_micros)
    .bind(product.list_price_micros)
    .bind(product.currency)
    .bind(product.exchange_rate_micros)
    .bind(product.in_stock)
    .bind(product.lot_seq)
    .bind(product.is_deleted)
    .bind(product.deleted_at)
    .bind(product.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a product by id, deleted or not.
pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Product", id))
}

/// Fetches a live (non-deleted) product by id.
pub async fn fetch_live(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    let product = fetch(conn, id).await?;
    if product.is_deleted {
        return Err(DbError::not_found("Product", id));
    }
    Ok(product)
}

/// Finds a live product by SKU within a store.
pub async fn find_by_sku(
    conn: &mut SqliteConnection,
    store_id: &str,
    sku: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE store_id = ?1 AND sku = ?2 AND is_deleted = 0"
    ))
    .bind(store_id)
    .bind(sku)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

/// Lists a store's live products, newest first.
pub async fn list(conn: &mut SqliteConnection, store_id: &str) -> DbResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE store_id = ?1 AND is_deleted = 0 \
         ORDER BY created_at DESC"
    ))
    .bind(store_id)
    .fetch_all(conn)
    .await?;

    Ok(products)
}

/// Fetches a product's lots in FIFO order.
pub async fn fetch_lots(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<StockLot>> {
    let lots = sqlx::query_as::<_, StockLot>(&format!(
        "SELECT {LOT_COLUMNS} FROM stock_lots \
         WHERE product_id = ?1 \
         ORDER BY created_at, seq"
    ))
    .bind(product_id)
    .fetch_all(conn)
    .await?;

    Ok(lots)
}

/// Loads the product together with its lots as one aggregate.
pub async fn fetch_aggregate(conn: &mut SqliteConnection, id: &str) -> DbResult<StockAggregate> {
    let product = fetch_live(&mut *conn, id).await?;
    let lots = fetch_lots(conn, &product.id).await?;
    Ok(StockAggregate::new(product, lots))
}

/// Persists a mutated aggregate: cached product totals plus the full
/// replacement of its lot set.
pub async fn save_stock(conn: &mut SqliteConnection, stock: &StockAggregate) -> DbResult<()> {
    debug!(
        product_id = %stock.product.id,
        shelf = stock.product.shelf_qty,
        warehouse = stock.product.warehouse_qty,
        lots = stock.lots.len(),
        "Saving stock aggregate"
    );

    update(&mut *conn, &stock.product).await?;

    sqlx::query("DELETE FROM stock_lots WHERE product_id = ?1")
        .bind(&stock.product.id)
        .execute(&mut *conn)
        .await?;

    for lot in &stock.lots {
        sqlx::query(
            "INSERT INTO stock_lots \
                 (id, product_id, pool, quantity, unit_cost_micros, debt_document_id, created_at, seq) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&lot.id)
        .bind(&lot.product_id)
        .bind(lot.pool)
        .bind(lot.quantity)
        .bind(lot.unit_cost_micros)
        .bind(&lot.debt_document_id)
        .bind(lot.created_at)
        .bind(lot.seq)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
