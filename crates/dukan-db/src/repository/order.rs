//! # Order Repository
//!
//! Row access for orders, order lines, refunds, and waste entries.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{Order, OrderLine, Refund, WasteEntry};

const ORDER_COLUMNS: &str = "id, store_id, phone_number, first_name, last_name, \
     payment_type, currency, exchange_rate_micros, total_price_micros, \
     paid_amount_micros, change_given, change_amount_micros, \
     is_deleted, deleted_at, created_at";

const LINE_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price_micros, currency, exchange_rate_micros";

const REFUND_COLUMNS: &str =
    "id, order_line_id, debt_line_id, reason, custom_reason, quantity, created_at";

// =============================================================================
// Orders
// =============================================================================

/// Inserts an order.
pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, total = order.total_price_micros, "Inserting order");

    sqlx::query(
        "INSERT INTO orders (id, store_id, phone_number, first_name, last_name, \
             payment_type, currency, exchange_rate_micros, total_price_micros, \
             paid_amount_micros, change_given, change_amount_micros, \
             is_deleted, deleted_at, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .bind(&order.id)
    .bind(&order.store_id)
    .bind(&order.phone_number)
    .bind(&order.first_name)
    .bind(&order.last_name)
    .bind(order.payment_type)
    .bind(order.currency)
    .bind(order.exchange_rate_micros)
    .bind(order.total_price_micros)
    .bind(order.paid_amount_micros)
    .bind(order.change_given)
    .bind(order.change_amount_micros)
    .bind(order.is_deleted)
    .bind(order.deleted_at)
    .bind(order.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates an order's mutable columns.
pub async fn update(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        "UPDATE orders SET total_price_micros = ?2, paid_amount_micros = ?3, \
             change_given = ?4, change_amount_micros = ?5, \
             is_deleted = ?6, deleted_at = ?7 \
         WHERE id = ?1",
    )
    .bind(&order.id)
    .bind(order.total_price_micros)
    .bind(order.paid_amount_micros)
    .bind(order.change_given)
    .bind(order.change_amount_micros)
    .bind(order.is_deleted)
    .bind(order.deleted_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches an order by id, deleted or not.
pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
    sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
}

/// Inserts an order line.
pub async fn insert_line(conn: &mut SqliteConnection, line: &OrderLine) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO order_lines (id, order_id, product_id, quantity, \
             unit_price_micros, currency, exchange_rate_micros) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&line.id)
    .bind(&line.order_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_micros)
    .bind(line.currency)
    .bind(line.exchange_rate_micros)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches an order line by id.
pub async fn fetch_line(conn: &mut SqliteConnection, id: &str) -> DbResult<OrderLine> {
    sqlx::query_as::<_, OrderLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM order_lines WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("OrderLine", id))
}

/// Fetches an order's lines.
pub async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
    let lines = sqlx::query_as::<_, OrderLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

// =============================================================================
// Refunds
// =============================================================================

/// Inserts a refund.
pub async fn insert_refund(conn: &mut SqliteConnection, refund: &Refund) -> DbResult<()> {
    debug!(id = %refund.id, reason = ?refund.reason, quantity = refund.quantity, "Inserting refund");

    sqlx::query(
        "INSERT INTO refunds (id, order_line_id, debt_line_id, reason, \
             custom_reason, quantity, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&refund.id)
    .bind(&refund.order_line_id)
    .bind(&refund.debt_line_id)
    .bind(refund.reason)
    .bind(&refund.custom_reason)
    .bind(refund.quantity)
    .bind(refund.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a refund by id.
pub async fn fetch_refund(conn: &mut SqliteConnection, id: &str) -> DbResult<Refund> {
    sqlx::query_as::<_, Refund>(&format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Refund", id))
}

/// Permanently deletes a refund row.
pub async fn delete_refund(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM refunds WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Total quantity already refunded against an order line.
pub async fn refunded_quantity_for_order_line(
    conn: &mut SqliteConnection,
    order_line_id: &str,
) -> DbResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM refunds WHERE order_line_id = ?1",
    )
    .bind(order_line_id)
    .fetch_one(conn)
    .await?;

    Ok(total)
}

// =============================================================================
// Waste Entries
// =============================================================================

/// Inserts a waste entry.
pub async fn insert_waste(conn: &mut SqliteConnection, waste: &WasteEntry) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO waste_entries (id, product_id, quantity, reason, refund_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&waste.id)
    .bind(&waste.product_id)
    .bind(waste.quantity)
    .bind(&waste.reason)
    .bind(&waste.refund_id)
    .bind(waste.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Deletes the waste entry created by a refund, if any.
pub async fn delete_waste_for_refund(conn: &mut SqliteConnection, refund_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM waste_entries WHERE refund_id = ?1")
        .bind(refund_id)
        .execute(conn)
        .await?;

    Ok(())
}
