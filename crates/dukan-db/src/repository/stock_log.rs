//! # Stock Log Repository
//!
//! Row access for the stock movement journals: transfer records
//! (warehouse→shelf, manual or automatic), purchase imports, and the
//! consumption journal that backs exact line reversal.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{ConsumedLotRecord, ConsumptionSource, StockImportRecord, StockTransferRecord};

const TRANSFER_COLUMNS: &str = "id, product_id, quantity, auto, note, created_at";

const IMPORT_COLUMNS: &str = "id, product_id, store_id, quantity, \
     unit_price_micros, currency, exchange_rate_micros, pool, created_at";

const CONSUMED_COLUMNS: &str = "id, product_id, source_type, source_id, pool, \
     quantity, unit_cost_micros, seq, created_at";

// =============================================================================
// Transfers
// =============================================================================

/// Inserts a transfer record.
pub async fn insert_transfer(
    conn: &mut SqliteConnection,
    transfer: &StockTransferRecord,
) -> DbResult<()> {
    debug!(
        id = %transfer.id,
        product_id = %transfer.product_id,
        quantity = transfer.quantity,
        auto = transfer.auto,
        "Inserting stock transfer"
    );

    sqlx::query(
        "INSERT INTO stock_transfers (id, product_id, quantity, auto, note, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&transfer.id)
    .bind(&transfer.product_id)
    .bind(transfer.quantity)
    .bind(transfer.auto)
    .bind(&transfer.note)
    .bind(transfer.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a transfer record by id.
pub async fn fetch_transfer(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<StockTransferRecord> {
    sqlx::query_as::<_, StockTransferRecord>(&format!(
        "SELECT {TRANSFER_COLUMNS} FROM stock_transfers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("StockTransfer", id))
}

/// Deletes a transfer record.
pub async fn delete_transfer(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM stock_transfers WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

// =============================================================================
// Imports
// =============================================================================

/// Inserts an import record.
pub async fn insert_import(
    conn: &mut SqliteConnection,
    import: &StockImportRecord,
) -> DbResult<()> {
    debug!(
        id = %import.id,
        product_id = %import.product_id,
        quantity = import.quantity,
        "Inserting stock import"
    );

    sqlx::query(
        "INSERT INTO stock_imports (id, product_id, store_id, quantity, \
             unit_price_micros, currency, exchange_rate_micros, pool, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&import.id)
    .bind(&import.product_id)
    .bind(&import.store_id)
    .bind(import.quantity)
    .bind(import.unit_price_micros)
    .bind(import.currency)
    .bind(import.exchange_rate_micros)
    .bind(import.pool)
    .bind(import.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches an import record by id.
pub async fn fetch_import(conn: &mut SqliteConnection, id: &str) -> DbResult<StockImportRecord> {
    sqlx::query_as::<_, StockImportRecord>(&format!(
        "SELECT {IMPORT_COLUMNS} FROM stock_imports WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("StockImport", id))
}

/// Deletes an import record.
pub async fn delete_import(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM stock_imports WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

// =============================================================================
// Consumption Journal
// =============================================================================

/// Inserts one journaled deduction.
pub async fn insert_consumed(
    conn: &mut SqliteConnection,
    record: &ConsumedLotRecord,
) -> DbResult<()> {
    debug!(
        source_id = %record.source_id,
        product_id = %record.product_id,
        quantity = record.quantity,
        "Journaling consumed lot"
    );

    sqlx::query(
        "INSERT INTO consumed_lots (id, product_id, source_type, source_id, pool, \
             quantity, unit_cost_micros, seq, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&record.id)
    .bind(&record.product_id)
    .bind(record.source_type)
    .bind(&record.source_id)
    .bind(record.pool)
    .bind(record.quantity)
    .bind(record.unit_cost_micros)
    .bind(record.seq)
    .bind(record.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a source's journaled deductions in the order they were taken.
pub async fn fetch_consumed(
    conn: &mut SqliteConnection,
    source: &ConsumptionSource,
) -> DbResult<Vec<ConsumedLotRecord>> {
    Ok(sqlx::query_as::<_, ConsumedLotRecord>(&format!(
        "SELECT {CONSUMED_COLUMNS} FROM consumed_lots \
         WHERE source_type = ?1 AND source_id = ?2 ORDER BY created_at, seq"
    ))
    .bind(source.kind())
    .bind(source.source_id())
    .fetch_all(conn)
    .await?)
}

/// Clears a source's journal.
pub async fn delete_consumed(
    conn: &mut SqliteConnection,
    source: &ConsumptionSource,
) -> DbResult<()> {
    sqlx::query("DELETE FROM consumed_lots WHERE source_type = ?1 AND source_id = ?2")
        .bind(source.kind())
        .bind(source.source_id())
        .execute(conn)
        .await?;

    Ok(())
}
