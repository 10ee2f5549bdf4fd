//! # Stock Service
//!
//! Manual stock transfers (warehouse→shelf) and purchase imports, plus the
//! shared consume/produce helpers the other event sources build on.
//!
//! ## Transfer Journal
//! Every warehouse→shelf move leaves a `StockTransferRecord`. Manual moves
//! carry `auto = false`; the implicit top-up a shelf shortfall triggers
//! during consumption carries `auto = true`. Deleting a record performs the
//! inverse move.
//!
//! ## Imports
//! ```text
//! import 10 × 2.00   →  lots: +10 @2.00 (chosen pool)
//!                       cash:  -20.00 expense, source = StockImport(id)
//!
//! delete import      →  lots: -10 @2.00 (matching-cost walk)
//!                       cash:  movements voided, balance refreshed
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{cash as cash_repo, product as product_repo, stock_log};
use crate::service::cash::{self, CashEffect};
use dukan_core::money::normalize;
use dukan_core::validation::{validate_exchange_rate, validate_quantity};
use dukan_core::{
    CashSource, ConsumedLot, ConsumedLotRecord, Consumption, ConsumptionSource, Currency,
    LedgerError, Money, StockImportRecord, StockPool, StockTransferRecord,
};

// =============================================================================
// Shared Helpers
// =============================================================================

/// Consumes `quantity` of a product inside the caller's transaction,
/// journaling the automatic warehouse→shelf top-up when one happened.
/// Returns the per-lot deductions for callers that persist them.
pub(crate) async fn consume_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<Consumption> {
    let mut stock = product_repo::fetch_aggregate(&mut *conn, product_id).await?;
    let result = stock.consume(quantity, now)?;
    product_repo::save_stock(&mut *conn, &stock).await?;

    if result.auto_transferred > 0 {
        let record = StockTransferRecord {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity: result.auto_transferred,
            auto: true,
            note: String::new(),
            created_at: now,
        };
        stock_log::insert_transfer(conn, &record).await?;
    }
    Ok(result)
}

/// Consumes for `source` and journals each (pool, qty, cost) deduction, so
/// [`reverse_consumption`] can later recreate exactly those units.
pub(crate) async fn consume_stock_for(
    conn: &mut SqliteConnection,
    source: &ConsumptionSource,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = consume_stock(conn, product_id, quantity, now).await?;
    for (seq, taken) in result.consumed.iter().enumerate() {
        let record = ConsumedLotRecord {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            source_type: source.kind(),
            source_id: source.source_id().to_string(),
            pool: taken.pool,
            quantity: taken.quantity,
            unit_cost_micros: taken.unit_cost_micros,
            seq: seq as i64,
            created_at: now,
        };
        stock_log::insert_consumed(conn, &record).await?;
    }
    Ok(())
}

/// Reverses a source's journaled consumption: up to `quantity` units come
/// back as lots at the exact costs they were taken at, oldest deductions
/// first, and the journal is cleared.
///
/// `quantity` is the line's current quantity. Refunds may have shrunk it
/// below what was journaled; only the outstanding units return.
pub(crate) async fn reverse_consumption(
    conn: &mut SqliteConnection,
    source: &ConsumptionSource,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let records = stock_log::fetch_consumed(&mut *conn, source).await?;
    stock_log::delete_consumed(&mut *conn, source).await?;

    let mut remaining = quantity.max(0);
    let mut consumed = Vec::new();
    for record in &records {
        if remaining == 0 {
            break;
        }
        let qty = record.quantity.min(remaining);
        remaining -= qty;
        consumed.push(ConsumedLot {
            pool: record.pool,
            quantity: qty,
            unit_cost_micros: record.unit_cost_micros,
        });
    }
    if consumed.is_empty() {
        return Ok(());
    }

    let mut stock = product_repo::fetch_aggregate(&mut *conn, &records[0].product_id).await?;
    stock.reverse(&consumed, now);
    product_repo::save_stock(conn, &stock).await?;
    Ok(())
}

/// Like [`consume_stock`], but for undoing a previously applied effect:
/// a shortfall here means the stock was mutated outside the ledger, so it
/// surfaces as an invariant violation instead of a caller error.
pub(crate) async fn consume_for_reversal(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    consume_stock(conn, product_id, quantity, now)
        .await
        .map(|_| ())
        .map_err(reversal_error)
}

/// Adds stock inside the caller's transaction.
pub(crate) async fn produce_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    unit_cost: Money,
    pool: StockPool,
    debt_document_id: Option<String>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let mut stock = product_repo::fetch_aggregate(&mut *conn, product_id).await?;
    stock.produce(quantity, unit_cost, pool, debt_document_id, now)?;
    product_repo::save_stock(conn, &stock).await?;
    Ok(())
}

/// Remaps stock shortfalls raised while reversing into invariant
/// violations; other errors pass through.
pub(crate) fn reversal_error(err: DbError) -> DbError {
    match err {
        DbError::Ledger(ledger) => DbError::Ledger(ledger.into_reversal_violation()),
        other => other,
    }
}

// =============================================================================
// Service
// =============================================================================

/// Input for a purchase import.
#[derive(Debug, Clone)]
pub struct ImportInput {
    pub product_id: String,
    pub quantity: i64,
    /// Purchase unit price in `currency`.
    pub unit_price: Money,
    pub currency: Currency,
    pub exchange_rate: Money,
    /// Where the goods land.
    pub pool: StockPool,
}

/// Service for manual transfers and purchase imports.
#[derive(Debug, Clone)]
pub struct StockService {
    pool: SqlitePool,
}

impl StockService {
    pub fn new(pool: SqlitePool) -> Self {
        StockService { pool }
    }

    /// Moves `quantity` units warehouse→shelf and journals the move.
    pub async fn transfer_to_shelf(
        &self,
        product_id: &str,
        quantity: i64,
        note: &str,
    ) -> DbResult<StockTransferRecord> {
        validate_quantity(quantity).map_err(LedgerError::from)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut stock = product_repo::fetch_aggregate(&mut *tx, product_id).await?;
        stock.transfer_to_shelf(quantity, now)?;
        product_repo::save_stock(&mut *tx, &stock).await?;

        let record = StockTransferRecord {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity,
            auto: false,
            note: note.to_string(),
            created_at: now,
        };
        stock_log::insert_transfer(&mut *tx, &record).await?;
        tx.commit().await?;

        info!(product_id, quantity, "Stock transferred to shelf");
        Ok(record)
    }

    /// Deletes a transfer record by performing the inverse shelf→warehouse
    /// move. Fails with an invariant violation if the shelf no longer
    /// holds the moved quantity.
    pub async fn delete_transfer(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let record = stock_log::fetch_transfer(&mut *tx, id).await?;

        let mut stock = product_repo::fetch_aggregate(&mut *tx, &record.product_id).await?;
        stock
            .transfer_to_warehouse(record.quantity, now)
            .map_err(|e| reversal_error(e.into()))?;
        product_repo::save_stock(&mut *tx, &stock).await?;

        stock_log::delete_transfer(&mut *tx, id).await?;
        tx.commit().await?;

        info!(transfer_id = %id, "Stock transfer deleted");
        Ok(())
    }

    /// Imports purchased goods: lots appear at the normalized purchase
    /// cost, and the total leaves the cash account as an expense.
    pub async fn import(&self, input: ImportInput) -> DbResult<StockImportRecord> {
        validate_quantity(input.quantity).map_err(LedgerError::from)?;
        if !input.currency.is_reference() {
            validate_exchange_rate(input.exchange_rate).map_err(LedgerError::from)?;
        }
        let unit_cost = normalize(input.unit_price, input.currency, input.exchange_rate)?;
        let now = Utc::now();

        let record = StockImportRecord {
            id: Uuid::new_v4().to_string(),
            product_id: input.product_id.clone(),
            store_id: String::new(), // filled below from the product
            quantity: input.quantity,
            unit_price_micros: input.unit_price.micros(),
            currency: input.currency,
            exchange_rate_micros: input.exchange_rate.micros(),
            pool: input.pool,
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;
        let product = product_repo::fetch_live(&mut *tx, &input.product_id).await?;
        let record = StockImportRecord {
            store_id: product.store_id.clone(),
            ..record
        };

        produce_stock(
            &mut *tx,
            &input.product_id,
            input.quantity,
            unit_cost,
            input.pool,
            None,
            now,
        )
        .await?;
        stock_log::insert_import(&mut *tx, &record).await?;

        let account = cash_repo::fetch_account(&mut *tx, &product.store_id).await?;
        cash::post(
            &mut *tx,
            &account.id,
            &CashSource::StockImport(record.id.clone()),
            CashEffect {
                expense: unit_cost.multiply_quantity(input.quantity),
                exchange_rate: input.exchange_rate,
                ..Default::default()
            },
            &format!("stock import: {}", product.name),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            import_id = %record.id,
            product_id = %record.product_id,
            quantity = record.quantity,
            "Stock imported"
        );
        Ok(record)
    }

    /// Deletes an import: the imported quantity is removed at the exact
    /// import cost (merged lots included), and the cash expense is voided.
    pub async fn delete_import(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let record = stock_log::fetch_import(&mut *tx, id).await?;
        let unit_cost = normalize(
            record.unit_price(),
            record.currency,
            record.exchange_rate(),
        )?;

        let mut stock = product_repo::fetch_aggregate(&mut *tx, &record.product_id).await?;
        stock
            .consume_matching_cost(record.quantity, unit_cost, record.pool)
            .map_err(|e| reversal_error(e.into()))?;
        product_repo::save_stock(&mut *tx, &stock).await?;

        let account = cash_repo::fetch_account(&mut *tx, &record.store_id).await?;
        cash::void(
            &mut *tx,
            &account.id,
            &CashSource::StockImport(record.id.clone()),
        )
        .await?;

        stock_log::delete_import(&mut *tx, id).await?;
        tx.commit().await?;

        info!(import_id = %id, "Stock import deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
