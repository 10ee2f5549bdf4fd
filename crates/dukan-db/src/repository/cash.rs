//! # Cash Repository
//!
//! Row access for cash accounts and their movements.
//!
//! The posting discipline (void-then-record per source, zero no-op,
//! negative rejected) lives in the cash service; this module only knows how
//! to store movements and keep the cached balance in step with them.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{CashAccount, CashMovement, CashSource, Money};

const MOVEMENT_COLUMNS: &str = "id, account_id, amount_micros, is_outflow, \
     exchange_rate_micros, note, source_type, source_id, created_at";

/// Fetches a store's cash account.
pub async fn fetch_account(conn: &mut SqliteConnection, store_id: &str) -> DbResult<CashAccount> {
    sqlx::query_as::<_, CashAccount>(
        "SELECT id, store_id, balance_micros FROM cash_accounts WHERE store_id = ?1",
    )
    .bind(store_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("CashAccount", store_id))
}

/// Fetches all movements of an account, oldest first.
pub async fn fetch_movements(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> DbResult<Vec<CashMovement>> {
    let movements = sqlx::query_as::<_, CashMovement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM cash_movements \
         WHERE account_id = ?1 ORDER BY created_at, id"
    ))
    .bind(account_id)
    .fetch_all(conn)
    .await?;

    Ok(movements)
}

/// Inserts a movement.
pub async fn insert_movement(conn: &mut SqliteConnection, movement: &CashMovement) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO cash_movements \
             (id, account_id, amount_micros, is_outflow, exchange_rate_micros, \
              note, source_type, source_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&movement.id)
    .bind(&movement.account_id)
    .bind(movement.amount_micros)
    .bind(movement.is_outflow)
    .bind(movement.exchange_rate_micros)
    .bind(&movement.note)
    .bind(movement.source_type)
    .bind(&movement.source_id)
    .bind(movement.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Deletes every movement of an account tagged with `source`. Returns how
/// many rows were removed.
pub async fn void_source(
    conn: &mut SqliteConnection,
    account_id: &str,
    source: &CashSource,
) -> DbResult<u64> {
    let result = sqlx::query(
        "DELETE FROM cash_movements \
         WHERE account_id = ?1 AND source_type = ?2 AND source_id = ?3",
    )
    .bind(account_id)
    .bind(source.kind())
    .bind(source.source_id())
    .execute(conn)
    .await?;

    if result.rows_affected() > 0 {
        debug!(
            account_id,
            source_id = source.source_id(),
            removed = result.rows_affected(),
            "Voided cash movements"
        );
    }
    Ok(result.rows_affected())
}

/// Rederives the balance from the live movements and stores it on the
/// account. Returns the fresh balance.
pub async fn refresh_balance(conn: &mut SqliteConnection, account_id: &str) -> DbResult<Money> {
    let balance_micros: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(CASE WHEN is_outflow THEN -amount_micros ELSE amount_micros END), 0) \
         FROM cash_movements WHERE account_id = ?1",
    )
    .bind(account_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE cash_accounts SET balance_micros = ?2 WHERE id = ?1")
        .bind(account_id)
        .bind(balance_micros)
        .execute(conn)
        .await?;

    Ok(Money::from_micros(balance_micros))
}
