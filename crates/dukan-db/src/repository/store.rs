//! # Store Repository
//!
//! Row access for stores and their cash accounts.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{CashAccount, Store};

/// Inserts a store.
pub async fn insert(conn: &mut SqliteConnection, store: &Store) -> DbResult<()> {
    debug!(id = %store.id, name = %store.name, "Inserting store");

    sqlx::query("INSERT INTO stores (id, name, created_at) VALUES (?1, ?2, ?3)")
        .bind(&store.id)
        .bind(&store.name)
        .bind(store.created_at)
        .execute(conn)
        .await?;

    Ok(())
}

/// Fetches a store by id.
pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Store> {
    sqlx::query_as::<_, Store>("SELECT id, name, created_at FROM stores WHERE id = ?1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Store", id))
}

/// Inserts a cash account.
pub async fn insert_account(conn: &mut SqliteConnection, account: &CashAccount) -> DbResult<()> {
    sqlx::query("INSERT INTO cash_accounts (id, store_id, balance_micros) VALUES (?1, ?2, ?3)")
        .bind(&account.id)
        .bind(&account.store_id)
        .bind(account.balance_micros)
        .execute(conn)
        .await?;

    Ok(())
}
