//! # Cash Service
//!
//! Manual cash movements plus balance auditing, and the shared posting
//! helper every event source goes through.
//!
//! ## Posting
//! `post` implements the void-then-record discipline from
//! `dukan_core::cash`: movements for the causing source are removed first,
//! the current income/expense pair is written, and the cached balance is
//! refreshed. Calling it again for the same source is idempotent.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::cash as cash_repo;
use dukan_core::{CashBook, CashMovement, CashSource, LedgerError, Money};

/// What one source record wants on the books right now.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CashEffect {
    pub income: Money,
    pub expense: Money,
    pub exchange_rate: Money,
}

/// Replaces the movements of `source` on the store's account with the
/// given effect. Zero components post nothing; negative ones are rejected
/// before any row changes.
pub(crate) async fn post(
    conn: &mut SqliteConnection,
    account_id: &str,
    source: &CashSource,
    effect: CashEffect,
    note: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    if effect.income.is_negative() || effect.expense.is_negative() {
        return Err(LedgerError::invalid_amount(format!(
            "cash posting for {} must not be negative",
            source.source_id()
        ))
        .into());
    }

    cash_repo::void_source(&mut *conn, account_id, source).await?;

    for (amount, is_outflow) in [(effect.income, false), (effect.expense, true)] {
        if !amount.is_positive() {
            continue;
        }
        let movement = CashMovement {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            amount_micros: amount.micros(),
            is_outflow,
            exchange_rate_micros: effect.exchange_rate.micros(),
            note: note.to_string(),
            source_type: source.kind(),
            source_id: source.source_id().to_string(),
            created_at: now,
        };
        cash_repo::insert_movement(&mut *conn, &movement).await?;
    }

    cash_repo::refresh_balance(conn, account_id).await?;
    Ok(())
}

/// Removes the movements of `source` and refreshes the balance.
pub(crate) async fn void(
    conn: &mut SqliteConnection,
    account_id: &str,
    source: &CashSource,
) -> DbResult<()> {
    let removed = cash_repo::void_source(&mut *conn, account_id, source).await?;
    if removed > 0 {
        cash_repo::refresh_balance(conn, account_id).await?;
    }
    Ok(())
}

// =============================================================================
// Service
// =============================================================================

/// Result of a balance audit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceReport {
    /// The cached balance stored on the account.
    pub recorded: Money,
    /// The balance derived from the live movements.
    pub actual: Money,
    /// `recorded - actual`; non-zero means external tampering.
    pub drift: Money,
}

/// Service for manual cash movements and balance auditing.
#[derive(Debug, Clone)]
pub struct CashService {
    pool: SqlitePool,
}

impl CashService {
    pub fn new(pool: SqlitePool) -> Self {
        CashService { pool }
    }

    /// Records a manual cash inflow (owner deposit, opening float).
    pub async fn record_income(
        &self,
        store_id: &str,
        amount: Money,
        exchange_rate: Money,
        note: &str,
    ) -> DbResult<()> {
        self.record_manual(store_id, amount, false, exchange_rate, note)
            .await
    }

    /// Records a manual cash outflow (rent, utilities, owner draw).
    pub async fn record_expense(
        &self,
        store_id: &str,
        amount: Money,
        exchange_rate: Money,
        note: &str,
    ) -> DbResult<()> {
        self.record_manual(store_id, amount, true, exchange_rate, note)
            .await
    }

    async fn record_manual(
        &self,
        store_id: &str,
        amount: Money,
        is_outflow: bool,
        exchange_rate: Money,
        note: &str,
    ) -> DbResult<()> {
        // each manual entry is its own source, so entries never void each other
        let source = CashSource::Manual(Uuid::new_v4().to_string());
        let effect = if is_outflow {
            CashEffect {
                expense: amount,
                exchange_rate,
                ..Default::default()
            }
        } else {
            CashEffect {
                income: amount,
                exchange_rate,
                ..Default::default()
            }
        };

        let mut tx = self.pool.begin().await?;
        let account = cash_repo::fetch_account(&mut *tx, store_id).await?;
        post(&mut *tx, &account.id, &source, effect, note, Utc::now()).await?;
        tx.commit().await?;

        debug!(store_id, %amount, is_outflow, "Manual cash movement recorded");
        Ok(())
    }

    /// Audits a store's cash account: recorded vs derived balance.
    pub async fn balance(&self, store_id: &str) -> DbResult<BalanceReport> {
        let mut conn = self.pool.acquire().await?;
        let account = cash_repo::fetch_account(&mut conn, store_id).await?;
        let movements = cash_repo::fetch_movements(&mut conn, &account.id).await?;

        let book = CashBook::new(account, movements);
        Ok(BalanceReport {
            recorded: book.account.balance(),
            actual: book.recompute_balance(),
            drift: book.drift(),
        })
    }

    /// A store's movement history, oldest first.
    pub async fn movements(&self, store_id: &str) -> DbResult<Vec<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        let account = cash_repo::fetch_account(&mut conn, store_id).await?;
        cash_repo::fetch_movements(&mut conn, &account.id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::{seed_store, test_db};

    #[tokio::test]
    async fn test_manual_movements_accumulate() {
        let db = test_db().await;
        let store = seed_store(&db).await;

        db.cash()
            .record_income(&store.id, Money::from_major(100), Money::from_major(1), "opening float")
            .await
            .unwrap();
        db.cash()
            .record_expense(&store.id, Money::from_major(30), Money::from_major(1), "rent")
            .await
            .unwrap();
        // two incomes with the same note must not void each other
        db.cash()
            .record_income(&store.id, Money::from_major(100), Money::from_major(1), "opening float")
            .await
            .unwrap();

        let report = db.cash().balance(&store.id).await.unwrap();
        assert_eq!(report.recorded, Money::from_major(170));
        assert_eq!(report.drift, Money::zero());

        let movements = db.cash().movements(&store.id).await.unwrap();
        assert_eq!(movements.len(), 3);
    }

    #[tokio::test]
    async fn test_negative_manual_amount_is_rejected() {
        let db = test_db().await;
        let store = seed_store(&db).await;

        let err = db
            .cash()
            .record_expense(&store.id, Money::from_major(-5), Money::from_major(1), "oops")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
        assert_eq!(db.cash().movements(&store.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_zero_amount_posts_nothing() {
        let db = test_db().await;
        let store = seed_store(&db).await;

        db.cash()
            .record_income(&store.id, Money::zero(), Money::from_major(1), "nothing")
            .await
            .unwrap();
        assert_eq!(db.cash().movements(&store.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_balance_audit_detects_tampering() {
        let db = test_db().await;
        let store = seed_store(&db).await;

        db.cash()
            .record_income(&store.id, Money::from_major(100), Money::from_major(1), "float")
            .await
            .unwrap();

        // fiddle with the cached balance behind the services' back
        sqlx::query("UPDATE cash_accounts SET balance_micros = ?1 WHERE store_id = ?2")
            .bind(Money::from_major(250).micros())
            .bind(&store.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = db.cash().balance(&store.id).await.unwrap();
        assert_eq!(report.recorded, Money::from_major(250));
        assert_eq!(report.actual, Money::from_major(100));
        assert_eq!(report.drift, Money::from_major(150));
    }
}
