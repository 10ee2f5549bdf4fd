//! # Debt Service
//!
//! Debtors and debt documents: credit handed out (`transfer`) and
//! settlements coming back (`accept`), with cash, stock, and the debtor
//! balance kept consistent through every edit, delete, and restore.
//!
//! ## Document Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 method = transfer        method = accept                │
//! │                 ─────────────────        ───────────────                │
//! │  product line   stock leaves (FIFO)      stock returns at line price   │
//! │  cash amount    expense                  income                        │
//! │  balance        transferred += total     accepted += total             │
//! │                                                                         │
//! │  soft delete    every effect above applied in reverse, then flagged    │
//! │  restore        flag cleared, every effect re-applied                  │
//! │  mirror docs    no effects at all, ever                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts on documents and lines stay in the document's own currency; the
//! conversion to the reference currency happens where it is needed (lot
//! costs, cash movements) and to the debtor's currency during balance
//! replay.
//!
//! Transfer lines journal their per-lot deductions at creation. Deleting
//! the line (or its document) returns those exact units at those exact
//! costs, so a delete and restore leaves lots and average cost where the
//! create put them.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{cash as cash_repo, debt as debt_repo};
use crate::service::cash::{self, CashEffect};
use crate::service::stock::{
    consume_for_reversal, consume_stock_for, produce_stock, reverse_consumption,
};
use dukan_core::money::normalize;
use dukan_core::validation::{
    validate_exchange_rate, validate_phone, validate_quantity, validate_required,
};
use dukan_core::{
    debt, CashSource, ConsumptionSource, Currency, DebtDocument, DebtLine, Debtor, DocumentMethod,
    LedgerError, Money, SoftDeletable, StockPool,
};

// =============================================================================
// Inputs
// =============================================================================

/// Input for looking up or creating a debtor.
#[derive(Debug, Clone)]
pub struct DebtorInput {
    pub store_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub currency: Currency,
    pub exchange_rate: Money,
}

/// One product line of a document being created. `unit_price` is in the
/// document's currency.
#[derive(Debug, Clone)]
pub struct DebtLineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Input for creating a document.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub debtor_id: String,
    pub method: DocumentMethod,
    pub currency: Currency,
    pub exchange_rate: Money,
    /// Cash component in the document's currency; zero for goods-only.
    pub cash_amount: Money,
    pub lines: Vec<DebtLineInput>,
    /// Mirror documents are recorded but never touch stock, cash, or the
    /// debtor balance.
    pub is_mirror: bool,
    /// Defaults to now.
    pub date: Option<DateTime<Utc>>,
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Replays a debtor's documents into their cached totals and persists
/// them. Every document mutation ends with this.
pub(crate) async fn recalculate_debtor(
    conn: &mut SqliteConnection,
    debtor_id: &str,
) -> DbResult<()> {
    let mut debtor = debt_repo::fetch_debtor(&mut *conn, debtor_id).await?;
    let documents = debt_repo::fetch_documents(&mut *conn, debtor_id).await?;
    debt::recalculate(&mut debtor, &documents);
    debt_repo::update_debtor(conn, &debtor).await
}

/// The line's unit price converted to the reference currency, used for
/// lot costs.
fn line_unit_cost(line: &DebtLine) -> DbResult<Money> {
    Ok(normalize(
        line.unit_price(),
        line.currency,
        line.exchange_rate(),
    )?)
}

/// Applies one line's forward stock effect. Transfer deductions are
/// journaled per lot cost so their reversal is exact.
async fn apply_line_stock(
    conn: &mut SqliteConnection,
    doc: &DebtDocument,
    line: &DebtLine,
    now: DateTime<Utc>,
) -> DbResult<()> {
    match doc.method {
        DocumentMethod::Transfer => {
            let source = ConsumptionSource::DebtLine(line.id.clone());
            consume_stock_for(conn, &source, &line.product_id, line.quantity, now).await
        }
        DocumentMethod::Accept => {
            produce_stock(
                conn,
                &line.product_id,
                line.quantity,
                line_unit_cost(line)?,
                StockPool::Shelf,
                Some(doc.id.clone()),
                now,
            )
            .await
        }
    }
}

/// Applies one line's reverse stock effect (the exact inverse of
/// [`apply_line_stock`]): transfer lines get their journaled units back at
/// the consumed costs, accept lines are consumed again.
async fn reverse_line_stock(
    conn: &mut SqliteConnection,
    doc: &DebtDocument,
    line: &DebtLine,
    now: DateTime<Utc>,
) -> DbResult<()> {
    match doc.method {
        DocumentMethod::Transfer => {
            let source = ConsumptionSource::DebtLine(line.id.clone());
            reverse_consumption(conn, &source, line.quantity, now).await
        }
        DocumentMethod::Accept => {
            consume_for_reversal(conn, &line.product_id, line.quantity, now).await
        }
    }
}

/// The cash movements a document wants on the books: its cash component in
/// the reference currency, direction by method.
fn document_cash_effect(doc: &DebtDocument) -> DbResult<CashEffect> {
    let amount = normalize(doc.cash_amount(), doc.currency, doc.exchange_rate())?;
    Ok(match doc.method {
        DocumentMethod::Transfer => CashEffect {
            expense: amount,
            exchange_rate: doc.exchange_rate(),
            ..Default::default()
        },
        DocumentMethod::Accept => CashEffect {
            income: amount,
            exchange_rate: doc.exchange_rate(),
            ..Default::default()
        },
    })
}

/// Re-posts (or first posts) a document's cash movements.
async fn post_document_cash(conn: &mut SqliteConnection, doc: &DebtDocument) -> DbResult<()> {
    let account = cash_repo::fetch_account(&mut *conn, &doc.store_id).await?;
    let effect = document_cash_effect(doc)?;
    cash::post(
        conn,
        &account.id,
        &CashSource::DebtDocument(doc.id.clone()),
        effect,
        "debt document",
        doc.date,
    )
    .await
}

/// Removes a document's cash movements.
async fn void_document_cash(conn: &mut SqliteConnection, doc: &DebtDocument) -> DbResult<()> {
    let account = cash_repo::fetch_account(&mut *conn, &doc.store_id).await?;
    cash::void(conn, &account.id, &CashSource::DebtDocument(doc.id.clone())).await
}

// =============================================================================
// Service
// =============================================================================

/// Service for debtors and debt documents.
#[derive(Debug, Clone)]
pub struct DebtService {
    pool: SqlitePool,
}

impl DebtService {
    pub fn new(pool: SqlitePool) -> Self {
        DebtService { pool }
    }

    // -------------------------------------------------------------------------
    // Debtors
    // -------------------------------------------------------------------------

    /// Finds the store's live debtor with this phone number, or creates
    /// one. The phone number identifies a debtor only among LIVE debtors;
    /// a deleted debtor's number is free for reuse.
    pub async fn get_or_create_debtor(&self, input: DebtorInput) -> DbResult<Debtor> {
        validate_phone(&input.phone_number).map_err(LedgerError::from)?;
        validate_required("first_name", &input.first_name).map_err(LedgerError::from)?;

        let mut tx = self.pool.begin().await?;
        if let Some(existing) =
            debt_repo::find_live_by_phone(&mut *tx, &input.store_id, &input.phone_number).await?
        {
            return Ok(existing);
        }

        let debtor = Debtor::new(
            input.store_id,
            input.phone_number.trim(),
            input.first_name.trim(),
            input.last_name.trim(),
            input.currency,
            input.exchange_rate,
            Utc::now(),
        );
        debt_repo::insert_debtor(&mut *tx, &debtor).await?;
        tx.commit().await?;

        info!(debtor_id = %debtor.id, phone = %debtor.phone_number, "Debtor created");
        Ok(debtor)
    }

    /// Fetches a debtor by id.
    pub async fn get_debtor(&self, id: &str) -> DbResult<Debtor> {
        let mut conn = self.pool.acquire().await?;
        debt_repo::fetch_debtor(&mut conn, id).await
    }

    /// Soft-deletes a debtor, cascading over their live documents: each is
    /// reversed and flagged with the same deletion timestamp, so a later
    /// restore can pick up exactly this set.
    pub async fn soft_delete_debtor(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut debtor = debt_repo::fetch_debtor(&mut *tx, id).await?;
        if !debtor.mark_deleted(now) {
            return Ok(());
        }

        for mut doc in debt_repo::fetch_live_documents(&mut *tx, id).await? {
            if doc.affects_ledger() {
                for line in debt_repo::fetch_lines(&mut *tx, &doc.id).await? {
                    reverse_line_stock(&mut *tx, &doc, &line, now).await?;
                }
                void_document_cash(&mut *tx, &doc).await?;
            }
            doc.mark_deleted(now);
            debt_repo::update_document(&mut *tx, &doc).await?;
        }

        debt_repo::update_debtor(&mut *tx, &debtor).await?;
        recalculate_debtor(&mut *tx, id).await?;
        tx.commit().await?;

        info!(debtor_id = %id, "Debtor soft-deleted");
        Ok(())
    }

    /// Restores a soft-deleted debtor and the documents deleted in the
    /// same cascade (matched by the shared deletion timestamp). Documents
    /// deleted individually before the cascade stay deleted.
    pub async fn restore_debtor(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut debtor = debt_repo::fetch_debtor(&mut *tx, id).await?;
        let cascade_stamp = debtor.deleted_at;
        if !debtor.mark_restored() {
            return Ok(());
        }

        for mut doc in debt_repo::fetch_documents(&mut *tx, id).await? {
            if !doc.is_deleted || doc.deleted_at != cascade_stamp {
                continue;
            }
            doc.mark_restored();
            if doc.affects_ledger() {
                let now = Utc::now();
                for line in debt_repo::fetch_lines(&mut *tx, &doc.id).await? {
                    apply_line_stock(&mut *tx, &doc, &line, now).await?;
                }
                post_document_cash(&mut *tx, &doc).await?;
            }
            debt_repo::update_document(&mut *tx, &doc).await?;
        }

        debt_repo::update_debtor(&mut *tx, &debtor).await?;
        recalculate_debtor(&mut *tx, id).await?;
        tx.commit().await?;

        info!(debtor_id = %id, "Debtor restored");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Creates a document: applies stock per line, posts the cash
    /// component, and replays the debtor balance.
    pub async fn create_document(&self, input: DocumentInput) -> DbResult<DebtDocument> {
        if !input.currency.is_reference() {
            validate_exchange_rate(input.exchange_rate).map_err(LedgerError::from)?;
        }
        if input.cash_amount.is_negative() {
            return Err(LedgerError::invalid_amount("cash amount must not be negative").into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let debtor = debt_repo::fetch_debtor(&mut *tx, &input.debtor_id).await?;
        if debtor.is_deleted {
            return Err(DbError::not_found("Debtor", &input.debtor_id));
        }

        let mut doc = DebtDocument {
            id: Uuid::new_v4().to_string(),
            debtor_id: debtor.id.clone(),
            store_id: debtor.store_id.clone(),
            method: input.method,
            currency: input.currency,
            exchange_rate_micros: input.exchange_rate.micros(),
            cash_amount_micros: input.cash_amount.micros(),
            product_amount_micros: 0,
            total_amount_micros: input.cash_amount.micros(),
            is_mirror: input.is_mirror,
            is_deleted: false,
            deleted_at: None,
            date: input.date.unwrap_or(now),
        };

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            validate_quantity(line.quantity).map_err(LedgerError::from)?;
            let line = DebtLine {
                id: Uuid::new_v4().to_string(),
                document_id: doc.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_micros: line.unit_price.micros(),
                amount_micros: line.unit_price.multiply_quantity(line.quantity).micros(),
                currency: input.currency,
                exchange_rate_micros: input.exchange_rate.micros(),
            };
            if doc.affects_ledger() {
                apply_line_stock(&mut *tx, &doc, &line, now).await?;
            }
            lines.push(line);
        }
        doc.retotal(&lines);

        debt_repo::insert_document(&mut *tx, &doc).await?;
        for line in &lines {
            debt_repo::insert_line(&mut *tx, line).await?;
        }

        if doc.affects_ledger() {
            post_document_cash(&mut *tx, &doc).await?;
        }
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            debtor_id = %doc.debtor_id,
            method = ?doc.method,
            total = %doc.total_amount(),
            "Debt document created"
        );
        Ok(doc)
    }

    /// Updates a document's cash component and date. Stock lines are
    /// edited through [`add_line`](Self::add_line) and
    /// [`delete_line`](Self::delete_line).
    pub async fn update_document(
        &self,
        id: &str,
        cash_amount: Money,
        date: Option<DateTime<Utc>>,
    ) -> DbResult<DebtDocument> {
        if cash_amount.is_negative() {
            return Err(LedgerError::invalid_amount("cash amount must not be negative").into());
        }

        let mut tx = self.pool.begin().await?;
        let mut doc = self.fetch_live_document(&mut tx, id).await?;

        doc.cash_amount_micros = cash_amount.micros();
        if let Some(date) = date {
            doc.date = date;
        }
        let lines = debt_repo::fetch_lines(&mut *tx, &doc.id).await?;
        doc.retotal(&lines);

        debt_repo::update_document(&mut *tx, &doc).await?;
        if doc.affects_ledger() {
            post_document_cash(&mut *tx, &doc).await?;
        }
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        Ok(doc)
    }

    /// Adds a product line to a live document, applying its stock effect
    /// and retotaling.
    pub async fn add_line(&self, document_id: &str, input: DebtLineInput) -> DbResult<DebtLine> {
        validate_quantity(input.quantity).map_err(LedgerError::from)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut doc = self.fetch_live_document(&mut tx, document_id).await?;

        let line = DebtLine {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            product_id: input.product_id.clone(),
            quantity: input.quantity,
            unit_price_micros: input.unit_price.micros(),
            amount_micros: input.unit_price.multiply_quantity(input.quantity).micros(),
            currency: doc.currency,
            exchange_rate_micros: doc.exchange_rate_micros,
        };
        if doc.affects_ledger() {
            apply_line_stock(&mut *tx, &doc, &line, now).await?;
        }
        debt_repo::insert_line(&mut *tx, &line).await?;

        let lines = debt_repo::fetch_lines(&mut *tx, &doc.id).await?;
        doc.retotal(&lines);
        debt_repo::update_document(&mut *tx, &doc).await?;
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        Ok(line)
    }

    /// Removes a line from a live document, reversing its stock effect
    /// and retotaling.
    pub async fn delete_line(&self, line_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let line = debt_repo::fetch_line(&mut *tx, line_id).await?;
        let mut doc = self.fetch_live_document(&mut tx, &line.document_id).await?;

        if doc.affects_ledger() {
            reverse_line_stock(&mut *tx, &doc, &line, now).await?;
        }
        debt_repo::delete_line(&mut *tx, line_id).await?;

        let lines = debt_repo::fetch_lines(&mut *tx, &doc.id).await?;
        doc.retotal(&lines);
        debt_repo::update_document(&mut *tx, &doc).await?;
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Soft-deletes a document: stock reversed per line, cash voided,
    /// balance replayed. Idempotent.
    pub async fn soft_delete_document(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut doc = debt_repo::fetch_document(&mut *tx, id).await?;
        if !doc.mark_deleted(now) {
            return Ok(());
        }

        if doc.affects_ledger() {
            for line in debt_repo::fetch_lines(&mut *tx, &doc.id).await? {
                reverse_line_stock(&mut *tx, &doc, &line, now).await?;
            }
            void_document_cash(&mut *tx, &doc).await?;
        }

        debt_repo::update_document(&mut *tx, &doc).await?;
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        info!(document_id = %id, "Debt document soft-deleted");
        Ok(())
    }

    /// Restores a soft-deleted document: stock re-applied per line, cash
    /// re-posted, balance replayed. Idempotent.
    pub async fn restore_document(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut doc = debt_repo::fetch_document(&mut *tx, id).await?;
        if !doc.mark_restored() {
            return Ok(());
        }

        if doc.affects_ledger() {
            for line in debt_repo::fetch_lines(&mut *tx, &doc.id).await? {
                apply_line_stock(&mut *tx, &doc, &line, now).await?;
            }
            post_document_cash(&mut *tx, &doc).await?;
        }

        debt_repo::update_document(&mut *tx, &doc).await?;
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        info!(document_id = %id, "Debt document restored");
        Ok(())
    }

    /// Permanently erases a document (erroneous records only). A live
    /// document is reversed first; its lines go with it.
    pub async fn hard_delete_document(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let doc = debt_repo::fetch_document(&mut *tx, id).await?;

        if !doc.is_deleted && doc.affects_ledger() {
            for line in debt_repo::fetch_lines(&mut *tx, &doc.id).await? {
                reverse_line_stock(&mut *tx, &doc, &line, now).await?;
            }
        }
        if doc.affects_ledger() {
            // deleted docs already voided their cash; voiding is idempotent
            void_document_cash(&mut *tx, &doc).await?;
        }

        debt_repo::hard_delete_document(&mut *tx, id).await?;
        recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        tx.commit().await?;

        info!(document_id = %id, "Debt document hard-deleted");
        Ok(())
    }

    /// Fetches a document with its lines.
    pub async fn get_document(&self, id: &str) -> DbResult<(DebtDocument, Vec<DebtLine>)> {
        let mut conn = self.pool.acquire().await?;
        let doc = debt_repo::fetch_document(&mut conn, id).await?;
        let lines = debt_repo::fetch_lines(&mut conn, &doc.id).await?;
        Ok((doc, lines))
    }

    async fn fetch_live_document(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: &str,
    ) -> DbResult<DebtDocument> {
        let doc = debt_repo::fetch_document(&mut *tx, id).await?;
        if doc.is_deleted {
            return Err(DbError::not_found("DebtDocument", id));
        }
        Ok(doc)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::{balance, product_state, seed_product, seed_stock, seed_store, test_db};

    async fn seed_debtor(db: &crate::pool::Database, store_id: &str) -> Debtor {
        db.debts()
            .get_or_create_debtor(DebtorInput {
                store_id: store_id.to_string(),
                phone_number: "+998901234567".into(),
                first_name: "Ali".into(),
                last_name: "Valiyev".into(),
                currency: Currency::Usd,
                exchange_rate: Money::from_major(1),
            })
            .await
            .unwrap()
    }

    fn transfer_doc(debtor_id: &str, product_id: &str, quantity: i64, cash_major: i64) -> DocumentInput {
        DocumentInput {
            debtor_id: debtor_id.to_string(),
            method: DocumentMethod::Transfer,
            currency: Currency::Usd,
            exchange_rate: Money::from_major(1),
            cash_amount: Money::from_major(cash_major),
            lines: vec![DebtLineInput {
                product_id: product_id.to_string(),
                quantity,
                unit_price: Money::from_major(5),
            }],
            is_mirror: false,
            date: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_debtor_reuses_live_match() {
        let db = test_db().await;
        let store = seed_store(&db).await;

        let first = seed_debtor(&db, &store.id).await;
        let second = seed_debtor(&db, &store.id).await;
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_transfer_document_moves_stock_cash_and_balance() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await; // cash: -20
        let debtor = seed_debtor(&db, &store.id).await;

        // 3 × 5.00 on credit plus 7.00 cash handed out
        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 7))
            .await
            .unwrap();
        assert_eq!(doc.total_amount(), Money::from_major(22));

        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 7);
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-27));

        let debtor = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(debtor.transferred(), Money::from_major(22));
        assert_eq!(debtor.balance(), Money::from_major(22));
    }

    #[tokio::test]
    async fn test_accept_document_returns_stock_at_line_price() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        let debtor = seed_debtor(&db, &store.id).await;

        let input = DocumentInput {
            method: DocumentMethod::Accept,
            ..transfer_doc(&debtor.id, &product.id, 2, 0)
        };
        let doc = db.debts().create_document(input).await.unwrap();

        // goods came back as a shelf lot priced at the line price
        let (shelf, _, avg) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 2);
        assert_eq!(avg, Money::from_major(5));

        let debtor = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(debtor.accepted(), Money::from_major(10));
        assert_eq!(debtor.balance(), Money::from_major(-10));

        // the lot is traceable to the document
        let tagged: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_lots WHERE debt_document_id = ?1",
        )
        .bind(&doc.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tagged, 1);
    }

    #[tokio::test]
    async fn test_mirror_document_has_no_ledger_effects() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        let input = DocumentInput {
            is_mirror: true,
            ..transfer_doc(&debtor.id, &product.id, 3, 7)
        };
        db.debts().create_document(input).await.unwrap();

        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 10);
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-20));
        let debtor = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(debtor.balance(), Money::zero());
    }

    #[tokio::test]
    async fn test_document_delete_restore_round_trip() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 7))
            .await
            .unwrap();
        let after_create_stock = product_state(&db, &product.id).await;
        let after_create_balance = balance(&db, &store.id).await;

        db.debts().soft_delete_document(&doc.id).await.unwrap();
        let (shelf, _, avg) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 10);
        assert_eq!(avg, Money::from_major(2));
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-20));
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::zero());

        db.debts().restore_document(&doc.id).await.unwrap();
        assert_eq!(product_state(&db, &product.id).await, after_create_stock);
        assert_eq!(balance(&db, &store.id).await, after_create_balance);
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::from_major(22));
    }

    #[tokio::test]
    async fn test_line_edits_retotal_and_replay() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 0))
            .await
            .unwrap();

        let line = db
            .debts()
            .add_line(
                &doc.id,
                DebtLineInput {
                    product_id: product.id.clone(),
                    quantity: 2,
                    unit_price: Money::from_major(4),
                },
            )
            .await
            .unwrap();

        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 5);
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::from_major(15 + 8));

        db.debts().delete_line(&line.id).await.unwrap();
        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 7);
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::from_major(15));
    }

    #[tokio::test]
    async fn test_hard_delete_erases_document_and_lines() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 7))
            .await
            .unwrap();
        db.debts().hard_delete_document(&doc.id).await.unwrap();

        assert!(db.debts().get_document(&doc.id).await.is_err());
        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM debt_lines WHERE document_id = ?1")
            .bind(&doc.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(lines, 0);

        // effects unwound
        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 10);
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-20));
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::zero());
    }

    #[tokio::test]
    async fn test_debtor_cascade_delete_and_restore() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        // one document deleted on its own before the cascade
        let early = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 1, 0))
            .await
            .unwrap();
        db.debts().soft_delete_document(&early.id).await.unwrap();

        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 7))
            .await
            .unwrap();

        db.debts().soft_delete_debtor(&debtor.id).await.unwrap();
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert!(d.is_deleted);
        assert_eq!(d.balance(), Money::zero());
        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 10);

        // the phone number is free for a new debtor while this one is deleted
        let replacement = seed_debtor(&db, &store.id).await;
        assert_ne!(replacement.id, d.id);

        db.debts().soft_delete_debtor(&replacement.id).await.unwrap();
        db.debts().restore_debtor(&debtor.id).await.unwrap();
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert!(!d.is_deleted);
        assert_eq!(d.balance(), Money::from_major(22));

        // the cascade restore picked up only its own documents
        let (early_doc, _) = db.debts().get_document(&early.id).await.unwrap();
        assert!(early_doc.is_deleted);
        let (restored_doc, _) = db.debts().get_document(&doc.id).await.unwrap();
        assert!(!restored_doc.is_deleted);
    }

    #[tokio::test]
    async fn test_update_document_reposts_cash_idempotently() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let debtor = seed_debtor(&db, &store.id).await;

        let doc = db
            .debts()
            .create_document(transfer_doc(&debtor.id, &product.id, 3, 7))
            .await
            .unwrap();
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-27));

        db.debts()
            .update_document(&doc.id, Money::from_major(4), None)
            .await
            .unwrap();

        // the old 7.00 expense was replaced, not stacked
        assert_eq!(balance(&db, &store.id).await, Money::from_major(-24));
        let d = db.debts().get_debtor(&debtor.id).await.unwrap();
        assert_eq!(d.balance(), Money::from_major(19));
    }
}
