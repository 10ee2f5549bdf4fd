//! # Refund Service
//!
//! Returns of goods against exactly one order line or one debt line.
//!
//! ## Outcomes
//! ```text
//! reason = DISLIKED | OTHER ──► restock: new shelf lot
//!                                 order line: at the product's average cost
//!                                 debt line:  at the line's price
//! reason = UNUSABLE         ──► waste entry, stock untouched
//! ```
//!
//! Order-line refunds are capped by what is left unrefunded on the line.
//! Debt-line refunds shrink the line itself (the debtor owes less), so the
//! cap is simply the line's remaining quantity; the document retotals and
//! the debtor balance replays.
//!
//! A refund can be deleted only within 24 hours of creation; after that it
//! is part of the permanent record.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{debt as debt_repo, order as order_repo, product as product_repo};
use crate::service::debt::recalculate_debtor;
use crate::service::stock::{consume_for_reversal, consume_stock_for, produce_stock, reversal_error};
use dukan_core::money::normalize;
use dukan_core::validation::validate_quantity;
use dukan_core::{
    ConsumptionSource, DocumentMethod, LedgerError, Refund, RefundOutcome, RefundReason,
    StockPool, WasteEntry, REFUND_DELETE_WINDOW_HOURS,
};

/// Input for creating a refund. Exactly one of `order_line_id` /
/// `debt_line_id` must be set.
#[derive(Debug, Clone)]
pub struct RefundInput {
    pub order_line_id: Option<String>,
    pub debt_line_id: Option<String>,
    pub reason: RefundReason,
    /// Required when `reason` is `Other`.
    pub custom_reason: Option<String>,
    pub quantity: i64,
}

/// Service for refunds.
#[derive(Debug, Clone)]
pub struct RefundService {
    pool: SqlitePool,
}

impl RefundService {
    pub fn new(pool: SqlitePool) -> Self {
        RefundService { pool }
    }

    /// Creates a refund and applies its stock (and, for debt lines,
    /// balance) effects.
    pub async fn create(&self, input: RefundInput) -> DbResult<Refund> {
        validate_quantity(input.quantity).map_err(LedgerError::from)?;
        if input.order_line_id.is_some() == input.debt_line_id.is_some() {
            return Err(LedgerError::invalid_amount(
                "a refund targets exactly one of order_line_id or debt_line_id",
            )
            .into());
        }
        if input.reason == RefundReason::Other
            && input.custom_reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(
                LedgerError::invalid_amount("reason OTHER requires a custom reason text").into(),
            );
        }

        let now = Utc::now();
        let refund = Refund {
            id: Uuid::new_v4().to_string(),
            order_line_id: input.order_line_id.clone(),
            debt_line_id: input.debt_line_id.clone(),
            reason: input.reason,
            custom_reason: input.custom_reason.clone(),
            quantity: input.quantity,
            created_at: now,
        };
        let waste_reason = input
            .custom_reason
            .unwrap_or_else(|| format!("{:?}", input.reason).to_uppercase());

        let mut tx = self.pool.begin().await?;

        if let Some(order_line_id) = &input.order_line_id {
            let line = order_repo::fetch_line(&mut *tx, order_line_id).await?;
            let already = order_repo::refunded_quantity_for_order_line(&mut *tx, order_line_id)
                .await?;
            let remaining = line.quantity - already;
            if input.quantity > remaining {
                return Err(LedgerError::invalid_amount(format!(
                    "refund quantity {} exceeds remaining {} on the order line",
                    input.quantity, remaining
                ))
                .into());
            }

            // the waste entry references the refund row, so it goes in first
            order_repo::insert_refund(&mut *tx, &refund).await?;

            match refund.outcome() {
                RefundOutcome::Restock => {
                    let product = product_repo::fetch(&mut *tx, &line.product_id).await?;
                    produce_stock(
                        &mut *tx,
                        &line.product_id,
                        input.quantity,
                        product.average_cost(),
                        StockPool::Shelf,
                        None,
                        now,
                    )
                    .await?;
                }
                RefundOutcome::Waste => {
                    self.record_waste(&mut tx, &line.product_id, &refund, &waste_reason)
                        .await?;
                }
            }
        } else if let Some(debt_line_id) = &input.debt_line_id {
            let mut line = debt_repo::fetch_line(&mut *tx, debt_line_id).await?;
            let doc = debt_repo::fetch_document(&mut *tx, &line.document_id).await?;
            if doc.is_deleted {
                return Err(LedgerError::invalid_amount(
                    "cannot refund against a deleted document",
                )
                .into());
            }
            if doc.method != DocumentMethod::Transfer {
                return Err(LedgerError::invalid_amount(
                    "refunds apply only to transfer documents",
                )
                .into());
            }
            if input.quantity > line.quantity {
                return Err(LedgerError::invalid_amount(format!(
                    "refund quantity {} exceeds remaining {} on the debt line",
                    input.quantity, line.quantity
                ))
                .into());
            }

            order_repo::insert_refund(&mut *tx, &refund).await?;

            if doc.affects_ledger() {
                match refund.outcome() {
                    RefundOutcome::Restock => {
                        let unit_cost =
                            normalize(line.unit_price(), line.currency, line.exchange_rate())?;
                        produce_stock(
                            &mut *tx,
                            &line.product_id,
                            input.quantity,
                            unit_cost,
                            StockPool::Shelf,
                            Some(doc.id.clone()),
                            now,
                        )
                        .await?;
                    }
                    RefundOutcome::Waste => {
                        self.record_waste(&mut tx, &line.product_id, &refund, &waste_reason)
                            .await?;
                    }
                }
            }

            // the debtor no longer owes for the returned goods
            line.quantity -= input.quantity;
            line.amount_micros = line.unit_price().multiply_quantity(line.quantity).micros();
            debt_repo::update_line(&mut *tx, &line).await?;

            let mut doc = doc;
            let lines = debt_repo::fetch_lines(&mut *tx, &doc.id).await?;
            doc.retotal(&lines);
            debt_repo::update_document(&mut *tx, &doc).await?;
            recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        }

        tx.commit().await?;

        info!(refund_id = %refund.id, reason = ?refund.reason, quantity = refund.quantity, "Refund created");
        Ok(refund)
    }

    /// Deletes a refund created within the last 24 hours, reversing its
    /// effects. Older refunds are part of the permanent record.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let refund = order_repo::fetch_refund(&mut *tx, id).await?;

        if now - refund.created_at > Duration::hours(REFUND_DELETE_WINDOW_HOURS) {
            return Err(LedgerError::invariant(format!(
                "refund {id} is older than {REFUND_DELETE_WINDOW_HOURS}h and can no longer be deleted"
            ))
            .into());
        }

        if let Some(order_line_id) = &refund.order_line_id {
            let line = order_repo::fetch_line(&mut *tx, order_line_id).await?;
            match refund.outcome() {
                RefundOutcome::Restock => {
                    consume_for_reversal(&mut *tx, &line.product_id, refund.quantity, now).await?;
                }
                RefundOutcome::Waste => {}
            }
        } else if let Some(debt_line_id) = &refund.debt_line_id {
            let mut line = debt_repo::fetch_line(&mut *tx, debt_line_id).await?;
            let mut doc = debt_repo::fetch_document(&mut *tx, &line.document_id).await?;

            if doc.affects_ledger() {
                if let RefundOutcome::Restock = refund.outcome() {
                    if doc.is_deleted {
                        consume_for_reversal(&mut *tx, &line.product_id, refund.quantity, now)
                            .await?;
                    } else {
                        // the line grows back, so the outstanding consumption
                        // is journaled again for the document's own reversal
                        let source = ConsumptionSource::DebtLine(line.id.clone());
                        consume_stock_for(&mut *tx, &source, &line.product_id, refund.quantity, now)
                            .await
                            .map_err(reversal_error)?;
                    }
                }
            }

            line.quantity += refund.quantity;
            line.amount_micros = line.unit_price().multiply_quantity(line.quantity).micros();
            debt_repo::update_line(&mut *tx, &line).await?;

            let lines = debt_repo::fetch_lines(&mut *tx, &doc.id).await?;
            doc.retotal(&lines);
            debt_repo::update_document(&mut *tx, &doc).await?;
            recalculate_debtor(&mut *tx, &doc.debtor_id).await?;
        }

        // waste entries reference the refund and must go first
        order_repo::delete_waste_for_refund(&mut *tx, &refund.id).await?;
        order_repo::delete_refund(&mut *tx, id).await?;
        tx.commit().await?;

        info!(refund_id = %id, "Refund deleted");
        Ok(())
    }

    /// Fetches a refund by id.
    pub async fn get(&self, id: &str) -> DbResult<Refund> {
        let mut conn = self.pool.acquire().await?;
        order_repo::fetch_refund(&mut conn, id).await
    }

    async fn record_waste(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        product_id: &str,
        refund: &Refund,
        reason: &str,
    ) -> DbResult<()> {
        let waste = WasteEntry {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity: refund.quantity,
            reason: reason.to_string(),
            refund_id: Some(refund.id.clone()),
            created_at: refund.created_at,
        };
        order_repo::insert_waste(&mut *tx, &waste).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::debt::{DebtLineInput, DebtorInput, DocumentInput};
    use crate::service::order::{OrderInput, OrderLineInput};
    use crate::service::testutil::{product_state, seed_product, seed_stock, seed_store, test_db};
    use dukan_core::{Currency, Money, PaymentType};

    /// Sells `quantity` units at 5.00 and returns the order line id.
    async fn sell(db: &crate::pool::Database, store_id: &str, product_id: &str, quantity: i64) -> String {
        let order = db
            .orders()
            .create(OrderInput {
                store_id: store_id.to_string(),
                phone_number: "+998901112233".into(),
                first_name: "Aziza".into(),
                last_name: "Karimova".into(),
                payment_type: PaymentType::Cash,
                currency: Currency::Usd,
                exchange_rate: Money::from_major(1),
                lines: vec![OrderLineInput {
                    product_id: product_id.to_string(),
                    quantity,
                    unit_price: Money::from_major(5),
                }],
                paid_amount: Money::zero(),
            })
            .await
            .unwrap();
        let (_, lines) = db.orders().get(&order.id).await.unwrap();
        lines[0].id.clone()
    }

    /// Puts `quantity` units at 5.00 on a fresh debtor's tab and returns
    /// the debt line id.
    async fn lend(db: &crate::pool::Database, store_id: &str, product_id: &str, quantity: i64) -> (String, String) {
        let debtor = db
            .debts()
            .get_or_create_debtor(DebtorInput {
                store_id: store_id.to_string(),
                phone_number: "+998905556677".into(),
                first_name: "Ali".into(),
                last_name: "Valiyev".into(),
                currency: Currency::Usd,
                exchange_rate: Money::from_major(1),
            })
            .await
            .unwrap();
        let doc = db
            .debts()
            .create_document(DocumentInput {
                debtor_id: debtor.id.clone(),
                method: DocumentMethod::Transfer,
                currency: Currency::Usd,
                exchange_rate: Money::from_major(1),
                cash_amount: Money::zero(),
                lines: vec![DebtLineInput {
                    product_id: product_id.to_string(),
                    quantity,
                    unit_price: Money::from_major(5),
                }],
                is_mirror: false,
                date: None,
            })
            .await
            .unwrap();
        let (_, lines) = db.debts().get_document(&doc.id).await.unwrap();
        (debtor.id, lines[0].id.clone())
    }

    fn refund_input(reason: RefundReason, quantity: i64) -> RefundInput {
        RefundInput {
            order_line_id: None,
            debt_line_id: None,
            reason,
            custom_reason: None,
            quantity,
        }
    }

    async fn waste_count(db: &crate::pool::Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM waste_entries")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_order_refund_restock_returns_goods_to_shelf() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let line_id = sell(&db, &store.id, &product.id, 4).await;

        db.refunds()
            .create(RefundInput {
                order_line_id: Some(line_id),
                ..refund_input(RefundReason::Disliked, 2)
            })
            .await
            .unwrap();

        // back on the shelf at the product's own average cost
        let (shelf, _, avg) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 8);
        assert_eq!(avg, Money::from_major(2));
        assert_eq!(waste_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_order_refund_waste_leaves_stock_alone() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let line_id = sell(&db, &store.id, &product.id, 4).await;

        db.refunds()
            .create(RefundInput {
                order_line_id: Some(line_id),
                ..refund_input(RefundReason::Unusable, 2)
            })
            .await
            .unwrap();

        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 6);
        assert_eq!(waste_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_order_refunds_are_capped_by_whats_left() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let line_id = sell(&db, &store.id, &product.id, 4).await;

        db.refunds()
            .create(RefundInput {
                order_line_id: Some(line_id.clone()),
                ..refund_input(RefundReason::Disliked, 3)
            })
            .await
            .unwrap();

        // only one unit is left unrefunded
        let err = db
            .refunds()
            .create(RefundInput {
                order_line_id: Some(line_id),
                ..refund_input(RefundReason::Disliked, 2)
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds remaining"));
    }

    #[tokio::test]
    async fn test_refund_needs_exactly_one_target() {
        let db = test_db().await;

        let err = db
            .refunds()
            .create(refund_input(RefundReason::Disliked, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exactly one"));

        let err = db
            .refunds()
            .create(RefundInput {
                order_line_id: Some("a".into()),
                debt_line_id: Some("b".into()),
                ..refund_input(RefundReason::Disliked, 1)
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[tokio::test]
    async fn test_other_reason_requires_text() {
        let db = test_db().await;
        let err = db
            .refunds()
            .create(RefundInput {
                order_line_id: Some("a".into()),
                ..refund_input(RefundReason::Other, 1)
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("custom reason"));
    }

    #[tokio::test]
    async fn test_debt_refund_shrinks_line_and_balance() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let (debtor_id, line_id) = lend(&db, &store.id, &product.id, 3).await;

        db.refunds()
            .create(RefundInput {
                debt_line_id: Some(line_id),
                ..refund_input(RefundReason::Disliked, 2)
            })
            .await
            .unwrap();

        // goods return at the line price of 5.00: 7 @ 2.00 + 2 @ 5.00
        let (shelf, _, avg) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 9);
        assert_eq!(avg, Money::from_micros(2_666_667));

        let debtor = db.debts().get_debtor(&debtor_id).await.unwrap();
        assert_eq!(debtor.balance(), Money::from_major(5));
    }

    #[tokio::test]
    async fn test_delete_order_refund_reverses_restock() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let line_id = sell(&db, &store.id, &product.id, 4).await;

        let refund = db
            .refunds()
            .create(RefundInput {
                order_line_id: Some(line_id),
                ..refund_input(RefundReason::Disliked, 2)
            })
            .await
            .unwrap();
        db.refunds().delete(&refund.id).await.unwrap();

        let (shelf, _, _) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 6);
        assert!(db.refunds().get(&refund.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_debt_refund_restores_the_line() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let (debtor_id, line_id) = lend(&db, &store.id, &product.id, 3).await;

        let refund = db
            .refunds()
            .create(RefundInput {
                debt_line_id: Some(line_id.clone()),
                ..refund_input(RefundReason::Unusable, 2)
            })
            .await
            .unwrap();
        db.refunds().delete(&refund.id).await.unwrap();

        let line = {
            let mut conn = db.pool().acquire().await.unwrap();
            debt_repo::fetch_line(&mut conn, &line_id).await.unwrap()
        };
        assert_eq!(line.quantity, 3);
        let debtor = db.debts().get_debtor(&debtor_id).await.unwrap();
        assert_eq!(debtor.balance(), Money::from_major(15));
        assert_eq!(waste_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_document_reversal_tracks_refund_round_trips() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let (debtor_id, line_id) = lend(&db, &store.id, &product.id, 5).await;
        let doc_id = {
            let mut conn = db.pool().acquire().await.unwrap();
            debt_repo::fetch_line(&mut conn, &line_id)
                .await
                .unwrap()
                .document_id
        };

        let refund = db
            .refunds()
            .create(RefundInput {
                debt_line_id: Some(line_id.clone()),
                ..refund_input(RefundReason::Disliked, 2)
            })
            .await
            .unwrap();

        db.debts().soft_delete_document(&doc_id).await.unwrap();
        db.debts().restore_document(&doc_id).await.unwrap();
        db.refunds().delete(&refund.id).await.unwrap();

        // all five units come back even though the line shrank and
        // regrew while the document cycled through delete and restore
        db.debts().soft_delete_document(&doc_id).await.unwrap();
        let (shelf, warehouse, avg) = product_state(&db, &product.id).await;
        assert_eq!(shelf, 10);
        assert_eq!(warehouse, 0);
        assert_eq!(avg, Money::from_micros(2_600_000));
        let debtor = db.debts().get_debtor(&debtor_id).await.unwrap();
        assert_eq!(debtor.balance(), Money::zero());
    }

    #[tokio::test]
    async fn test_old_refunds_cannot_be_deleted() {
        let db = test_db().await;
        let store = seed_store(&db).await;
        let product = seed_product(&db, &store.id, "Olma").await;
        seed_stock(&db, &product.id, 10, 2, StockPool::Shelf).await;
        let line_id = sell(&db, &store.id, &product.id, 4).await;

        let refund = db
            .refunds()
            .create(RefundInput {
                order_line_id: Some(line_id),
                ..refund_input(RefundReason::Unusable, 1)
            })
            .await
            .unwrap();

        // age the refund past the window
        let old = Utc::now() - Duration::hours(REFUND_DELETE_WINDOW_HOURS + 1);
        sqlx::query("UPDATE refunds SET created_at = ?1 WHERE id = ?2")
            .bind(old)
            .bind(&refund.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.refunds().delete(&refund.id).await.unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(db.refunds().get(&refund.id).await.is_ok());
    }
}
