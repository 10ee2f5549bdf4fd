//! # Order Service
//!
//! Retail sales: stock leaves the shelf, payment and change hit the cash
//! account, and the whole thing soft-deletes and restores exactly.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create()                                                               │
//! │    per line:  consume stock, journal each (qty, cost, pool) taken      │
//! │    cash:      +paid, −change, source = Order(id)                       │
//! │                                                                         │
//! │  soft_delete()                                                          │
//! │    per line:  journaled deductions come back as lots, journal cleared  │
//! │    cash:      movements voided                                          │
//! │                                                                         │
//! │  restore()                                                              │
//! │    per line:  consume and journal again (may fail if resold meanwhile) │
//! │    cash:      re-posted (idempotent by source)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Restocking from the consumption journal (not at the sale price or the
//! current average) keeps the average-cost invariant intact: a
//! delete+restore cycle leaves lots and average cost exactly where they
//! started, even when the consumed lots carried mixed costs.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{cash as cash_repo, order as order_repo};
use crate::service::cash::{self, CashEffect};
use crate::service::stock::{consume_stock_for, reverse_consumption};
use dukan_core::money::normalize;
use dukan_core::validation::{validate_exchange_rate, validate_quantity};
use dukan_core::{
    CashSource, ConsumptionSource, Currency, LedgerError, Money, Order, OrderLine, PaymentType,
    SoftDeletable, ValidationError,
};

/// One line of an order being created. `unit_price` is in the order's
/// currency.
#[derive(Debug, Clone)]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct OrderInput {
    pub store_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub payment_type: PaymentType,
    pub currency: Currency,
    pub exchange_rate: Money,
    pub lines: Vec<OrderLineInput>,
    /// What the customer handed over, in the order's currency. Zero means
    /// nothing was paid and no cash posts.
    pub paid_amount: Money,
}

/// Service for retail orders.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: SqlitePool,
}

impl OrderService {
    pub fn new(pool: SqlitePool) -> Self {
        OrderService { pool }
    }

    /// Creates an order: consumes stock per line, totals in the reference
    /// currency, and posts payment/change to the cash account.
    pub async fn create(&self, input: OrderInput) -> DbResult<Order> {
        if input.lines.is_empty() {
            return Err(LedgerError::from(ValidationError::Required {
                field: "lines".to_string(),
            })
            .into());
        }
        if !input.currency.is_reference() {
            validate_exchange_rate(input.exchange_rate).map_err(LedgerError::from)?;
        }
        if input.paid_amount.is_negative() {
            return Err(LedgerError::invalid_amount("paid amount must not be negative").into());
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            validate_quantity(line.quantity).map_err(LedgerError::from)?;
            let unit_price = normalize(line.unit_price, input.currency, input.exchange_rate)?;

            let line = OrderLine {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                unit_price_micros: unit_price.micros(),
                currency: input.currency,
                exchange_rate_micros: input.exchange_rate.micros(),
            };
            let source = ConsumptionSource::OrderLine(line.id.clone());
            consume_stock_for(&mut *tx, &source, &line.product_id, line.quantity, now).await?;

            total += line.line_total();
            lines.push(line);
        }

        let paid = normalize(input.paid_amount, input.currency, input.exchange_rate)?;
        let change = if paid > total { paid - total } else { Money::zero() };

        let order = Order {
            id: order_id,
            store_id: input.store_id.clone(),
            phone_number: input.phone_number,
            first_name: input.first_name,
            last_name: input.last_name,
            payment_type: input.payment_type,
            currency: input.currency,
            exchange_rate_micros: input.exchange_rate.micros(),
            total_price_micros: total.micros(),
            paid_amount_micros: paid.micros(),
            change_given: change.is_positive(),
            change_amount_micros: change.micros(),
            is_deleted: false,
            deleted_at: None,
            created_at: now,
        };

        order_repo::insert(&mut *tx, &order).await?;
        for line in &lines {
            order_repo::insert_line(&mut *tx, line).await?;
        }

        self.post_order_cash(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %order.total_price(), "Order created");
        Ok(order)
    }

    /// Soft-deletes an order: each line's journaled deductions come back
    /// as lots at the consumed costs, and the payment movements vanish.
    /// Idempotent.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut order = order_repo::fetch(&mut *tx, id).await?;
        if !order.mark_deleted(now) {
            return Ok(());
        }

        for line in order_repo::fetch_lines(&mut *tx, &order.id).await? {
            let source = ConsumptionSource::OrderLine(line.id.clone());
            reverse_consumption(&mut *tx, &source, line.quantity, now).await?;
        }

        let account = cash_repo::fetch_account(&mut *tx, &order.store_id).await?;
        cash::void(&mut *tx, &account.id, &CashSource::Order(order.id.clone())).await?;

        order_repo::update(&mut *tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %id, "Order soft-deleted");
        Ok(())
    }

    /// Restores a soft-deleted order: stock is consumed again and the
    /// payment re-posted. Fails with `InsufficientStock` if the goods were
    /// sold in the meantime, leaving the order deleted.
    pub async fn restore(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut order = order_repo::fetch(&mut *tx, id).await?;
        if !order.mark_restored() {
            return Ok(());
        }

        for line in order_repo::fetch_lines(&mut *tx, &order.id).await? {
            let source = ConsumptionSource::OrderLine(line.id.clone());
            consume_stock_for(&mut *tx, &source, &line.product_id, line.quantity, now).await?;
        }

        self.post_order_cash(&mut tx, &order).await?;

        order_repo::update(&mut *tx, &order).await?;
        tx.commit().await?;

        info!(order_id = %id, "Order restored");
        Ok(())
    }

    /// Fetches an order with its lines.
    pub async fn get(&self, id: &str) -> DbResult<(Order, Vec<OrderLine>)> {
        let mut conn = self.pool.acquire().await?;
        let order = order_repo::fetch(&mut conn, id).await?;
        let lines = order_repo::fetch_lines(&mut conn, &order.id).await?;
        Ok((order, lines))
    }

    /// Posts the order's payment and change, keyed by the order id so
    /// re-posting replaces rather than duplicates.
    async fn post_order_cash(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order: &Order,
    ) -> DbResult<()> {
        let account = cash_repo::fetch_account(&mut *tx, &order.store_id).await?;
        cash::post(
            &mut *tx,
            &account.id,
            &CashSource::Order(order.id.clone()),
            CashEffect {
                income: order.paid_amount(),
                expense: order.change_amount(),
                exchange_rate: order.exchange_rate(),
            },
            "order payment",
            order.created_at,
        )
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
