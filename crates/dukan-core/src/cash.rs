//! # Cash Book
//!
//! Movement-level bookkeeping for a store's single cash account.
//!
//! ## Posting Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              One source record → its cash movements                     │
//! │                                                                         │
//! │  Order #42 saved:    void(Order 42)                                    │
//! │                      record_income(Order 42, paid)                     │
//! │                      record_expense(Order 42, change)                  │
//! │                                                                         │
//! │  Order #42 re-saved: void(Order 42)   ← old movements removed          │
//! │                      record_income / record_expense again              │
//! │                                                                         │
//! │  Order #42 deleted:  void(Order 42)   ← account as if never posted     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-posting for the same source is therefore idempotent: the movements on
//! the account always reflect the current state of the causing record, never
//! its history.
//!
//! ## Invariants
//! - Every recorded movement has `amount > 0`; a zero amount posts nothing
//!   and a negative amount is rejected before any state mutates.
//! - The cached account balance is refreshed after every mutation, so
//!   `account.balance == Σ signed movements` holds between calls.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::money::Money;
use crate::types::{CashAccount, CashMovement, CashSource};

/// A cash account together with its movements: the unit every cash
/// mutation loads and saves as one.
#[derive(Debug, Clone)]
pub struct CashBook {
    pub account: CashAccount,
    pub movements: Vec<CashMovement>,
}

impl CashBook {
    pub fn new(account: CashAccount, movements: Vec<CashMovement>) -> Self {
        CashBook { account, movements }
    }

    /// Records an inflow tagged with `source`.
    ///
    /// Zero amounts are a silent no-op (returns `false`); negative amounts
    /// are rejected.
    pub fn record_income(
        &mut self,
        source: &CashSource,
        amount: Money,
        exchange_rate: Money,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        self.record(source, amount, false, exchange_rate, note.into(), now)
    }

    /// Records an outflow tagged with `source`. Same zero/negative rules as
    /// [`record_income`](Self::record_income).
    pub fn record_expense(
        &mut self,
        source: &CashSource,
        amount: Money,
        exchange_rate: Money,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        self.record(source, amount, true, exchange_rate, note.into(), now)
    }

    /// Removes every movement tagged with `source`, returning how many were
    /// removed. Safe to call for a source that never posted.
    pub fn void(&mut self, source: &CashSource) -> usize {
        let before = self.movements.len();
        self.movements.retain(|m| !m.matches_source(source));
        let removed = before - self.movements.len();
        if removed > 0 {
            self.refresh();
        }
        removed
    }

    /// The true balance, derived from the live movements.
    pub fn recompute_balance(&self) -> Money {
        self.movements.iter().map(CashMovement::signed_amount).sum()
    }

    /// Difference between the cached balance and the derived one. Non-zero
    /// drift means the account was mutated outside the book.
    pub fn drift(&self) -> Money {
        self.account.balance() - self.recompute_balance()
    }

    /// Overwrites the cached balance with the derived one.
    pub fn refresh(&mut self) {
        self.account.balance_micros = self.recompute_balance().micros();
    }

    fn record(
        &mut self,
        source: &CashSource,
        amount: Money,
        is_outflow: bool,
        exchange_rate: Money,
        note: String,
        now: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        if amount.is_negative() {
            return Err(LedgerError::invalid_amount(format!(
                "cash movement amount must not be negative, got {amount}"
            )));
        }
        if amount.is_zero() {
            return Ok(false);
        }

        self.movements.push(CashMovement {
            id: Uuid::new_v4().to_string(),
            account_id: self.account.id.clone(),
            amount_micros: amount.micros(),
            is_outflow,
            exchange_rate_micros: exchange_rate.micros(),
            note,
            source_type: source.kind(),
            source_id: source.source_id().to_string(),
            created_at: now,
        });
        self.refresh();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> CashBook {
        CashBook::new(CashAccount::new("store-1"), Vec::new())
    }

    fn rate() -> Money {
        Money::from_major(1)
    }

    #[test]
    fn test_income_and_expense_move_balance() {
        let mut book = book();
        let order = CashSource::Order("o1".into());
        let now = Utc::now();

        book.record_income(&order, Money::from_major(10), rate(), "paid", now)
            .unwrap();
        book.record_expense(&order, Money::from_major(3), rate(), "change", now)
            .unwrap();

        assert_eq!(book.account.balance(), Money::from_major(7));
        assert_eq!(book.drift(), Money::zero());
    }

    #[test]
    fn test_zero_amount_posts_nothing() {
        let mut book = book();
        let posted = book
            .record_income(&CashSource::Order("o1".into()), Money::zero(), rate(), "", Utc::now())
            .unwrap();
        assert!(!posted);
        assert!(book.movements.is_empty());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut book = book();
        let err = book
            .record_income(
                &CashSource::Manual("fix".into()),
                Money::from_major(-1),
                rate(),
                "",
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));
        assert!(book.movements.is_empty());
    }

    #[test]
    fn test_void_then_repost_is_idempotent() {
        let mut book = book();
        let doc = CashSource::DebtDocument("d1".into());
        let other = CashSource::Order("o1".into());
        let now = Utc::now();

        book.record_income(&other, Money::from_major(100), rate(), "", now)
            .unwrap();
        book.record_expense(&doc, Money::from_major(40), rate(), "", now)
            .unwrap();
        assert_eq!(book.account.balance(), Money::from_major(60));

        // re-posting the document replaces its previous movements
        assert_eq!(book.void(&doc), 1);
        book.record_expense(&doc, Money::from_major(25), rate(), "", now)
            .unwrap();
        assert_eq!(book.account.balance(), Money::from_major(75));

        // voiding again leaves the account as if the document never posted
        book.void(&doc);
        assert_eq!(book.account.balance(), Money::from_major(100));
        assert_eq!(book.void(&doc), 0);
    }

    #[test]
    fn test_drift_detects_tampered_balance() {
        let mut book = book();
        book.record_income(&CashSource::Manual("opening".into()), Money::from_major(50), rate(), "", Utc::now())
            .unwrap();

        book.account.balance_micros += Money::from_major(5).micros();
        assert_eq!(book.drift(), Money::from_major(5));

        book.refresh();
        assert_eq!(book.drift(), Money::zero());
    }
}
