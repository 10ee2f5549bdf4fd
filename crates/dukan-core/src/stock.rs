//! # Stock Ledger
//!
//! FIFO lot consumption, production, reversal, and weighted-average-cost
//! recomputation over a single product's lots.
//!
//! ## Lot Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Consuming 5 units from the shelf                     │
//! │                                                                         │
//! │  shelf:     [lot A qty=2 @2.00]                                        │
//! │  warehouse: [lot B qty=10 @2.00]                                       │
//! │       │                                                                 │
//! │       ▼  shelf short by 3 → implicit transfer                          │
//! │  shelf:     [lot A qty=2 @2.00] [lot B' qty=3 @2.00]                   │
//! │  warehouse: [lot B qty=7 @2.00]                                        │
//! │       │                                                                 │
//! │       ▼  FIFO walk: A fully consumed (deleted), B' fully consumed      │
//! │  shelf:     (empty)                                                    │
//! │  warehouse: [lot B qty=7 @2.00]                                        │
//! │                                                                         │
//! │  Returned Consumption records (qty, cost, pool) per lot touched, so    │
//! │  the exact inverse can be applied later, and auto_transferred = 3 so   │
//! │  the caller persists the auto transfer record.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - A lot's quantity is > 0 while it lives; a lot hitting zero is removed,
//!   never kept or resurrected.
//! - Consumption is all-or-nothing: any shortfall (after the implicit
//!   warehouse top-up) leaves the aggregate untouched.
//! - `recompute_average_cost` runs after every lot mutation, before the
//!   product is considered consistent:
//!   `average_cost × total_qty ≈ Σ(lot.qty × lot.unit_cost)`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::money::{div_half_up, Money};
use crate::types::{Product, StockLot, StockPool};

// =============================================================================
// Consumption Records
// =============================================================================

/// What one `consume` call actually took from one lot.
///
/// Lot identity is not semantically significant; the (pool, quantity,
/// unit cost) triple is all a reversal needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedLot {
    pub pool: StockPool,
    pub quantity: i64,
    pub unit_cost_micros: i64,
}

impl ConsumedLot {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_micros(self.unit_cost_micros)
    }
}

/// Result of a successful `consume` call.
#[derive(Debug, Clone, Default)]
pub struct Consumption {
    /// Per-lot deductions, in the order they were taken.
    pub consumed: Vec<ConsumedLot>,
    /// Units moved warehouse→shelf by the implicit top-up (0 = none).
    /// The caller persists a `StockTransferRecord { auto: true }` when > 0.
    pub auto_transferred: i64,
}

// =============================================================================
// Stock Aggregate
// =============================================================================

/// A product together with its live lots: the unit every stock mutation
/// locks, loads, and saves as one.
///
/// The cached `shelf_qty`/`warehouse_qty`/`average_cost` on the product are
/// refreshed here and nowhere else.
#[derive(Debug, Clone)]
pub struct StockAggregate {
    pub product: Product,
    pub lots: Vec<StockLot>,
}

impl StockAggregate {
    /// Builds the aggregate, normalizing lot order to FIFO
    /// (`created_at` ascending, ties by insertion `seq`).
    pub fn new(product: Product, mut lots: Vec<StockLot>) -> Self {
        lots.sort_by_key(|lot| (lot.created_at, lot.seq));
        StockAggregate { product, lots }
    }

    /// Live quantity in one pool.
    pub fn pool_qty(&self, pool: StockPool) -> i64 {
        self.lots
            .iter()
            .filter(|lot| lot.pool == pool)
            .map(|lot| lot.quantity)
            .sum()
    }

    /// Live quantity across both pools.
    pub fn total_qty(&self) -> i64 {
        self.lots.iter().map(|lot| lot.quantity).sum()
    }

    // -------------------------------------------------------------------------
    // Consume
    // -------------------------------------------------------------------------

    /// Consumes `quantity` units from the shelf, topping the shelf up from
    /// the warehouse first if it is short.
    ///
    /// All-or-nothing: if shelf + warehouse cannot cover the request, the
    /// aggregate is left untouched and `InsufficientStock` is returned.
    pub fn consume(&mut self, quantity: i64, now: DateTime<Utc>) -> LedgerResult<Consumption> {
        self.ensure_positive_qty(quantity)?;

        let shelf = self.pool_qty(StockPool::Shelf);
        let available = shelf + self.pool_qty(StockPool::Warehouse);
        if available < quantity {
            return Err(LedgerError::InsufficientStock {
                product: self.product.name.clone(),
                requested: quantity,
                available,
            });
        }

        // Availability is proven, so the top-up and the walk below cannot
        // fail; no partial application is possible past this point.
        let shortfall = (quantity - shelf).max(0);
        if shortfall > 0 {
            self.move_between_pools(StockPool::Warehouse, StockPool::Shelf, shortfall, now)?;
        }

        let consumed = self.take_from_pool(StockPool::Shelf, quantity)?;
        self.recompute_average_cost();

        Ok(Consumption {
            consumed,
            auto_transferred: shortfall,
        })
    }

    /// Exact inverse of a `consume`: recreates each taken (qty, cost, pool)
    /// triple as fresh lots (merging where costs match).
    pub fn reverse(&mut self, consumed: &[ConsumedLot], now: DateTime<Utc>) {
        for taken in consumed {
            self.add_lot(taken.quantity, taken.unit_cost(), taken.pool, None, now);
        }
        self.recompute_average_cost();
    }

    // -------------------------------------------------------------------------
    // Produce
    // -------------------------------------------------------------------------

    /// Adds `quantity` units at `unit_cost` to a pool, returning the id of
    /// the lot that now carries them.
    ///
    /// Merges into an existing lot with exactly equal unit cost and pool
    /// when one exists, to avoid lot fragmentation.
    pub fn produce(
        &mut self,
        quantity: i64,
        unit_cost: Money,
        pool: StockPool,
        debt_document_id: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<String> {
        self.ensure_positive_qty(quantity)?;
        let lot_id = self.add_lot(quantity, unit_cost, pool, debt_document_id, now);
        self.recompute_average_cost();
        Ok(lot_id)
    }

    /// Removes `quantity` units with exactly this unit cost from a pool,
    /// oldest lots first. Used to unwind an import whose lots may since
    /// have been merged with equal-cost stock.
    pub fn consume_matching_cost(
        &mut self,
        quantity: i64,
        unit_cost: Money,
        pool: StockPool,
    ) -> LedgerResult<()> {
        self.ensure_positive_qty(quantity)?;

        let available: i64 = self
            .lots
            .iter()
            .filter(|lot| lot.pool == pool && lot.unit_cost_micros == unit_cost.micros())
            .map(|lot| lot.quantity)
            .sum();
        if available < quantity {
            return Err(LedgerError::InsufficientStock {
                product: self.product.name.clone(),
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        self.sort_lots();
        for lot in &mut self.lots {
            if remaining == 0 {
                break;
            }
            if lot.pool != pool || lot.unit_cost_micros != unit_cost.micros() {
                continue;
            }
            let take = lot.quantity.min(remaining);
            lot.quantity -= take;
            remaining -= take;
        }
        self.lots.retain(|lot| lot.quantity > 0);
        self.recompute_average_cost();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pool Transfers
    // -------------------------------------------------------------------------

    /// Moves `quantity` units warehouse→shelf, preserving each unit's cost.
    pub fn transfer_to_shelf(&mut self, quantity: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_positive_qty(quantity)?;
        self.move_between_pools(StockPool::Warehouse, StockPool::Shelf, quantity, now)?;
        self.recompute_average_cost();
        Ok(())
    }

    /// Moves `quantity` units shelf→warehouse (the inverse of a transfer).
    pub fn transfer_to_warehouse(&mut self, quantity: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        self.ensure_positive_qty(quantity)?;
        self.move_between_pools(StockPool::Shelf, StockPool::Warehouse, quantity, now)?;
        self.recompute_average_cost();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Average Cost
    // -------------------------------------------------------------------------

    /// Recomputes the weighted-average unit cost over all live lots (both
    /// pools) and refreshes the product's cached totals.
    ///
    /// `average_cost = Σ(qty × unit_cost) / Σ(qty)`, half-up at 6 digits;
    /// 0 when no lots remain.
    pub fn recompute_average_cost(&mut self) {
        let total_qty: i64 = self.lots.iter().map(|lot| lot.quantity).sum();
        let total_cost: i128 = self
            .lots
            .iter()
            .map(|lot| lot.quantity as i128 * lot.unit_cost_micros as i128)
            .sum();

        self.product.average_cost_micros = if total_qty > 0 {
            div_half_up(total_cost, total_qty as i128)
        } else {
            0
        };
        self.product.shelf_qty = self.pool_qty(StockPool::Shelf);
        self.product.warehouse_qty = self.pool_qty(StockPool::Warehouse);
        self.product.in_stock = total_qty > 0;
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_positive_qty(&self, quantity: i64) -> LedgerResult<()> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn sort_lots(&mut self) {
        self.lots.sort_by_key(|lot| (lot.created_at, lot.seq));
    }

    fn next_seq(&mut self) -> i64 {
        self.product.lot_seq += 1;
        self.product.lot_seq
    }

    /// Inserts units into a pool, merging with an equal-cost lot when
    /// possible. Returns the id of the carrying lot.
    fn add_lot(
        &mut self,
        quantity: i64,
        unit_cost: Money,
        pool: StockPool,
        debt_document_id: Option<String>,
        now: DateTime<Utc>,
    ) -> String {
        if let Some(lot) = self
            .lots
            .iter_mut()
            .find(|lot| lot.pool == pool && lot.unit_cost_micros == unit_cost.micros())
        {
            lot.quantity += quantity;
            return lot.id.clone();
        }

        let seq = self.next_seq();
        let lot = StockLot {
            id: Uuid::new_v4().to_string(),
            product_id: self.product.id.clone(),
            pool,
            quantity,
            unit_cost_micros: unit_cost.micros(),
            debt_document_id,
            created_at: now,
            seq,
        };
        let id = lot.id.clone();
        self.lots.push(lot);
        id
    }

    /// FIFO-deducts `quantity` from a pool. Caller must have verified
    /// availability; shorting here is a logic error surfaced as
    /// `InvariantViolation`.
    fn take_from_pool(&mut self, pool: StockPool, quantity: i64) -> LedgerResult<Vec<ConsumedLot>> {
        let mut remaining = quantity;
        let mut consumed = Vec::new();

        self.sort_lots();
        for lot in &mut self.lots {
            if remaining == 0 {
                break;
            }
            if lot.pool != pool {
                continue;
            }
            let take = lot.quantity.min(remaining);
            lot.quantity -= take;
            remaining -= take;
            consumed.push(ConsumedLot {
                pool,
                quantity: take,
                unit_cost_micros: lot.unit_cost_micros,
            });
        }
        self.lots.retain(|lot| lot.quantity > 0);

        if remaining > 0 {
            return Err(LedgerError::invariant(format!(
                "pool walk shorted {} units of {} after availability check",
                remaining, self.product.name
            )));
        }
        Ok(consumed)
    }

    /// Moves units between pools, cost-preserving, oldest lots first.
    fn move_between_pools(
        &mut self,
        from: StockPool,
        to: StockPool,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let available = self.pool_qty(from);
        if available < quantity {
            return Err(LedgerError::InsufficientStock {
                product: self.product.name.clone(),
                requested: quantity,
                available,
            });
        }

        let moved = self.take_from_pool(from, quantity)?;
        for part in moved {
            self.add_lot(part.quantity, part.unit_cost(), to, None, now);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn product() -> Product {
        Product::new(
            "store-1",
            "Olma",
            "SKU-TESTOLMA",
            Money::from_major(5),
            Currency::Usd,
            Money::from_major(1),
            Utc::now(),
        )
    }

    fn aggregate_with(lots: &[(StockPool, i64, i64)]) -> StockAggregate {
        let mut agg = StockAggregate::new(product(), Vec::new());
        let now = Utc::now();
        for (pool, qty, cost_major) in lots {
            agg.add_lot(*qty, Money::from_major(*cost_major), *pool, None, now);
        }
        agg.recompute_average_cost();
        agg
    }

    #[test]
    fn test_consume_fifo_order() {
        let mut agg = StockAggregate::new(product(), Vec::new());
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        agg.add_lot(3, Money::from_major(2), StockPool::Shelf, None, t0);
        agg.add_lot(3, Money::from_major(4), StockPool::Shelf, None, t1);
        agg.recompute_average_cost();

        let result = agg.consume(4, Utc::now()).unwrap();
        // oldest lot (cost 2) drains first
        assert_eq!(result.consumed.len(), 2);
        assert_eq!(result.consumed[0].quantity, 3);
        assert_eq!(result.consumed[0].unit_cost(), Money::from_major(2));
        assert_eq!(result.consumed[1].quantity, 1);
        assert_eq!(result.consumed[1].unit_cost(), Money::from_major(4));
        assert_eq!(agg.product.shelf_qty, 2);
    }

    #[test]
    fn test_consume_with_implicit_transfer() {
        // shelf=2, warehouse=10 @2.00, consume 5
        let mut agg = aggregate_with(&[(StockPool::Shelf, 2, 2), (StockPool::Warehouse, 10, 2)]);

        let result = agg.consume(5, Utc::now()).unwrap();
        assert_eq!(result.auto_transferred, 3);
        assert_eq!(agg.product.shelf_qty, 0);
        assert_eq!(agg.product.warehouse_qty, 7);
        assert_eq!(result.consumed.iter().map(|c| c.quantity).sum::<i64>(), 5);
    }

    #[test]
    fn test_consume_boundary() {
        let mut agg = aggregate_with(&[(StockPool::Shelf, 2, 2), (StockPool::Warehouse, 3, 2)]);

        // one more than available fails and leaves everything untouched
        let err = agg.consume(6, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }
        ));
        assert_eq!(agg.product.shelf_qty, 2);
        assert_eq!(agg.product.warehouse_qty, 3);

        // exactly the available quantity succeeds and drains to zero
        agg.consume(5, Utc::now()).unwrap();
        assert_eq!(agg.total_qty(), 0);
        assert!(!agg.product.in_stock);
        assert_eq!(agg.product.average_cost(), Money::zero());
    }

    #[test]
    fn test_produce_merges_equal_cost_lots() {
        let mut agg = aggregate_with(&[(StockPool::Shelf, 10, 2)]);
        agg.produce(4, Money::from_major(2), StockPool::Shelf, None, Utc::now())
            .unwrap();
        assert_eq!(agg.lots.len(), 1);
        assert_eq!(agg.lots[0].quantity, 14);

        // different cost creates a second lot
        agg.produce(4, Money::from_major(3), StockPool::Shelf, None, Utc::now())
            .unwrap();
        assert_eq!(agg.lots.len(), 2);
    }

    #[test]
    fn test_reverse_restores_exact_state() {
        let mut agg = aggregate_with(&[(StockPool::Shelf, 10, 2)]);
        let before_avg = agg.product.average_cost();

        let result = agg.consume(4, Utc::now()).unwrap();
        assert_eq!(agg.product.shelf_qty, 6);

        agg.reverse(&result.consumed, Utc::now());
        assert_eq!(agg.product.shelf_qty, 10);
        assert_eq!(agg.product.average_cost(), before_avg);
        // merged back into the surviving equal-cost lot
        assert_eq!(agg.lots.len(), 1);
        assert_eq!(agg.lots[0].quantity, 10);
    }

    #[test]
    fn test_average_cost_invariant() {
        let mut agg = aggregate_with(&[
            (StockPool::Shelf, 10, 2),
            (StockPool::Warehouse, 5, 4),
            (StockPool::Shelf, 5, 3),
        ]);
        agg.consume(7, Utc::now()).unwrap();
        agg.produce(3, Money::from_major(6), StockPool::Warehouse, None, Utc::now())
            .unwrap();

        let lots_cost: i128 = agg
            .lots
            .iter()
            .map(|l| l.quantity as i128 * l.unit_cost_micros as i128)
            .sum();
        let implied = agg.product.average_cost_micros as i128 * agg.total_qty() as i128;
        // within rounding of one half-up division
        assert!((implied - lots_cost).abs() <= agg.total_qty() as i128);
    }

    #[test]
    fn test_transfer_preserves_costs() {
        let mut agg = aggregate_with(&[(StockPool::Warehouse, 6, 2), (StockPool::Warehouse, 6, 3)]);
        agg.transfer_to_shelf(8, Utc::now()).unwrap();

        assert_eq!(agg.product.shelf_qty, 8);
        assert_eq!(agg.product.warehouse_qty, 4);
        // cost structure preserved: 6 @2 + 2 @3 on the shelf
        let shelf_cost: i64 = agg
            .lots
            .iter()
            .filter(|l| l.pool == StockPool::Shelf)
            .map(|l| l.quantity * l.unit_cost_micros / 1_000_000)
            .sum();
        assert_eq!(shelf_cost, 6 * 2 + 2 * 3);

        agg.transfer_to_warehouse(8, Utc::now()).unwrap();
        assert_eq!(agg.product.shelf_qty, 0);
        assert_eq!(agg.product.warehouse_qty, 12);
    }

    #[test]
    fn test_transfer_insufficient_warehouse() {
        let mut agg = aggregate_with(&[(StockPool::Warehouse, 2, 2)]);
        assert!(matches!(
            agg.transfer_to_shelf(5, Utc::now()),
            Err(LedgerError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_consume_matching_cost() {
        let mut agg = aggregate_with(&[(StockPool::Shelf, 5, 2), (StockPool::Shelf, 5, 3)]);
        agg.consume_matching_cost(4, Money::from_major(3), StockPool::Shelf)
            .unwrap();
        assert_eq!(agg.pool_qty(StockPool::Shelf), 6);

        // only 1 unit left at cost 3
        let err = agg
            .consume_matching_cost(2, Money::from_major(3), StockPool::Shelf)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 1, .. }));
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let mut agg = aggregate_with(&[(StockPool::Shelf, 5, 2)]);
        assert!(agg.consume(0, Utc::now()).is_err());
        assert!(agg
            .produce(-1, Money::from_major(1), StockPool::Shelf, None, Utc::now())
            .is_err());
    }
}
