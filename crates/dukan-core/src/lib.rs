//! # dukan-core: Pure Ledger Logic for Dukan
//!
//! This crate is the **heart** of the Dukan back-office ledger. It contains
//! all ledger logic as pure functions and in-memory aggregates with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Dukan Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Event Sources (callers)                         │   │
//! │  │    Orders ── Debt Documents ── Refunds ── Transfers/Imports    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                dukan-db (Service + Persistence)                 │   │
//! │  │     one transaction per mutation, repositories, migrations     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dukan-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   stock   │  │   cash    │  │   debt    │  │   money   │  │   │
//! │  │   │ FIFO lots │  │ CashBook  │  │  replay   │  │  micros   │  │   │
//! │  │   │  avg cost │  │ idempotent│  │ balances  │  │  half-up  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE STATE TRANSITIONS     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockLot, Debtor, Order, etc.)
//! - [`money`] - Money in integer micro-units (no floating point!)
//! - [`stock`] - FIFO lot consumption and weighted-average cost
//! - [`cash`] - Source-tagged cash movements with idempotent posting
//! - [`debt`] - Debtor balance replay
//! - [`lifecycle`] - Soft-delete flag handling shared by reversible entities
//! - [`validation`] - Field checks, EAN-13 and SKU helpers
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure State Transitions**: aggregates mutate in memory; persistence
//!    and transactions live entirely in dukan-db
//! 2. **No I/O**: database, network, and file system access is FORBIDDEN
//!    here; even `now` is always a parameter
//! 3. **Integer Money**: all monetary values are micro-units (i64), rounded
//!    half-up only at division boundaries
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use dukan_core::money::{Currency, Money};
//! use dukan_core::stock::StockAggregate;
//! use dukan_core::types::{Product, StockPool};
//!
//! let product = Product::new(
//!     "store-1", "Olma", "SKU-A1B2C3D4",
//!     Money::from_major(5), Currency::Usd, Money::from_major(1), Utc::now(),
//! );
//! let mut stock = StockAggregate::new(product, Vec::new());
//!
//! stock.produce(10, Money::from_major(2), StockPool::Warehouse, None, Utc::now()).unwrap();
//! let result = stock.consume(4, Utc::now()).unwrap();
//!
//! // the shelf was empty, so 4 units were pulled over automatically
//! assert_eq!(result.auto_transferred, 4);
//! assert_eq!(stock.product.warehouse_qty, 6);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash;
pub mod debt;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use dukan_core::Money` instead of
// `use dukan_core::money::Money`

pub use cash::CashBook;
pub use error::{LedgerError, LedgerResult, ValidationError};
pub use lifecycle::SoftDeletable;
pub use money::{Currency, Money};
pub use stock::{ConsumedLot, Consumption, StockAggregate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// How long after creation a refund may still be deleted.
///
/// ## Business Reason
/// A refund moves physical goods back onto the shelf (or into waste); past
/// a day the paper trail must stay, and mistakes become corrections, not
/// deletions.
pub const REFUND_DELETE_WINDOW_HOURS: i64 = 24;
