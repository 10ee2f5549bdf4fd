//! # dukan-db: Persistence Layer for the Dukan Ledger
//!
//! This crate provides database access and the event-source services for
//! the Dukan back-office ledger. It uses SQLite for local storage with
//! sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dukan Data Flow                                  │
//! │                                                                         │
//! │  Caller (orders().create(…), debts().soft_delete_document(…), …)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     dukan-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │ Repositories  │    │  Migrations  │  │   │
//! │  │   │ (service/*)   │    │(repository/*) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ one tx per    │───►│ row-level SQL │    │ 001_init.sql │  │   │
//! │  │   │ mutation      │    │ over one conn │    │ ...          │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                    │   │
//! │  │           ▼ pure ledger rules                                  │   │
//! │  │   dukan-core (StockAggregate, CashBook, debt::recalculate)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL mode)                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row-level SQL per aggregate
//! - [`service`] - Event-source services (orders, debt, refunds, stock, cash)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dukan_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/dukan.db")).await?;
//!
//! let store = db.stores().create("Chorsu Dukan").await?;
//! let order = db.orders().create(order_input).await?;
//! db.orders().soft_delete(&order.id).await?;
//! db.orders().restore(&order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Service re-exports for convenience
pub use service::cash::{BalanceReport, CashService};
pub use service::debt::{DebtLineInput, DebtService, DebtorInput, DocumentInput};
pub use service::order::{OrderInput, OrderLineInput, OrderService};
pub use service::product::{ProductInput, ProductService};
pub use service::refund::{RefundInput, RefundService};
pub use service::stock::{ImportInput, StockService};
pub use service::store::StoreService;
