//! # Event-Source Services
//!
//! One service per event source, plus store onboarding and cash auditing.
//! Services are where ledger rules from `dukan-core` meet persistence.
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Every mutation = exactly one transaction                     │
//! │                                                                         │
//! │  pool.begin()                                                           │
//! │     │                                                                   │
//! │     ├── load aggregates (product+lots, account, debtor+docs)           │
//! │     ├── run dukan-core logic in memory                                 │
//! │     │      └── LedgerError? → return Err → tx dropped → ROLLBACK       │
//! │     ├── persist every touched aggregate                                │
//! │     └── tx.commit()                                                    │
//! │                                                                         │
//! │  A failed consume, a bad amount, or a reversal conflict therefore      │
//! │  leaves stock, cash, and balances exactly as they were.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite's single writer serializes these transactions, which is all the
//! per-entity ordering the ledger needs.

pub mod cash;
pub mod debt;
pub mod order;
pub mod product;
pub mod refund;
pub mod stock;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
