//! # Repositories
//!
//! Row-level SQL for each aggregate, as free functions over a
//! `&mut SqliteConnection`.
//!
//! ## Why connections, not pools
//! ```text
//! service method                        repository functions
//! ──────────────                        ────────────────────
//! let mut tx = pool.begin().await?;
//! product::fetch(&mut tx, id)     ──►   one SELECT
//! ...core logic mutates in memory...
//! product::save_stock(&mut tx, …) ──►   UPDATE + DELETE + INSERTs
//! cash::void_source(&mut tx, …)   ──►   DELETE
//! tx.commit().await?;
//! ```
//!
//! Taking a connection lets every event-source mutation compose its reads
//! and writes inside ONE transaction. Repositories never begin, commit, or
//! roll back; that is the service's job.

pub mod cash;
pub mod debt;
pub mod order;
pub mod product;
pub mod stock_log;
pub mod store;
