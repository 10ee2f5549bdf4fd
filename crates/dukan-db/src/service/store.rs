//! # Store Service
//!
//! Store onboarding. Creating a store also creates its single cash
//! account, so no other code path ever has to handle a store without one.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::store as store_repo;
use dukan_core::validation::validate_required;
use dukan_core::{CashAccount, LedgerError, Store};

/// Service for store onboarding.
#[derive(Debug, Clone)]
pub struct StoreService {
    pool: SqlitePool,
}

impl StoreService {
    pub fn new(pool: SqlitePool) -> Self {
        StoreService { pool }
    }

    /// Creates a store together with its cash account.
    pub async fn create(&self, name: &str) -> DbResult<Store> {
        validate_required("name", name).map_err(LedgerError::from)?;

        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        let account = CashAccount::new(store.id.clone());

        let mut tx = self.pool.begin().await?;
        store_repo::insert(&mut *tx, &store).await?;
        store_repo::insert_account(&mut *tx, &account).await?;
        tx.commit().await?;

        info!(store_id = %store.id, name = %store.name, "Store created");
        Ok(store)
    }

    /// Fetches a store by id.
    pub async fn get(&self, id: &str) -> DbResult<Store> {
        let mut conn = self.pool.acquire().await?;
        store_repo::fetch(&mut conn, id).await
    }
}
