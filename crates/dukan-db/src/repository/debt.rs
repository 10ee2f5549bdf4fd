//! # Debt Repository
//!
//! Row access for debtors, debt documents, and document lines.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dukan_core::{DebtDocument, DebtLine, Debtor};

const DEBTOR_COLUMNS: &str = "id, store_id, phone_number, first_name, last_name, \
     transferred_micros, accepted_micros, balance_micros, \
     currency, exchange_rate_micros, is_deleted, deleted_at, created_at";

const DOCUMENT_COLUMNS: &str = "id, debtor_id, store_id, method, currency, \
     exchange_rate_micros, cash_amount_micros, product_amount_micros, \
     total_amount_micros, is_mirror, is_deleted, deleted_at, date";

const LINE_COLUMNS: &str = "id, document_id, product_id, quantity, \
     unit_price_micros, amount_micros, currency, exchange_rate_micros";

// =============================================================================
// Debtors
// =============================================================================

/// Inserts a debtor.
pub async fn insert_debtor(conn: &mut SqliteConnection, debtor: &Debtor) -> DbResult<()> {
    debug!(id = %debtor.id, phone = %debtor.phone_number, "Inserting debtor");

    sqlx::query(
        "INSERT INTO debtors (id, store_id, phone_number, first_name, last_name, \
             transferred_micros, accepted_micros, balance_micros, \
             currency, exchange_rate_micros, is_deleted, deleted_at, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .bind(&debtor.id)
    .bind(&debtor.store_id)
    .bind(&debtor.phone_number)
    .bind(&debtor.first_name)
    .bind(&debtor.last_name)
    .bind(debtor.transferred_micros)
    .bind(debtor.accepted_micros)
    .bind(debtor.balance_micros)
    .bind(debtor.currency)
    .bind(debtor.exchange_rate_micros)
    .bind(debtor.is_deleted)
    .bind(debtor.deleted_at)
    .bind(debtor.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates a debtor's mutable columns.
pub async fn update_debtor(conn: &mut SqliteConnection, debtor: &Debtor) -> DbResult<()> {
    sqlx::query(
        "UPDATE debtors SET phone_number = ?2, first_name = ?3, last_name = ?4, \
             transferred_micros = ?5, accepted_micros = ?6, balance_micros = ?7, \
             currency = ?8, exchange_rate_micros = ?9, is_deleted = ?10, deleted_at = ?11 \
         WHERE id = ?1",
    )
    .bind(&debtor.id)
    .bind(&debtor.phone_number)
    .bind(&debtor.first_name)
    .bind(&debtor.last_name)
    .bind(debtor.transferred_micros)
    .bind(debtor.accepted_micros)
    .bind(debtor.balance_micros)
    .bind(debtor.currency)
    .bind(debtor.exchange_rate_micros)
    .bind(debtor.is_deleted)
    .bind(debtor.deleted_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a debtor by id, deleted or not.
pub async fn fetch_debtor(conn: &mut SqliteConnection, id: &str) -> DbResult<Debtor> {
    sqlx::query_as::<_, Debtor>(&format!("SELECT {DEBTOR_COLUMNS} FROM debtors WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Debtor", id))
}

/// Finds a store's live debtor by phone number.
pub async fn find_live_by_phone(
    conn: &mut SqliteConnection,
    store_id: &str,
    phone_number: &str,
) -> DbResult<Option<Debtor>> {
    let debtor = sqlx::query_as::<_, Debtor>(&format!(
        "SELECT {DEBTOR_COLUMNS} FROM debtors \
         WHERE store_id = ?1 AND phone_number = ?2 AND is_deleted = 0"
    ))
    .bind(store_id)
    .bind(phone_number)
    .fetch_optional(conn)
    .await?;

    Ok(debtor)
}

// =============================================================================
// Documents
// =============================================================================

/// Inserts a document.
pub async fn insert_document(conn: &mut SqliteConnection, doc: &DebtDocument) -> DbResult<()> {
    debug!(id = %doc.id, debtor_id = %doc.debtor_id, method = ?doc.method, "Inserting debt document");

    sqlx::query(
        "INSERT INTO debt_documents (id, debtor_id, store_id, method, currency, \
             exchange_rate_micros, cash_amount_micros, product_amount_micros, \
             total_amount_micros, is_mirror, is_deleted, deleted_at, date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .bind(&doc.id)
    .bind(&doc.debtor_id)
    .bind(&doc.store_id)
    .bind(doc.method)
    .bind(doc.currency)
    .bind(doc.exchange_rate_micros)
    .bind(doc.cash_amount_micros)
    .bind(doc.product_amount_micros)
    .bind(doc.total_amount_micros)
    .bind(doc.is_mirror)
    .bind(doc.is_deleted)
    .bind(doc.deleted_at)
    .bind(doc.date)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates a document's mutable columns.
pub async fn update_document(conn: &mut SqliteConnection, doc: &DebtDocument) -> DbResult<()> {
    sqlx::query(
        "UPDATE debt_documents SET exchange_rate_micros = ?2, cash_amount_micros = ?3, \
             product_amount_micros = ?4, total_amount_micros = ?5, \
             is_deleted = ?6, deleted_at = ?7, date = ?8 \
         WHERE id = ?1",
    )
    .bind(&doc.id)
    .bind(doc.exchange_rate_micros)
    .bind(doc.cash_amount_micros)
    .bind(doc.product_amount_micros)
    .bind(doc.total_amount_micros)
    .bind(doc.is_deleted)
    .bind(doc.deleted_at)
    .bind(doc.date)
    .execute(conn)
    .await?;

    Ok(())
}

/// Fetches a document by id, deleted or not.
pub async fn fetch_document(conn: &mut SqliteConnection, id: &str) -> DbResult<DebtDocument> {
    sqlx::query_as::<_, DebtDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM debt_documents WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("DebtDocument", id))
}

/// Fetches ALL of a debtor's documents, deleted ones included. Balance
/// replay filters in memory.
pub async fn fetch_documents(
    conn: &mut SqliteConnection,
    debtor_id: &str,
) -> DbResult<Vec<DebtDocument>> {
    let docs = sqlx::query_as::<_, DebtDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM debt_documents \
         WHERE debtor_id = ?1 ORDER BY date, id"
    ))
    .bind(debtor_id)
    .fetch_all(conn)
    .await?;

    Ok(docs)
}

/// Fetches a debtor's LIVE documents, for cascade deletes.
pub async fn fetch_live_documents(
    conn: &mut SqliteConnection,
    debtor_id: &str,
) -> DbResult<Vec<DebtDocument>> {
    let docs = sqlx::query_as::<_, DebtDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM debt_documents \
         WHERE debtor_id = ?1 AND is_deleted = 0 ORDER BY date, id"
    ))
    .bind(debtor_id)
    .fetch_all(conn)
    .await?;

    Ok(docs)
}

/// Permanently deletes a document row; its lines cascade.
pub async fn hard_delete_document(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id, "Hard-deleting debt document");

    sqlx::query("DELETE FROM debt_documents WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

// =============================================================================
// Lines
// =============================================================================

/// Inserts a line.
pub async fn insert_line(conn: &mut SqliteConnection, line: &DebtLine) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO debt_lines (id, document_id, product_id, quantity, \
             unit_price_micros, amount_micros, currency, exchange_rate_micros) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(&line.id)
    .bind(&line.document_id)
    .bind(&line.product_id)
    .bind(line.quantity)
    .bind(line.unit_price_micros)
    .bind(line.amount_micros)
    .bind(line.currency)
    .bind(line.exchange_rate_micros)
    .execute(conn)
    .await?;

    Ok(())
}

/// Updates a line's quantity and amount (refund shrink/grow).
pub async fn update_line(conn: &mut SqliteConnection, line: &DebtLine) -> DbResult<()> {
    sqlx::query("UPDATE debt_lines SET quantity = ?2, amount_micros = ?3 WHERE id = ?1")
        .bind(&line.id)
        .bind(line.quantity)
        .bind(line.amount_micros)
        .execute(conn)
        .await?;

    Ok(())
}

/// Deletes a line.
pub async fn delete_line(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM debt_lines WHERE id = ?1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Fetches a line by id.
pub async fn fetch_line(conn: &mut SqliteConnection, id: &str) -> DbResult<DebtLine> {
    sqlx::query_as::<_, DebtLine>(&format!("SELECT {LINE_COLUMNS} FROM debt_lines WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("DebtLine", id))
}

/// Fetches a document's lines.
pub async fn fetch_lines(conn: &mut SqliteConnection, document_id: &str) -> DbResult<Vec<DebtLine>> {
    let lines = sqlx::query_as::<_, DebtLine>(&format!(
        "SELECT {LINE_COLUMNS} FROM debt_lines WHERE document_id = ?1 ORDER BY id"
    ))
    .bind(document_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}
