//! # Domain Types
//!
//! Core domain types for the Dukan ledger.
//!
//! ## Aggregate Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ownership Graph                                 │
//! │                                                                         │
//! │  Store ──► CashAccount ──► CashMovement (tagged with ONE CashSource)   │
//! │    │                                                                    │
//! │    ├─────► Product ──► StockLot (pool: shelf | warehouse)              │
//! │    │                      │                                             │
//! │    │                      └── debt_document_id (traceability only,     │
//! │    │                          never ownership)                          │
//! │    │                                                                    │
//! │    └─────► Debtor ──► DebtDocument ──► DebtLine                        │
//! │                                                                         │
//! │  Orders, refunds, transfers, and imports reference products/debtors    │
//! │  by id: relationship, not ownership.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, barcode, phone_number)
//!
//! ## Money Fields
//! Monetary columns are raw `*_micros: i64` with [`Money`] accessors, so the
//! same struct maps straight onto a database row and still exposes typed
//! arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Currency, Money};

// =============================================================================
// Enums
// =============================================================================

/// Stock location for a lot: sellable shelf or reserve warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum StockPool {
    Shelf,
    Warehouse,
}

/// Direction of a debt document.
///
/// `Transfer`: the store hands out goods/cash on credit (stock leaves,
/// cash leaves, debtor owes more). `Accept`: the debtor settles (stock or
/// cash comes back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DocumentMethod {
    Transfer,
    Accept,
}

/// How an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
}

impl Default for PaymentType {
    fn default() -> Self {
        PaymentType::Cash
    }
}

/// Unit of measure for a product count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum CountType {
    Pcs,
    Kg,
    L,
    M,
    Box,
    Set,
    Pkg,
    D,
}

impl Default for CountType {
    fn default() -> Self {
        CountType::Pcs
    }
}

/// Why goods came back on a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum RefundReason {
    /// Damaged/expired: written off, never restocked.
    Unusable,
    /// Customer changed their mind: goods go back on the shelf.
    Disliked,
    /// Anything else (requires a custom reason text); restocked.
    Other,
}

/// What a refund does to stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    /// A new shelf lot is produced at the product's current average cost.
    Restock,
    /// A waste entry records the loss; no lot is created.
    Waste,
}

// =============================================================================
// Cash Source
// =============================================================================

/// The one causing record behind a cash movement.
///
/// Exactly one source tags every movement; re-posting for the same source
/// replaces the previous movements (see `cash::CashBook::post`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashSource {
    Order(String),
    Expense(String),
    StockImport(String),
    Manual(String),
    DebtDocument(String),
}

/// Discriminator column for [`CashSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CashSourceKind {
    Order,
    Expense,
    StockImport,
    Manual,
    DebtDocument,
}

impl CashSource {
    /// Returns the discriminator for this source.
    pub fn kind(&self) -> CashSourceKind {
        match self {
            CashSource::Order(_) => CashSourceKind::Order,
            CashSource::Expense(_) => CashSourceKind::Expense,
            CashSource::StockImport(_) => CashSourceKind::StockImport,
            CashSource::Manual(_) => CashSourceKind::Manual,
            CashSource::DebtDocument(_) => CashSourceKind::DebtDocument,
        }
    }

    /// Returns the id of the causing record (or the label for manual entries).
    pub fn source_id(&self) -> &str {
        match self {
            CashSource::Order(id)
            | CashSource::Expense(id)
            | CashSource::StockImport(id)
            | CashSource::Manual(id)
            | CashSource::DebtDocument(id) => id,
        }
    }
}

// =============================================================================
// Consumption Source
// =============================================================================

/// The line whose creation consumed stock.
///
/// Journaled deductions carry their source so that reversing the line can
/// recreate exactly the units it took (see `ConsumedLotRecord`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumptionSource {
    OrderLine(String),
    DebtLine(String),
}

/// Discriminator column for [`ConsumptionSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionSourceKind {
    OrderLine,
    DebtLine,
}

impl ConsumptionSource {
    /// Returns the discriminator for this source.
    pub fn kind(&self) -> ConsumptionSourceKind {
        match self {
            ConsumptionSource::OrderLine(_) => ConsumptionSourceKind::OrderLine,
            ConsumptionSource::DebtLine(_) => ConsumptionSourceKind::DebtLine,
        }
    }

    /// Returns the id of the causing line.
    pub fn source_id(&self) -> &str {
        match self {
            ConsumptionSource::OrderLine(id) | ConsumptionSource::DebtLine(id) => id,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// A tenant. Each store owns one cash account and its own products,
/// debtors, and event-source records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product & Stock Lots
// =============================================================================

/// A product with cached stock totals and a recompute-only average cost.
///
/// `shelf_qty`, `warehouse_qty`, and `average_cost_micros` are derived from
/// the live lots by `StockAggregate::recompute_average_cost` and must never
/// be edited directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub name: String,
    /// Business identifier, `SKU-XXXXXXXX`.
    pub sku: String,
    /// EAN-13 barcode with valid checksum.
    pub barcode: Option<String>,
    pub count_type: CountType,

    /// Cached sellable quantity (sum of shelf lots).
    pub shelf_qty: i64,
    /// Cached reserve quantity (sum of warehouse lots).
    pub warehouse_qty: i64,
    /// Weighted-average unit cost over all live lots, reference currency.
    pub average_cost_micros: i64,

    /// List (sell) price, reference currency.
    pub list_price_micros: i64,
    pub currency: Currency,
    /// Exchange-rate snapshot captured when the product was saved.
    pub exchange_rate_micros: i64,

    pub in_stock: bool,
    /// Monotonic counter handing out FIFO tie-break sequence numbers to lots.
    pub lot_seq: i64,

    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with zero stock.
    pub fn new(
        store_id: impl Into<String>,
        name: impl Into<String>,
        sku: impl Into<String>,
        list_price: Money,
        currency: Currency,
        exchange_rate: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Product {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.into(),
            name: name.into(),
            sku: sku.into(),
            barcode: None,
            count_type: CountType::default(),
            shelf_qty: 0,
            warehouse_qty: 0,
            average_cost_micros: 0,
            list_price_micros: list_price.micros(),
            currency,
            exchange_rate_micros: exchange_rate.micros(),
            in_stock: false,
            lot_seq: 0,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Weighted-average unit cost (reference currency).
    #[inline]
    pub fn average_cost(&self) -> Money {
        Money::from_micros(self.average_cost_micros)
    }

    /// List price (reference currency).
    #[inline]
    pub fn list_price(&self) -> Money {
        Money::from_micros(self.list_price_micros)
    }

    /// Exchange-rate snapshot.
    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }

    /// Total quantity across both pools.
    #[inline]
    pub fn total_qty(&self) -> i64 {
        self.shelf_qty + self.warehouse_qty
    }
}

/// A batch of stock units sharing product, pool, and unit cost.
///
/// Lots are consumed oldest-first (`created_at`, ties by `seq`). A lot whose
/// quantity reaches zero is deleted, never kept; reversal creates a fresh
/// lot with the same quantity/cost/pool triple; lot identity carries no
/// meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLot {
    pub id: String,
    pub product_id: String,
    pub pool: StockPool,
    /// Always > 0 while the lot is alive.
    pub quantity: i64,
    /// Unit cost in the reference currency.
    pub unit_cost_micros: i64,
    /// Originating debt document, for traceability only.
    pub debt_document_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// FIFO tie-break within equal `created_at`, from `Product::lot_seq`.
    pub seq: i64,
}

impl StockLot {
    /// Unit cost (reference currency).
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_micros(self.unit_cost_micros)
    }

    /// Total cost carried by this lot.
    #[inline]
    pub fn total_cost(&self) -> Money {
        self.unit_cost().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cash
// =============================================================================

/// One cash account per store.
///
/// `balance_micros` is the cached value; `cash::CashBook::recompute_balance`
/// derives the true value from the live movements. The two are exposed
/// separately so reporting can detect drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashAccount {
    pub id: String,
    pub store_id: String,
    pub balance_micros: i64,
}

impl CashAccount {
    /// Creates an empty account for a store.
    pub fn new(store_id: impl Into<String>) -> Self {
        CashAccount {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.into(),
            balance_micros: 0,
        }
    }

    /// The cached (recorded) balance.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_micros(self.balance_micros)
    }
}

/// A signed movement on a cash account, reference currency, tagged with
/// exactly one causing source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashMovement {
    pub id: String,
    pub account_id: String,
    /// Always > 0; direction is carried by `is_outflow`.
    pub amount_micros: i64,
    pub is_outflow: bool,
    /// Exchange-rate snapshot of the causing record.
    pub exchange_rate_micros: i64,
    pub note: String,
    pub source_type: CashSourceKind,
    pub source_id: String,
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Movement amount (always positive).
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_micros(self.amount_micros)
    }

    /// Signed contribution to the balance.
    #[inline]
    pub fn signed_amount(&self) -> Money {
        if self.is_outflow {
            -self.amount()
        } else {
            self.amount()
        }
    }

    /// Reconstructs the tagged source.
    pub fn source(&self) -> CashSource {
        let id = self.source_id.clone();
        match self.source_type {
            CashSourceKind::Order => CashSource::Order(id),
            CashSourceKind::Expense => CashSource::Expense(id),
            CashSourceKind::StockImport => CashSource::StockImport(id),
            CashSourceKind::Manual => CashSource::Manual(id),
            CashSourceKind::DebtDocument => CashSource::DebtDocument(id),
        }
    }

    /// Whether this movement is tagged with the given source.
    pub fn matches_source(&self, source: &CashSource) -> bool {
        self.source_type == source.kind() && self.source_id == source.source_id()
    }
}

// =============================================================================
// Debtors & Debt Documents
// =============================================================================

/// A debt/credit counterparty of one store, identified by phone number
/// among the store's live debtors.
///
/// `transferred`, `accepted`, and `balance` are in the debtor's own
/// currency and are recomputed by replaying all live, non-mirror documents
/// (`debt::recalculate`), never adjusted incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Debtor {
    pub id: String,
    pub store_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,

    pub transferred_micros: i64,
    pub accepted_micros: i64,
    pub balance_micros: i64,

    pub currency: Currency,
    pub exchange_rate_micros: i64,

    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Debtor {
    /// Creates a debtor with a zero balance.
    pub fn new(
        store_id: impl Into<String>,
        phone_number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        currency: Currency,
        exchange_rate: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Debtor {
            id: Uuid::new_v4().to_string(),
            store_id: store_id.into(),
            phone_number: phone_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            transferred_micros: 0,
            accepted_micros: 0,
            balance_micros: 0,
            currency,
            exchange_rate_micros: exchange_rate.micros(),
            is_deleted: false,
            deleted_at: None,
            created_at: now,
        }
    }

    #[inline]
    pub fn transferred(&self) -> Money {
        Money::from_micros(self.transferred_micros)
    }

    #[inline]
    pub fn accepted(&self) -> Money {
        Money::from_micros(self.accepted_micros)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_micros(self.balance_micros)
    }

    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }
}

/// A debt document: cash component plus zero or more product lines.
///
/// `total = cash + Σ line.amount`. A mirror document is a read-side copy
/// that never touches stock, cash, or the debtor balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DebtDocument {
    pub id: String,
    pub debtor_id: String,
    pub store_id: String,
    pub method: DocumentMethod,
    pub currency: Currency,
    pub exchange_rate_micros: i64,

    pub cash_amount_micros: i64,
    pub product_amount_micros: i64,
    pub total_amount_micros: i64,

    pub is_mirror: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub date: DateTime<Utc>,
}

impl DebtDocument {
    #[inline]
    pub fn cash_amount(&self) -> Money {
        Money::from_micros(self.cash_amount_micros)
    }

    #[inline]
    pub fn product_amount(&self) -> Money {
        Money::from_micros(self.product_amount_micros)
    }

    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_micros(self.total_amount_micros)
    }

    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }

    /// Recomputes `product_amount` and `total_amount` from the given live
    /// lines. Totals are always fully re-derived, never patched.
    pub fn retotal(&mut self, lines: &[DebtLine]) {
        let product_amount: Money = lines.iter().map(DebtLine::amount).sum();
        self.product_amount_micros = product_amount.micros();
        self.total_amount_micros = (self.cash_amount() + product_amount).micros();
    }

    /// Whether this document participates in ledger effects at all.
    #[inline]
    pub fn affects_ledger(&self) -> bool {
        !self.is_mirror
    }
}

/// One product line of a debt document. `amount = quantity × price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DebtLine {
    pub id: String,
    pub document_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_micros: i64,
    pub amount_micros: i64,
    pub currency: Currency,
    pub exchange_rate_micros: i64,
}

impl DebtLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_micros(self.unit_price_micros)
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_micros(self.amount_micros)
    }

    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A retail sale. Customer identity is a phone-number capture, not a
/// foreign key, so orders survive customer churn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub store_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub payment_type: PaymentType,
    pub currency: Currency,
    pub exchange_rate_micros: i64,

    /// Σ normalized line price × qty.
    pub total_price_micros: i64,
    /// What the customer handed over (0 = nothing paid yet).
    pub paid_amount_micros: i64,
    pub change_given: bool,
    pub change_amount_micros: i64,

    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_micros(self.total_price_micros)
    }

    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_micros(self.paid_amount_micros)
    }

    #[inline]
    pub fn change_amount(&self) -> Money {
        Money::from_micros(self.change_amount_micros)
    }

    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Normalized (reference-currency) unit price.
    pub unit_price_micros: i64,
    pub currency: Currency,
    pub exchange_rate_micros: i64,
}

impl OrderLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_micros(self.unit_price_micros)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Refunds, Waste, Transfers, Imports
// =============================================================================

/// A return of goods against exactly one order line OR one debt line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Refund {
    pub id: String,
    pub order_line_id: Option<String>,
    pub debt_line_id: Option<String>,
    pub reason: RefundReason,
    pub custom_reason: Option<String>,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    /// Stock effect implied by the reason.
    pub fn outcome(&self) -> RefundOutcome {
        match self.reason {
            RefundReason::Unusable => RefundOutcome::Waste,
            RefundReason::Disliked | RefundReason::Other => RefundOutcome::Restock,
        }
    }
}

/// A write-off record for goods that came back unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WasteEntry {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
    pub refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A warehouse→shelf move. `auto = true` when the ledger created it
/// implicitly to cover a shelf shortfall during consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransferRecord {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub auto: bool,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// A purchase intake: goods arrive, cash leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockImportRecord {
    pub id: String,
    pub product_id: String,
    pub store_id: String,
    pub quantity: i64,
    pub unit_price_micros: i64,
    pub currency: Currency,
    pub exchange_rate_micros: i64,
    pub pool: StockPool,
    pub created_at: DateTime<Utc>,
}

impl StockImportRecord {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_micros(self.unit_price_micros)
    }

    #[inline]
    pub fn exchange_rate(&self) -> Money {
        Money::from_micros(self.exchange_rate_micros)
    }

    /// Total purchase cost of this intake.
    #[inline]
    pub fn total_cost(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// One journaled FIFO deduction: what a line's consumption took from one
/// lot. Kept until the line is reversed, so the reversal can recreate
/// exactly those units at exactly that cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ConsumedLotRecord {
    pub id: String,
    pub product_id: String,
    pub source_type: ConsumptionSourceKind,
    pub source_id: String,
    pub pool: StockPool,
    pub quantity: i64,
    pub unit_cost_micros: i64,
    /// Position within the consumption's FIFO walk.
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

impl ConsumedLotRecord {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_micros(self.unit_cost_micros)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_source_roundtrip() {
        let source = CashSource::DebtDocument("doc-1".to_string());
        assert_eq!(source.kind(), CashSourceKind::DebtDocument);
        assert_eq!(source.source_id(), "doc-1");
    }

    #[test]
    fn test_consumption_source_roundtrip() {
        let source = ConsumptionSource::DebtLine("line-1".to_string());
        assert_eq!(source.kind(), ConsumptionSourceKind::DebtLine);
        assert_eq!(source.source_id(), "line-1");
    }

    #[test]
    fn test_movement_signed_amount() {
        let movement = CashMovement {
            id: "m1".into(),
            account_id: "a1".into(),
            amount_micros: Money::from_major(5).micros(),
            is_outflow: true,
            exchange_rate_micros: Money::from_major(1).micros(),
            note: String::new(),
            source_type: CashSourceKind::Manual,
            source_id: "opening".into(),
            created_at: Utc::now(),
        };
        assert_eq!(movement.signed_amount(), Money::from_major(-5));
        assert!(movement.matches_source(&CashSource::Manual("opening".into())));
        assert!(!movement.matches_source(&CashSource::Order("opening".into())));
    }

    #[test]
    fn test_document_retotal() {
        let mut doc = DebtDocument {
            id: "d1".into(),
            debtor_id: "u1".into(),
            store_id: "s1".into(),
            method: DocumentMethod::Transfer,
            currency: Currency::Usd,
            exchange_rate_micros: Money::from_major(1).micros(),
            cash_amount_micros: Money::from_major(3).micros(),
            product_amount_micros: 0,
            total_amount_micros: 0,
            is_mirror: false,
            is_deleted: false,
            deleted_at: None,
            date: Utc::now(),
        };
        let line = DebtLine {
            id: "l1".into(),
            document_id: "d1".into(),
            product_id: "p1".into(),
            quantity: 4,
            unit_price_micros: Money::from_major(5).micros(),
            amount_micros: Money::from_major(20).micros(),
            currency: Currency::Usd,
            exchange_rate_micros: Money::from_major(1).micros(),
        };
        doc.retotal(&[line]);
        assert_eq!(doc.product_amount(), Money::from_major(20));
        assert_eq!(doc.total_amount(), Money::from_major(23));
    }

    #[test]
    fn test_refund_outcome() {
        let mut refund = Refund {
            id: "r1".into(),
            order_line_id: Some("ol1".into()),
            debt_line_id: None,
            reason: RefundReason::Unusable,
            custom_reason: None,
            quantity: 1,
            created_at: Utc::now(),
        };
        assert_eq!(refund.outcome(), RefundOutcome::Waste);
        refund.reason = RefundReason::Disliked;
        assert_eq!(refund.outcome(), RefundOutcome::Restock);
    }

    #[test]
    fn test_lot_total_cost() {
        let lot = StockLot {
            id: "l1".into(),
            product_id: "p1".into(),
            pool: StockPool::Shelf,
            quantity: 10,
            unit_cost_micros: Money::from_major(2).micros(),
            debt_document_id: None,
            created_at: Utc::now(),
            seq: 1,
        };
        assert_eq!(lot.total_cost(), Money::from_major(20));
    }
}
