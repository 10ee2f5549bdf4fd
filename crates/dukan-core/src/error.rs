//! # Error Types
//!
//! Domain-specific error types for dukan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dukan-core errors (this file)                                         │
//! │  ├── LedgerError      - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dukan-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → LedgerError → DbError → Caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, quantities, source)
//! 3. Errors are enum variants, never String
//! 4. `InvariantViolation` is operator-actionable: it means persisted state
//!    no longer matches what the ledger wrote, and must never be retried
//!    automatically

use thiserror::Error;

// =============================================================================
// Ledger Error
// =============================================================================

/// Ledger rule violations.
///
/// These map one-to-one onto the failure taxonomy the event sources expose
/// to their callers. Everything except `InvariantViolation` is a caller
/// error rejected before any state mutates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A monetary input is unusable: non-finite, non-positive where a
    /// positive amount is required, or a local-currency amount arrived
    /// without a usable exchange rate.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Forward stock consumption cannot be satisfied, even after the
    /// implicit warehouse→shelf transfer.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 5 × "Olma"
    ///      │
    ///      ▼
    /// shelf=2, warehouse=1 → total 3 < 5
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Olma", requested: 5, available: 3 }
    ///      │
    ///      ▼
    /// UI shows: "insufficient stock: need 5, have 3"
    /// ```
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// A reversal (soft-delete or restore) could not be applied because the
    /// stock it needs to remove is gone. Stock was mutated outside the
    /// ledger; the whole reversal aborts and the record keeps its current
    /// lifecycle state.
    #[error("Ledger invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// Referenced product/debtor/account/record is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl LedgerError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        LedgerError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Creates an InvariantViolation error.
    pub fn invariant(reason: impl Into<String>) -> Self {
        LedgerError::InvariantViolation {
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Remaps an `InsufficientStock` raised during a *reversal* into an
    /// `InvariantViolation`. Forward shortfalls are caller errors; shortfalls
    /// while undoing a previously applied effect mean the underlying data
    /// was tampered with.
    pub fn into_reversal_violation(self) -> Self {
        match self {
            LedgerError::InsufficientStock {
                product,
                requested,
                available,
            } => LedgerError::invariant(format!(
                "reversal needs {requested} of {product} but only {available} remain"
            )),
            other => other,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before ledger logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed barcode, bad phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Checksum failure (EAN-13 barcodes).
    #[error("{field} has an invalid checksum")]
    BadChecksum { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with LedgerError.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LedgerError::InsufficientStock {
            product: "Olma".to_string(),
            requested: 5,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Olma: requested 5, available 2"
        );
    }

    #[test]
    fn test_validation_converts_to_ledger_error() {
        let validation_err = ValidationError::Required {
            field: "phone_number".to_string(),
        };
        let err: LedgerError = validation_err.into();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_reversal_remap() {
        let err = LedgerError::InsufficientStock {
            product: "Olma".to_string(),
            requested: 4,
            available: 0,
        };
        let remapped = err.into_reversal_violation();
        assert!(matches!(remapped, LedgerError::InvariantViolation { .. }));

        // Non-stock errors pass through untouched
        let err = LedgerError::not_found("Product", "p1").into_reversal_violation();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }
}
