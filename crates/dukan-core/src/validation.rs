//! # Input Validation
//!
//! Field-level checks and business-identifier helpers, run before ledger
//! logic touches anything.
//!
//! ## Validation Flow
//! ```text
//! caller input ──► validate_*() ──► ValidationError (reject early)
//!                      │
//!                      ▼ ok
//!                 ledger operation (stock / cash / debt)
//! ```

use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

pub type ValidationResult = Result<(), ValidationError>;

// =============================================================================
// Field Checks
// =============================================================================

/// Validates a phone number: `+` followed by 7 to 15 digits.
pub fn validate_phone(phone: &str) -> ValidationResult {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "phone_number".to_string(),
        });
    }
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "expected + followed by 7-15 digits".to_string(),
        });
    }
    Ok(())
}

/// Validates that a name field is non-empty after trimming.
pub fn validate_required(field: &str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a quantity used for consumption or production.
pub fn validate_quantity(quantity: i64) -> ValidationResult {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates an exchange rate supplied alongside a local-currency amount.
pub fn validate_exchange_rate(rate: Money) -> ValidationResult {
    if !rate.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "exchange_rate".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Barcode (EAN-13)
// =============================================================================

/// Validates an EAN-13 barcode: 13 digits with a correct check digit.
///
/// ## Example
/// ```
/// use dukan_core::validation::validate_barcode;
/// assert!(validate_barcode("4006381333931").is_ok());
/// assert!(validate_barcode("4006381333932").is_err());
/// ```
pub fn validate_barcode(barcode: &str) -> ValidationResult {
    if barcode.len() != 13 || !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "expected 13 digits".to_string(),
        });
    }
    let digits: Vec<u32> = barcode.chars().filter_map(|c| c.to_digit(10)).collect();
    if ean13_check_digit(&digits[..12]) != digits[12] {
        return Err(ValidationError::BadChecksum {
            field: "barcode".to_string(),
        });
    }
    Ok(())
}

/// Generates a random internal EAN-13 barcode in the store-internal
/// `200`-prefix range, with a valid check digit.
pub fn generate_barcode() -> String {
    let mut digits: Vec<u32> = vec![2, 0, 0];
    for byte in &Uuid::new_v4().as_bytes()[..9] {
        digits.push((*byte % 10) as u32);
    }
    let check = ean13_check_digit(&digits);
    digits.push(check);
    digits.into_iter().map(|d| char::from_digit(d, 10).unwrap_or('0')).collect()
}

/// EAN-13 check digit over the first 12 digits: odd positions weight 1,
/// even positions weight 3.
fn ean13_check_digit(digits: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

// =============================================================================
// SKU
// =============================================================================

const SKU_PREFIX: &str = "SKU-";
const SKU_BODY_LEN: usize = 8;
const SKU_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Validates a SKU: `SKU-` followed by 8 characters from `[A-Z0-9]`.
pub fn validate_sku(sku: &str) -> ValidationResult {
    let body = sku.strip_prefix(SKU_PREFIX).unwrap_or("");
    if body.len() != SKU_BODY_LEN
        || !body.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: format!("expected {SKU_PREFIX} followed by {SKU_BODY_LEN} of [A-Z0-9]"),
        });
    }
    Ok(())
}

/// Generates a fresh random SKU. Uniqueness within a store is enforced by
/// the database; collisions over a 36^8 space are retried there.
pub fn generate_sku() -> String {
    let bytes = Uuid::new_v4();
    let body: String = bytes.as_bytes()[..SKU_BODY_LEN]
        .iter()
        .map(|b| SKU_CHARSET[*b as usize % SKU_CHARSET.len()] as char)
        .collect();
    format!("{SKU_PREFIX}{body}")
}

// =============================================================================
// Unit Tests
// =============================================================================
