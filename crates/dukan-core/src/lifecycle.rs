//! # Soft-Delete Lifecycle
//!
//! Shared flag-flipping for soft-deletable entities.
//!
//! ## Lifecycle
//! ```text
//! draft (not persisted) ──► active ──► deleted ──► active (restored) ──► …
//!                                         │
//!                                         └──► hard delete (terminal,
//!                                              erroneous records only)
//! ```
//!
//! The trait covers ONLY the `is_deleted`/`deleted_at` pair. The reversal
//! side effects that accompany a delete or restore differ per entity (a
//! debt document returns stock and voids cash, an order re-posts payments)
//! and live in each entity's service, which calls `mark_deleted` /
//! `mark_restored` only after its reversal succeeded.

use chrono::{DateTime, Utc};

/// An entity carrying the `is_deleted`/`deleted_at` pair.
pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool, at: Option<DateTime<Utc>>);

    /// Flags the record deleted. Idempotent; returns whether anything changed.
    fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_deleted() {
            return false;
        }
        self.set_deleted(true, Some(now));
        true
    }

    /// Clears the deleted flag. Idempotent; returns whether anything changed.
    fn mark_restored(&mut self) -> bool {
        if !self.is_deleted() {
            return false;
        }
        self.set_deleted(false, None);
        true
    }
}

macro_rules! impl_soft_deletable {
    ($($entity:ty),+ $(,)?) => {
        $(
            impl SoftDeletable for $entity {
                fn is_deleted(&self) -> bool {
                    self.is_deleted
                }

                fn set_deleted(&mut self, deleted: bool, at: Option<DateTime<Utc>>) {
                    self.is_deleted = deleted;
                    self.deleted_at = at;
                }
            }
        )+
    };
}

impl_soft_deletable!(
    crate::types::Product,
    crate::types::Debtor,
    crate::types::DebtDocument,
    crate::types::Order,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::{Currency, Money};
    use crate::types::Debtor;

    #[test]
    fn test_mark_deleted_and_restore_are_idempotent() {
        let now = Utc::now();
        let mut debtor = Debtor::new(
            "store-1",
            "+998901234567",
            "Ali",
            "Valiyev",
            Currency::Usd,
            Money::from_major(13_000),
            now,
        );

        assert!(debtor.mark_deleted(now));
        assert!(debtor.is_deleted);
        assert_eq!(debtor.deleted_at, Some(now));
        assert!(!debtor.mark_deleted(now)); // second call is a no-op

        assert!(debtor.mark_restored());
        assert!(!debtor.is_deleted);
        assert_eq!(debtor.deleted_at, None);
        assert!(!debtor.mark_restored());
    }
}
