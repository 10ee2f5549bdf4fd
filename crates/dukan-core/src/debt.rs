//! # Debtor Balance Replay
//!
//! Full recomputation of a debtor's running totals from their documents.
//!
//! Balances are never adjusted incrementally. Every document mutation
//! (create, update, soft-delete, restore, line edit) finishes by replaying
//! ALL of the debtor's live, ledger-affecting documents:
//!
//! ```text
//! transferred = Σ to_debtor_currency(doc.total)   for method = transfer
//! accepted    = Σ to_debtor_currency(doc.total)   for method = accept
//! balance     = transferred − accepted
//! ```
//!
//! Deleted documents and mirror documents contribute nothing, so a restore
//! lands on exactly the balance the delete left behind reversed. Replay
//! makes delete/restore symmetry free instead of something to maintain.
//!
//! ## Cross-Currency Conversion
//! Each document converts at its OWN exchange-rate snapshot, not the
//! debtor's current rate. A non-positive snapshot falls back to a rate of 1
//! so historic documents with missing rates degrade loudly (amounts pass
//! through unconverted) rather than poisoning the whole replay.

use crate::money::{rate_or_default, Money};
use crate::types::{DebtDocument, Debtor, DocumentMethod};

/// Replays `documents` into the debtor's cached totals.
///
/// Accepts the debtor's full document list; filtering of deleted and mirror
/// documents happens here so callers cannot get it wrong.
pub fn recalculate(debtor: &mut Debtor, documents: &[DebtDocument]) {
    let mut transferred = Money::zero();
    let mut accepted = Money::zero();

    for doc in documents {
        if doc.is_deleted || !doc.affects_ledger() {
            continue;
        }
        let amount = to_debtor_currency(debtor, doc);
        match doc.method {
            DocumentMethod::Transfer => transferred += amount,
            DocumentMethod::Accept => accepted += amount,
        }
    }

    debtor.transferred_micros = transferred.micros();
    debtor.accepted_micros = accepted.micros();
    debtor.balance_micros = (transferred - accepted).micros();
}

/// Converts a document total into the debtor's currency using the
/// document's own rate snapshot.
fn to_debtor_currency(debtor: &Debtor, doc: &DebtDocument) -> Money {
    let total = doc.total_amount();
    if doc.currency == debtor.currency {
        return total;
    }
    let rate = rate_or_default(doc.exchange_rate());
    if debtor.currency.is_reference() {
        // local-currency document viewed by a reference-currency debtor
        total.div_rate(rate)
    } else {
        total.mul_rate(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::SoftDeletable;
    use crate::money::Currency;
    use chrono::Utc;

    fn debtor(currency: Currency) -> Debtor {
        Debtor::new(
            "store-1",
            "+998901234567",
            "Ali",
            "Valiyev",
            currency,
            Money::from_major(13_000),
            Utc::now(),
        )
    }

    fn doc(method: DocumentMethod, total: Money, currency: Currency, rate: Money) -> DebtDocument {
        DebtDocument {
            id: uuid::Uuid::new_v4().to_string(),
            debtor_id: "u1".into(),
            store_id: "store-1".into(),
            method,
            currency,
            exchange_rate_micros: rate.micros(),
            cash_amount_micros: total.micros(),
            product_amount_micros: 0,
            total_amount_micros: total.micros(),
            is_mirror: false,
            is_deleted: false,
            deleted_at: None,
            date: Utc::now(),
        }
    }

    #[test]
    fn test_same_currency_replay() {
        let mut debtor = debtor(Currency::Usd);
        let docs = vec![
            doc(DocumentMethod::Transfer, Money::from_major(100), Currency::Usd, Money::from_major(1)),
            doc(DocumentMethod::Transfer, Money::from_major(50), Currency::Usd, Money::from_major(1)),
            doc(DocumentMethod::Accept, Money::from_major(30), Currency::Usd, Money::from_major(1)),
        ];
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.transferred(), Money::from_major(150));
        assert_eq!(debtor.accepted(), Money::from_major(30));
        assert_eq!(debtor.balance(), Money::from_major(120));
    }

    #[test]
    fn test_cross_currency_uses_document_rate() {
        let mut debtor = debtor(Currency::Usd);
        // 130,000 local at rate 13,000 = 10 reference units
        let docs = vec![doc(
            DocumentMethod::Transfer,
            Money::from_major(130_000),
            Currency::Uzs,
            Money::from_major(13_000),
        )];
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.balance(), Money::from_major(10));

        // local-currency debtor converts the other way
        let mut debtor = super::tests::debtor(Currency::Uzs);
        let docs = vec![doc(
            DocumentMethod::Transfer,
            Money::from_major(10),
            Currency::Usd,
            Money::from_major(13_000),
        )];
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.balance(), Money::from_major(130_000));
    }

    #[test]
    fn test_deleted_and_mirror_docs_excluded() {
        let mut debtor = debtor(Currency::Usd);
        let mut deleted = doc(
            DocumentMethod::Transfer,
            Money::from_major(100),
            Currency::Usd,
            Money::from_major(1),
        );
        deleted.mark_deleted(Utc::now());
        let mut mirror = doc(
            DocumentMethod::Transfer,
            Money::from_major(100),
            Currency::Usd,
            Money::from_major(1),
        );
        mirror.is_mirror = true;
        let live = doc(
            DocumentMethod::Transfer,
            Money::from_major(25),
            Currency::Usd,
            Money::from_major(1),
        );

        recalculate(&mut debtor, &[deleted, mirror, live]);
        assert_eq!(debtor.balance(), Money::from_major(25));
    }

    #[test]
    fn test_delete_restore_round_trip() {
        let mut debtor = debtor(Currency::Usd);
        let mut docs = vec![
            doc(DocumentMethod::Transfer, Money::from_major(80), Currency::Usd, Money::from_major(1)),
            doc(DocumentMethod::Accept, Money::from_major(20), Currency::Usd, Money::from_major(1)),
        ];
        recalculate(&mut debtor, &docs);
        let original = debtor.balance();

        let now = Utc::now();
        docs[0].mark_deleted(now);
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.balance(), Money::from_major(-20));

        docs[0].mark_restored();
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.balance(), original);
    }

    #[test]
    fn test_missing_rate_falls_back_to_identity() {
        let mut debtor = debtor(Currency::Usd);
        let docs = vec![doc(
            DocumentMethod::Transfer,
            Money::from_major(42),
            Currency::Uzs,
            Money::zero(),
        )];
        recalculate(&mut debtor, &docs);
        assert_eq!(debtor.balance(), Money::from_major(42));
    }

    #[test]
    fn test_empty_replay_zeroes_totals() {
        let mut debtor = debtor(Currency::Usd);
        debtor.transferred_micros = 999;
        debtor.balance_micros = 999;
        recalculate(&mut debtor, &[]);
        assert_eq!(debtor.transferred(), Money::zero());
        assert_eq!(debtor.accepted(), Money::zero());
        assert_eq!(debtor.balance(), Money::zero());
    }
}
