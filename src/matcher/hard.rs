//! Deterministic (hard) matching
//!
//! Greedy, first-match-wins pairing of Unpaid invoices against
//! unreconciled transactions. Input order decides ties.

use crate::models::{Invoice, MatchSuggestion, Transaction, HARD_MATCH_CONFIDENCE};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

pub const HARD_MATCH_REASONING: &str =
    "Hard Match: exact amount and invoice identifier found in transaction details";

/// Monetary tolerance for an "exact" amount: differences below one cent
pub fn amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Hard-match suggestions plus what was left unclaimed
#[derive(Debug, Clone)]
pub struct HardMatchOutcome<'a> {
    pub suggestions: Vec<MatchSuggestion>,
    pub remaining_invoices: Vec<&'a Invoice>,
    pub remaining_transactions: Vec<&'a Transaction>,
}

pub fn amounts_match(invoice: &Invoice, transaction: &Transaction) -> bool {
    (transaction.amount - invoice.amount).abs() < amount_tolerance()
}

/// Invoice id inside the description, or reference equal to the id (case-insensitive)
pub fn identifier_linked(invoice: &Invoice, transaction: &Transaction) -> bool {
    // The id is compared as stored; only an all-blank id is refused
    if invoice.id.trim().is_empty() {
        return false;
    }
    let id = invoice.id.to_lowercase();

    let in_description = transaction.description.to_lowercase().contains(&id);
    let reference_equal = transaction
        .reference
        .as_deref()
        .map(|r| !r.is_empty() && r.to_lowercase() == id)
        .unwrap_or(false);

    in_description || reference_equal
}

pub fn is_hard_match(invoice: &Invoice, transaction: &Transaction) -> bool {
    amounts_match(invoice, transaction) && identifier_linked(invoice, transaction)
}

/// Run one hard-matching pass.
///
/// Outer loop over open invoices, inner scan over open transactions, both in
/// input order. A claimed invoice or transaction id is never claimed again in
/// the same run.
pub fn hard_match<'a>(
    invoices: &'a [Invoice],
    transactions: &'a [Transaction],
) -> HardMatchOutcome<'a> {
    let open_transactions: Vec<&Transaction> =
        transactions.iter().filter(|t| t.is_open()).collect();

    let mut claimed_invoices: HashSet<&str> = HashSet::new();
    let mut claimed_transactions: HashSet<&str> = HashSet::new();
    let mut suggestions = Vec::new();

    for invoice in invoices.iter().filter(|i| i.is_open()) {
        if claimed_invoices.contains(invoice.id.as_str()) {
            continue;
        }

        let found = open_transactions.iter().find(|txn| {
            !claimed_transactions.contains(txn.id.as_str()) && is_hard_match(invoice, txn)
        });

        if let Some(txn) = found {
            debug!(invoice_id = %invoice.id, transaction_id = %txn.id, "Hard match");

            suggestions.push(MatchSuggestion {
                invoice_id: invoice.id.clone(),
                transaction_id: txn.id.clone(),
                confidence: HARD_MATCH_CONFIDENCE,
                reasoning: HARD_MATCH_REASONING.to_string(),
            });
            claimed_invoices.insert(invoice.id.as_str());
            claimed_transactions.insert(txn.id.as_str());
        }
    }

    let remaining_invoices = invoices
        .iter()
        .filter(|i| i.is_open() && !claimed_invoices.contains(i.id.as_str()))
        .collect();

    let remaining_transactions = open_transactions
        .into_iter()
        .filter(|t| !claimed_transactions.contains(t.id.as_str()))
        .collect();

    HardMatchOutcome {
        suggestions,
        remaining_invoices,
        remaining_transactions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
    }

    fn invoice(id: &str, cents: i64) -> Invoice {
        Invoice::new(id, "Customer", Decimal::new(cents, 2), date())
    }

    fn txn(id: &str, cents: i64, desc: &str) -> Transaction {
        Transaction::new(id, date(), desc, Decimal::new(cents, 2))
    }

    #[test]
    fn test_exact_amount_and_id_in_description() {
        let invoices = vec![invoice("INV-1", 10000)];
        let transactions = vec![txn("T1", 10000, "PAYMENT INV-1")];

        let outcome = hard_match(&invoices, &transactions);
        assert_eq!(
            outcome.suggestions,
            vec![MatchSuggestion {
                invoice_id: "INV-1".into(),
                transaction_id: "T1".into(),
                confidence: 100.0,
                reasoning: HARD_MATCH_REASONING.into(),
            }]
        );
        assert!(outcome.remaining_invoices.is_empty());
        assert!(outcome.remaining_transactions.is_empty());
    }

    #[test]
    fn test_amount_within_tolerance_without_link_is_not_hard() {
        let invoices = vec![invoice("INV-2", 5000)];
        let transactions = vec![txn("T2", 5002, "unrelated text").with_reference("")];

        let outcome = hard_match(&invoices, &transactions);
        assert!(outcome.suggestions.is_empty());
        assert_eq!(outcome.remaining_invoices.len(), 1);
        assert_eq!(outcome.remaining_transactions.len(), 1);
    }

    #[test]
    fn test_reference_match_is_case_insensitive() {
        let invoices = vec![invoice("INV-7", 2500)];
        let transactions = vec![txn("T7", 2500, "wire transfer").with_reference("inv-7")];

        let outcome = hard_match(&invoices, &transactions);
        assert_eq!(outcome.suggestions.len(), 1);
        assert_eq!(outcome.suggestions[0].transaction_id, "T7");
    }

    #[test]
    fn test_one_cent_difference_rejected() {
        let invoices = vec![invoice("INV-1", 10000)];
        let transactions = vec![txn("T1", 10001, "INV-1")];

        assert!(hard_match(&invoices, &transactions).suggestions.is_empty());
        assert!(amounts_match(&invoices[0], &txn("T", 10000, "")));
    }

    #[test]
    fn test_first_transaction_wins_and_no_double_claim() {
        let invoices = vec![invoice("INV-1", 10000), invoice("INV-10", 10000)];
        let transactions = vec![
            // Contains both "INV-1" and "INV-10"
            txn("T1", 10000, "INV-10 payment"),
            txn("T2", 10000, "INV-10 again"),
        ];

        let outcome = hard_match(&invoices, &transactions);
        assert_eq!(outcome.suggestions.len(), 2);
        assert_eq!(outcome.suggestions[0].invoice_id, "INV-1");
        assert_eq!(outcome.suggestions[0].transaction_id, "T1");
        assert_eq!(outcome.suggestions[1].invoice_id, "INV-10");
        assert_eq!(outcome.suggestions[1].transaction_id, "T2");
    }

    #[test]
    fn test_settled_records_are_never_candidates() {
        let mut paid = invoice("INV-1", 10000);
        paid.status = InvoiceStatus::Paid;
        let mut pending = invoice("INV-2", 10000);
        pending.status = InvoiceStatus::Pending;
        let mut reconciled = txn("T3", 10000, "INV-3");
        reconciled.is_reconciled = true;

        let invoices = vec![paid, pending, invoice("INV-3", 10000)];
        let transactions = vec![txn("T1", 10000, "INV-1 INV-2"), reconciled];

        let outcome = hard_match(&invoices, &transactions);
        assert!(outcome.suggestions.is_empty());
        assert_eq!(outcome.remaining_invoices.len(), 1);
        assert_eq!(outcome.remaining_invoices[0].id, "INV-3");
        assert_eq!(outcome.remaining_transactions.len(), 1);
    }

    #[test]
    fn test_blank_invoice_id_never_links() {
        let invoices = vec![invoice("  ", 10000)];
        let transactions = vec![txn("T1", 10000, "anything").with_reference("  ")];
        assert!(hard_match(&invoices, &transactions).suggestions.is_empty());
    }

    #[test]
    fn test_padded_invoice_id_is_compared_verbatim() {
        let trailing = invoice("INV-1 ", 10000);
        let leading = invoice(" INV-1", 10000);
        let in_description = txn("T1", 10000, "PAYMENT INV-1");
        let by_reference = txn("T2", 10000, "wire transfer").with_reference("INV-1");

        assert!(!identifier_linked(&trailing, &in_description));
        assert!(!identifier_linked(&leading, &by_reference));

        let padded_invoices = [trailing.clone(), leading];
        let padded_transactions = [in_description, by_reference];
        let outcome = hard_match(&padded_invoices, &padded_transactions);
        assert!(outcome.suggestions.is_empty());
        assert_eq!(outcome.remaining_invoices.len(), 2);

        // Padding that is part of the description still links
        let spaced = txn("T3", 10000, "PAYMENT INV-1  thanks");
        assert!(identifier_linked(&trailing, &spaced));
    }

    #[test]
    fn test_deterministic_and_unique_across_runs() {
        let invoices: Vec<Invoice> = (0..20)
            .map(|i| invoice(&format!("INV-{}", i), 1000 + (i % 3) * 100))
            .collect();
        let transactions: Vec<Transaction> = (0..25)
            .map(|i| {
                txn(
                    &format!("T{}", i),
                    1000 + (i % 4) * 100,
                    &format!("ref INV-{}", i % 13),
                )
            })
            .collect();

        let first = hard_match(&invoices, &transactions).suggestions;
        let second = hard_match(&invoices, &transactions).suggestions;
        assert_eq!(first, second);

        let mut inv_ids = HashSet::new();
        let mut txn_ids = HashSet::new();
        for s in &first {
            assert!(inv_ids.insert(s.invoice_id.clone()));
            assert!(txn_ids.insert(s.transaction_id.clone()));

            let inv = invoices.iter().find(|i| i.id == s.invoice_id).unwrap();
            let t = transactions.iter().find(|t| t.id == s.transaction_id).unwrap();
            assert!(is_hard_match(inv, t));
        }
    }
}
