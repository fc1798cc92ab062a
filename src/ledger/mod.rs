//! Ledger store
//!
//! Holds the in-memory invoice and transaction collections.
//! Single writer: whoever owns the store drives every mutation.

use crate::models::{Invoice, InvoiceStatus, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Result of a confirmation request. Anything but `Applied` left the ledger untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Applied,
    UnknownInvoice,
    UnknownTransaction,
    AlreadyReconciled,
}

impl ConfirmOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ConfirmOutcome::Applied)
    }
}

/// Dashboard-level figures derived from the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub invoice_count: usize,
    pub unpaid_count: usize,
    pub transaction_count: usize,
    pub unreconciled_count: usize,
    /// Sum of reconciled transaction amounts
    pub cash_position: Decimal,
    /// Sum of Unpaid invoice amounts
    pub outstanding_receivables: Decimal,
    /// Rounded percentage of transactions reconciled
    pub reconciliation_health: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    invoices: Vec<Invoice>,
    transactions: Vec<Transaction>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(invoices: Vec<Invoice>, transactions: Vec<Transaction>) -> Self {
        Self {
            invoices,
            transactions,
        }
    }

    pub fn invoices(&self) -> &[Invoice] {
        &self.invoices
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn invoice(&self, id: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|inv| inv.id == id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|txn| txn.id == id)
    }

    pub fn contains_invoice(&self, id: &str) -> bool {
        self.invoice(id).is_some()
    }

    pub fn open_invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.iter().filter(|inv| inv.is_open())
    }

    pub fn unreconciled_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|txn| txn.is_open())
    }

    /// Additive merge; existing entries keep their position and identity
    pub fn append_invoices(&mut self, invoices: impl IntoIterator<Item = Invoice>) -> usize {
        let before = self.invoices.len();
        self.invoices.extend(invoices);
        let added = self.invoices.len() - before;
        debug!(added, total = self.invoices.len(), "Appended invoices");
        added
    }

    pub fn append_transactions(
        &mut self,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> usize {
        let before = self.transactions.len();
        self.transactions.extend(transactions);
        let added = self.transactions.len() - before;
        debug!(added, total = self.transactions.len(), "Appended transactions");
        added
    }

    pub fn replace_all(&mut self, invoices: Vec<Invoice>, transactions: Vec<Transaction>) {
        info!(
            invoices = invoices.len(),
            transactions = transactions.len(),
            "Replacing ledger contents"
        );
        self.invoices = invoices;
        self.transactions = transactions;
    }

    pub fn reset(&mut self) {
        self.invoices.clear();
        self.transactions.clear();
    }

    /// Mark an invoice Paid and a transaction reconciled against it.
    ///
    /// Both records change together or neither does. Unknown identifiers and
    /// already-settled records are a silent no-op. Appends may leave several
    /// records under one id; every copy is settled, and the confirmation only
    /// applies while at least one copy on each side is still open.
    pub fn confirm_match(&mut self, invoice_id: &str, transaction_id: &str) -> ConfirmOutcome {
        if !self.contains_invoice(invoice_id) {
            debug!(invoice_id, "Confirmation ignored: unknown invoice");
            return ConfirmOutcome::UnknownInvoice;
        }
        if self.transaction(transaction_id).is_none() {
            debug!(transaction_id, "Confirmation ignored: unknown transaction");
            return ConfirmOutcome::UnknownTransaction;
        }

        let invoice_open = self
            .invoices
            .iter()
            .any(|inv| inv.id == invoice_id && inv.status != InvoiceStatus::Paid);
        let transaction_open = self
            .unreconciled_transactions()
            .any(|txn| txn.id == transaction_id);
        if !invoice_open || !transaction_open {
            debug!(invoice_id, transaction_id, "Confirmation ignored: already reconciled");
            return ConfirmOutcome::AlreadyReconciled;
        }

        for invoice in self.invoices.iter_mut().filter(|inv| inv.id == invoice_id) {
            invoice.status = InvoiceStatus::Paid;
        }
        for transaction in self
            .transactions
            .iter_mut()
            .filter(|txn| txn.id == transaction_id)
        {
            transaction.is_reconciled = true;
            transaction.matched_invoice_id = Some(invoice_id.to_string());
        }

        info!(invoice_id, transaction_id, "Match confirmed");
        ConfirmOutcome::Applied
    }

    pub fn summary(&self) -> LedgerSummary {
        let unpaid: Vec<&Invoice> = self.open_invoices().collect();
        let reconciled_count = self
            .transactions
            .iter()
            .filter(|txn| txn.is_reconciled)
            .count();

        let cash_position = self
            .transactions
            .iter()
            .filter(|txn| txn.is_reconciled)
            .map(|txn| txn.amount)
            .sum();

        let outstanding_receivables = unpaid.iter().map(|inv| inv.amount).sum();

        let reconciliation_health = if self.transactions.is_empty() {
            0
        } else {
            let pct = reconciled_count as f64 / self.transactions.len() as f64 * 100.0;
            pct.round() as u32
        };

        LedgerSummary {
            invoice_count: self.invoices.len(),
            unpaid_count: unpaid.len(),
            transaction_count: self.transactions.len(),
            unreconciled_count: self.transactions.len() - reconciled_count,
            cash_position,
            outstanding_receivables,
            reconciliation_health,
        }
    }
}
