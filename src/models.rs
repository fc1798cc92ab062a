//! Core data models for the reconciliation ledger

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Confidence reserved for deterministic (hard) matches
pub const HARD_MATCH_CONFIDENCE: f64 = 100.0;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvoiceStatus {
    Unpaid,
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    Match,
    /// Reserved. No flow records it yet.
    Unmatch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Hard,
    Fuzzy,
}

//
// ================= Invoice =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub customer_name: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Invoice {
    pub fn new(
        id: impl Into<String>,
        customer_name: impl Into<String>,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            customer_name: customer_name.into(),
            amount,
            due_date,
            status: InvoiceStatus::Unpaid,
            description: None,
        }
    }

    /// Only Unpaid invoices are offered as match candidates
    pub fn is_open(&self) -> bool {
        self.status == InvoiceStatus::Unpaid
    }
}

//
// ================= Transaction =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Credit amount
    pub amount: Decimal,
    #[serde(default, rename = "referenceNumber", alias = "reference")]
    pub reference: Option<String>,
    #[serde(default)]
    pub is_reconciled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_invoice_id: Option<String>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            description: description.into(),
            amount,
            reference: None,
            is_reconciled: false,
            matched_invoice_id: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn is_open(&self) -> bool {
        !self.is_reconciled
    }
}

//
// ================= Matching =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSuggestion {
    pub invoice_id: String,
    pub transaction_id: String,
    pub confidence: f64,
    pub reasoning: String,
}

impl MatchSuggestion {
    pub fn tier(&self) -> MatchTier {
        if self.confidence >= HARD_MATCH_CONFIDENCE {
            MatchTier::Hard
        } else {
            MatchTier::Fuzzy
        }
    }
}

//
// ================= Audit =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub details: String,
    pub user: String,
    /// SHA-256 over the other fields, hex encoded
    pub digest: String,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Unpaid => "Unpaid",
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Paid => "Paid",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::Match => "Match",
            AuditAction::Unmatch => "Unmatch",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_wire_format() {
        let json = r#"{
            "id": "TXN-1001",
            "date": "2024-10-16",
            "description": "TECHSTART SOLUTIONS INV-2024-001",
            "amount": 12500.00,
            "referenceNumber": "REF-001",
            "isReconciled": false
        }"#;

        let txn: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.reference.as_deref(), Some("REF-001"));
        assert_eq!(txn.amount, Decimal::new(12500, 0));
        assert!(txn.is_open());

        let out = serde_json::to_value(&txn).unwrap();
        assert_eq!(out["referenceNumber"], "REF-001");
        assert!(out.get("matchedInvoiceId").is_none());
    }

    #[test]
    fn test_invoice_defaults_and_tier() {
        let json = r#"{
            "id": "INV-1",
            "customerName": "Acme Corp",
            "amount": 100,
            "dueDate": "2024-10-15",
            "status": "Unpaid"
        }"#;
        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert!(invoice.is_open());
        assert!(invoice.description.is_none());

        let fuzzy = MatchSuggestion {
            invoice_id: "INV-1".into(),
            transaction_id: "T1".into(),
            confidence: 80.0,
            reasoning: "name".into(),
        };
        assert_eq!(fuzzy.tier(), MatchTier::Fuzzy);
    }
}
