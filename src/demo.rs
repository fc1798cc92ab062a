//! Demo dataset
//!
//! Generated by the model when a key is configured, otherwise (or on any
//! failure) the fixed dataset below.

use crate::gemini::{strip_json_fence, GeminiClient, Part};
use crate::models::{Invoice, Transaction};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoDataset {
    pub invoices: Vec<Invoice>,
    pub transactions: Vec<Transaction>,
}

pub struct DemoDataSource {
    client: Arc<GeminiClient>,
}

impl DemoDataSource {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    pub async fn load(&self) -> DemoDataset {
        if !self.client.is_configured() {
            info!("No API key: using fallback demo data");
            return fallback_dataset();
        }

        let parts = vec![Part::text(Self::prompt())];
        match self.client.generate_json(parts, Self::response_schema()).await {
            Ok(raw) => match parse_dataset(&raw) {
                Some(dataset) => {
                    info!(
                        invoices = dataset.invoices.len(),
                        transactions = dataset.transactions.len(),
                        "Generated demo data"
                    );
                    dataset
                }
                None => {
                    warn!("Generated demo data was empty or malformed, using fallback");
                    fallback_dataset()
                }
            },
            Err(e) => {
                error!("Failed to generate demo data, using fallback: {}", e);
                fallback_dataset()
            }
        }
    }

    fn prompt() -> &'static str {
        r#"Generate a realistic B2B dataset for a financial reconciliation demo.
Create 8 invoices and 8 bank transactions.

Requirements:
- Fuzzy Matches (Crucial): Generate 3 pairs where the Customer Name on the invoice is SLIGHTLY different from the Transaction Description.
  - Example 1: Invoice "Alpha Solutions Ltd" vs Transaction "TRF FROM ALPHA SOLS".
  - Example 2: Invoice "Omega Healthcare Inc" vs Transaction "OMEGA HEALTH WIRE".
- Hard Matches: Generate 3 pairs that match exactly on Amount and have the Invoice ID in the transaction reference.
- Variance Match: Generate 1 pair where the transaction amount is slightly less (e.g., $15 bank fee deducted) than the invoice amount.
- Unpaid/Unreconciled: Leave 1 invoice unpaid and 1 transaction unreconciled (unrelated).
- Anomaly: Create 2 transactions on the same date with the same amount and description (e.g., "Double Charge") to test anomaly detection.

Return JSON with two arrays: "invoices" and "transactions"."#
    }

    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "invoices": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "customerName": { "type": "STRING" },
                            "amount": { "type": "NUMBER" },
                            "dueDate": { "type": "STRING" },
                            "status": { "type": "STRING", "enum": ["Unpaid", "Paid"] }
                        }
                    }
                },
                "transactions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "date": { "type": "STRING" },
                            "description": { "type": "STRING" },
                            "amount": { "type": "NUMBER" },
                            "referenceNumber": { "type": "STRING" },
                            "isReconciled": { "type": "BOOLEAN" }
                        }
                    }
                }
            }
        })
    }
}

/// Lenient per-item parse; `None` when no invoice survives
pub fn parse_dataset(raw: &str) -> Option<DemoDataset> {
    let value: Value = match serde_json::from_str(strip_json_fence(raw)) {
        Ok(value) => value,
        Err(e) => {
            warn!("Demo data response is not JSON: {}", e);
            return None;
        }
    };

    let invoices: Vec<Invoice> = parse_items(&value, "invoices", |item| {
        let mut item = item.clone();
        if let Some(obj) = item.as_object_mut() {
            obj.entry("status").or_insert_with(|| json!("Unpaid"));
        }
        serde_json::from_value(item)
    });
    if invoices.is_empty() {
        return None;
    }

    let transactions: Vec<Transaction> =
        parse_items(&value, "transactions", |item| serde_json::from_value(item.clone()));

    Some(DemoDataset {
        invoices,
        transactions,
    })
}

fn parse_items<T>(
    value: &Value,
    key: &str,
    parse: impl Fn(&Value) -> serde_json::Result<T>,
) -> Vec<T> {
    let Some(items) = value.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match parse(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, "Dropping malformed demo item: {}", e);
                None
            }
        })
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Covers each reconciliation path once: hard match, name variance,
/// amount variance, an unrelated deposit and a duplicate charge pair
pub fn fallback_dataset() -> DemoDataset {
    let invoice = |id: &str, customer: &str, cents: i64, due: NaiveDate| {
        Invoice::new(id, customer, Decimal::new(cents, 2), due)
    };
    let txn = |id: &str, on: NaiveDate, desc: &str, cents: i64, reference: &str| {
        Transaction::new(id, on, desc, Decimal::new(cents, 2)).with_reference(reference)
    };

    DemoDataset {
        invoices: vec![
            invoice("INV-2024-001", "TechStart Solutions", 1_250_000, date(2024, 10, 15)),
            invoice("INV-2024-002", "GreenLeaf Logistics", 420_050, date(2024, 10, 18)),
            invoice("INV-2024-003", "Quantum Systems", 890_000, date(2024, 10, 20)),
            invoice("INV-2024-004", "BlueSky Ventures", 315_000, date(2024, 10, 22)),
            invoice("INV-2024-005", "Apex Construction", 1_575_000, date(2024, 10, 25)),
            invoice("INV-2024-006", "Nebula Creative", 250_000, date(2024, 10, 28)),
        ],
        transactions: vec![
            txn("TXN-1001", date(2024, 10, 16), "TECHSTART SOLUTIONS INV-2024-001", 1_250_000, "REF-001"),
            txn("TXN-1002", date(2024, 10, 19), "TRF FROM GREENLEAF LOG", 420_050, "WIRE-202"),
            txn("TXN-1003", date(2024, 10, 21), "QUANTUM SYS PAYMENT", 888_500, "ACH-993"),
            txn("TXN-1004", date(2024, 10, 22), "Unknown Deposit", 50_000, "UNK-111"),
            txn("TXN-1005", date(2024, 10, 23), "Duplicate Service Charge", 15_000, "FEE-001"),
            txn("TXN-1006", date(2024, 10, 23), "Duplicate Service Charge", 15_000, "FEE-002"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::detect_duplicates;
    use crate::gemini::DEFAULT_MODEL;
    use crate::matcher::hard_match;
    use crate::models::InvoiceStatus;

    #[test]
    fn test_fallback_dataset_shape() {
        let data = fallback_dataset();
        assert_eq!(data.invoices.len(), 6);
        assert_eq!(data.transactions.len(), 6);

        let outcome = hard_match(&data.invoices, &data.transactions);
        assert_eq!(outcome.suggestions.len(), 1);
        assert_eq!(outcome.suggestions[0].transaction_id, "TXN-1001");

        let groups = detect_duplicates(&data.transactions);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].transactions.len(), 2);
    }

    #[test]
    fn test_parse_dataset_drops_bad_items() {
        let raw = r#"{
            "invoices": [
                {"id": "INV-1", "customerName": "Alpha Solutions Ltd", "amount": 100, "dueDate": "2024-10-01"},
                {"id": "INV-2", "customerName": "Broken", "amount": "lots"}
            ],
            "transactions": [
                {"id": "T1", "date": "2024-10-02", "description": "TRF FROM ALPHA SOLS", "amount": 100, "referenceNumber": "W-1"},
                {"id": "T2"}
            ]
        }"#;

        let data = parse_dataset(raw).unwrap();
        assert_eq!(data.invoices.len(), 1);
        assert_eq!(data.invoices[0].status, InvoiceStatus::Unpaid);
        assert_eq!(data.transactions.len(), 1);
        assert_eq!(data.transactions[0].reference.as_deref(), Some("W-1"));
    }

    #[test]
    fn test_parse_dataset_without_invoices() {
        assert!(parse_dataset(r#"{"invoices": [], "transactions": []}"#).is_none());
        assert!(parse_dataset("{}").is_none());
        assert!(parse_dataset("not json").is_none());
    }

    #[tokio::test]
    async fn test_load_without_key_uses_fallback() {
        let source = DemoDataSource::new(Arc::new(GeminiClient::new(None, DEFAULT_MODEL).unwrap()));
        assert_eq!(source.load().await, fallback_dataset());
    }
}
