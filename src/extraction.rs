//! Invoice document extraction
//!
//! Turns a raw invoice document (PDF or image) into a reviewable
//! `ScannedInvoice`. The reviewer approves or discards it; only approval
//! puts an invoice into the ledger.

use crate::gemini::{strip_json_fence, GeminiClient, Part};
use crate::models::{Invoice, InvoiceStatus};
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannedInvoice {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub confidence: ExtractionConfidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

impl ScannedInvoice {
    /// Strip extraction metadata; the result is a plain Unpaid invoice
    pub fn approve(self) -> Invoice {
        Invoice {
            status: InvoiceStatus::Unpaid,
            ..self.invoice
        }
    }
}

/// Document-extraction collaborator. `Ok(None)` means no data could be extracted.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &RawDocument) -> Result<Option<ScannedInvoice>>;
}

/// Shape the model is asked to return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedFields {
    id: String,
    customer_name: String,
    amount: Decimal,
    due_date: String,
    confidence: ExtractionConfidence,
    #[serde(default)]
    issue: Option<String>,
}

pub struct GeminiDocumentExtractor {
    client: Arc<GeminiClient>,
}

impl GeminiDocumentExtractor {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    fn prompt() -> &'static str {
        r#"You are a diligent junior accountant named "Ledger Larry".
Your task is to extract structured data from this invoice document.

Please extract the following fields:
1. Invoice Number (use this for 'id')
2. Customer Name (customerName)
3. Total Amount (amount) - numeric value only
4. Due Date (dueDate) - format YYYY-MM-DD. If only 'Invoice Date' is present, use that.

Quality Check:
- If the document is blurry, cut off, or doesn't look like an invoice, set 'confidence' to 'low' and describe the problem in 'issue'.
- If you are unsure about specific numbers, set 'confidence' to 'medium'.
- Otherwise, set 'confidence' to 'high'.

Return a JSON object matching the schema."#
    }

    fn response_schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "customerName": { "type": "STRING" },
                "amount": { "type": "NUMBER" },
                "dueDate": { "type": "STRING" },
                "confidence": { "type": "STRING", "enum": ["high", "medium", "low"] },
                "issue": { "type": "STRING" }
            },
            "required": ["id", "customerName", "amount", "dueDate", "confidence"]
        })
    }
}

#[async_trait]
impl DocumentExtractor for GeminiDocumentExtractor {
    async fn extract(&self, document: &RawDocument) -> Result<Option<ScannedInvoice>> {
        if !self.client.is_configured() {
            warn!("Gemini API key missing, returning demo extraction");
            return Ok(Some(demo_extraction(document)));
        }

        let parts = vec![
            Part::inline_data(document.mime_type.clone(), STANDARD.encode(&document.bytes)),
            Part::text(Self::prompt()),
        ];

        let raw = match self.client.generate_json(parts, Self::response_schema()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(file = %document.file_name, "Error extracting invoice: {}", e);
                return Ok(None);
            }
        };

        let scanned = parse_extraction(&raw);
        if scanned.is_some() {
            info!(file = %document.file_name, "Invoice extracted");
        }
        Ok(scanned)
    }
}

/// Parse model output into a scanned invoice; `None` when unusable
pub fn parse_extraction(raw: &str) -> Option<ScannedInvoice> {
    let fields: ExtractedFields = match serde_json::from_str(strip_json_fence(raw)) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("Extraction response unusable: {}", e);
            return None;
        }
    };

    let (due_date, confidence, issue) =
        match NaiveDate::parse_from_str(fields.due_date.trim(), "%Y-%m-%d") {
            Ok(date) => (date, fields.confidence, fields.issue),
            Err(_) => (
                Utc::now().date_naive(),
                ExtractionConfidence::Low,
                Some(match fields.issue {
                    Some(existing) => format!("{}; unreadable due date", existing),
                    None => format!("Unreadable due date: {}", fields.due_date),
                }),
            ),
        };

    Some(ScannedInvoice {
        invoice: Invoice {
            id: fields.id,
            customer_name: fields.customer_name,
            amount: fields.amount,
            due_date,
            status: InvoiceStatus::Unpaid,
            description: None,
        },
        confidence,
        issue,
    })
}

/// Stable placeholder invoice derived from the document bytes
fn demo_extraction(document: &RawDocument) -> ScannedInvoice {
    let hash = Sha256::digest(&document.bytes);
    let seed = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]);

    ScannedInvoice {
        invoice: Invoice::new(
            format!("INV-{}", seed % 1000),
            "Demo Customer Inc",
            Decimal::from(seed % 5000 + 100),
            Utc::now().date_naive(),
        ),
        confidence: ExtractionConfidence::Medium,
        issue: Some("Demo Mode: API Key missing".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::DEFAULT_MODEL;

    #[test]
    fn test_parse_extraction() {
        let raw = r#"{"id": "INV-55", "customerName": "Acme", "amount": 1500.25,
                      "dueDate": "2024-10-15", "confidence": "high"}"#;

        let scanned = parse_extraction(raw).unwrap();
        assert_eq!(scanned.invoice.id, "INV-55");
        assert_eq!(scanned.invoice.amount, Decimal::new(150025, 2));
        assert_eq!(scanned.confidence, ExtractionConfidence::High);
        assert!(scanned.issue.is_none());
    }

    #[test]
    fn test_bad_due_date_downgrades_confidence() {
        let raw = r#"{"id": "INV-56", "customerName": "Acme", "amount": 10,
                      "dueDate": "next week", "confidence": "high"}"#;

        let scanned = parse_extraction(raw).unwrap();
        assert_eq!(scanned.confidence, ExtractionConfidence::Low);
        assert!(scanned.issue.unwrap().contains("next week"));
    }

    #[test]
    fn test_unusable_response() {
        assert!(parse_extraction(r#"{"id": "INV-57"}"#).is_none());
        assert!(parse_extraction("").is_none());
    }

    #[test]
    fn test_approve_strips_metadata() {
        let raw = r#"{"id": "INV-58", "customerName": "Acme", "amount": 10,
                      "dueDate": "2024-10-15", "confidence": "low", "issue": "Blurry"}"#;
        let invoice = parse_extraction(raw).unwrap().approve();

        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        let json = serde_json::to_value(&invoice).unwrap();
        assert!(json.get("confidence").is_none());
        assert!(json.get("issue").is_none());
    }

    #[tokio::test]
    async fn test_demo_mode_without_key() {
        let client = Arc::new(GeminiClient::new(None, DEFAULT_MODEL).unwrap());
        let extractor = GeminiDocumentExtractor::new(client);
        let document = RawDocument {
            file_name: "invoice.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF-1.4 demo".to_vec(),
        };

        let first = extractor.extract(&document).await.unwrap().unwrap();
        let second = extractor.extract(&document).await.unwrap().unwrap();

        assert_eq!(first.confidence, ExtractionConfidence::Medium);
        assert_eq!(first.issue.as_deref(), Some("Demo Mode: API Key missing"));
        assert_eq!(first.invoice.id, second.invoice.id);
        assert!(first.invoice.amount >= Decimal::from(100));
    }
}
