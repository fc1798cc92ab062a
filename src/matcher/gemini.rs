//! Gemini-powered semantic matcher
//!
//! Asks the model for pairings the hard matcher missed: fuzzy customer-name
//! matches with a small amount variance allowed.

use crate::gemini::{strip_json_fence, GeminiClient, Part};
use crate::error::ReconcileError;
use crate::matcher::{FuzzyCandidate, FuzzyMatchRequest, FuzzyMatcher};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub struct GeminiFuzzyMatcher {
    client: Arc<GeminiClient>,
}

impl GeminiFuzzyMatcher {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    /// Build structured matching prompt
    fn build_prompt(request: &FuzzyMatchRequest) -> Result<String> {
        let invoices = serde_json::to_string(&request.reduced_invoices)?;
        let transactions = serde_json::to_string(&request.reduced_transactions)?;

        Ok(format!(
            r#"You are an expert financial auditor reconciling a B2B ledger.

Task: Find matches between 'Unpaid Invoices' and 'Unreconciled Bank Transactions' that the automated system missed.

Matching Logic (Vibe Match):
1. Customer Name Matching: look for fuzzy matches between the invoice 'customer' and the transaction 'description'
   (e.g. "PT. INDO JAYA" matches "Indo Jaya Tbk" or "Transfer from I. Jaya").
2. Amount Variance: allow small differences (bank fees, exchange rate variance, admin fees).
   - Variance up to roughly 1-2% of the total is acceptable.
   - If the amount is significantly different, do NOT match unless the reference is explicit.

Data:
Unpaid Invoices: {}

Unreconciled Transactions: {}

Return a JSON array of objects with:
- invoiceId
- transactionId
- confidence (number 0-100)
- reasoning (brief explanation, e.g. "Customer name match with $5 fee variance")

Use each invoice and each transaction at most once.
Only return matches with confidence > 65.
"#,
            invoices, transactions
        ))
    }

    fn response_schema() -> Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "invoiceId": { "type": "STRING" },
                    "transactionId": { "type": "STRING" },
                    "confidence": { "type": "NUMBER" },
                    "reasoning": { "type": "STRING" }
                },
                "required": ["invoiceId", "transactionId", "confidence", "reasoning"]
            }
        })
    }
}

#[async_trait]
impl FuzzyMatcher for GeminiFuzzyMatcher {
    async fn propose(&self, request: &FuzzyMatchRequest) -> Result<Vec<FuzzyCandidate>> {
        let prompt = Self::build_prompt(request)?;

        let raw = self
            .client
            .generate_json(vec![Part::text(prompt)], Self::response_schema())
            .await?;

        let candidates = parse_candidates(&raw)?;
        info!(proposed = candidates.len(), "Semantic matcher returned candidates");
        Ok(candidates)
    }
}

/// Parse the model output item by item. A malformed item is dropped; a
/// response that is not a JSON array at all is an error.
pub fn parse_candidates(raw: &str) -> Result<Vec<FuzzyCandidate>> {
    let value: Value = serde_json::from_str(strip_json_fence(raw)).map_err(|e| {
        ReconcileError::CollaboratorResponse(format!(
            "Failed to parse semantic match response: {} | raw={}",
            e, raw
        ))
    })?;

    let items = value.as_array().ok_or_else(|| {
        ReconcileError::CollaboratorResponse("Semantic match response is not an array".to_string())
    })?;

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<FuzzyCandidate>(item.clone()) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!("Dropping malformed semantic match item: {} | item={}", e, item),
        }
    }

    Ok(candidates)
}
