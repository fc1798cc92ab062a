//! Invoice/transaction matching
//!
//! Two tiers: deterministic hard matching, then semantic ("vibe") matching
//! delegated to an external collaborator. The coordinator merges and polices
//! both tiers.

use crate::error::ReconcileError;
use crate::models::{Invoice, Transaction};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod coordinator;
pub mod gemini;
pub mod hard;

pub use coordinator::{FuzzyOutcome, MatchCoordinator, MatchPolicy, MatchRun};
pub use gemini::GeminiFuzzyMatcher;
pub use hard::{hard_match, is_hard_match, HardMatchOutcome, HARD_MATCH_REASONING};

//
// ================= Collaborator contract =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyInvoice {
    pub id: String,
    pub customer: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyTransaction {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub reference: String,
}

/// The reduced problem handed to the semantic collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyMatchRequest {
    pub reduced_invoices: Vec<FuzzyInvoice>,
    pub reduced_transactions: Vec<FuzzyTransaction>,
}

impl FuzzyMatchRequest {
    /// Build a request from the unclaimed remainder, keeping at most `max_items` per side
    pub fn from_remaining(
        invoices: &[&Invoice],
        transactions: &[&Transaction],
        max_items: usize,
    ) -> Self {
        Self {
            reduced_invoices: invoices
                .iter()
                .take(max_items)
                .map(|inv| FuzzyInvoice {
                    id: inv.id.clone(),
                    customer: inv.customer_name.clone(),
                    amount: inv.amount,
                })
                .collect(),
            reduced_transactions: transactions
                .iter()
                .take(max_items)
                .map(|txn| FuzzyTransaction {
                    id: txn.id.clone(),
                    description: txn.description.clone(),
                    amount: txn.amount,
                    reference: txn.reference.clone().unwrap_or_default(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reduced_invoices.is_empty() || self.reduced_transactions.is_empty()
    }
}

/// A pairing proposed by the collaborator, not yet validated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuzzyCandidate {
    pub invoice_id: String,
    pub transaction_id: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Semantic matching collaborator (LLM controlled, non-deterministic)
#[async_trait]
pub trait FuzzyMatcher: Send + Sync {
    async fn propose(&self, request: &FuzzyMatchRequest) -> Result<Vec<FuzzyCandidate>>;
}

/// Used when no semantic collaborator is configured.
/// Keeps the matching run functional on hard matches alone.
pub struct DisabledFuzzyMatcher;

#[async_trait]
impl FuzzyMatcher for DisabledFuzzyMatcher {
    async fn propose(&self, _request: &FuzzyMatchRequest) -> Result<Vec<FuzzyCandidate>> {
        Err(ReconcileError::CollaboratorUnavailable(
            "semantic matching is not configured".to_string(),
        ))
    }
}
