//! Match coordinator
//!
//! hard match → reduce → semantic collaborator → validate → merge
//!
//! The collaborator is trusted for the fuzziness decision itself, never for
//! identifiers or the confidence policy.

use crate::matcher::hard::hard_match;
use crate::matcher::{FuzzyCandidate, FuzzyMatchRequest, FuzzyMatcher};
use crate::models::{Invoice, MatchSuggestion, Transaction, HARD_MATCH_CONFIDENCE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FUZZY_CONFIDENCE_THRESHOLD: f64 = 65.0;
pub const DEFAULT_MAX_FUZZY_ITEMS: usize = 200;

const FALLBACK_FUZZY_REASONING: &str = "Vibe Match: proposed by semantic matcher";

#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    /// Fuzzy candidates must report strictly more than this
    pub min_fuzzy_confidence: f64,
    /// Bound on each reduced set sent to the collaborator
    pub max_fuzzy_items: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            min_fuzzy_confidence: FUZZY_CONFIDENCE_THRESHOLD,
            max_fuzzy_items: DEFAULT_MAX_FUZZY_ITEMS,
        }
    }
}

/// What happened to the semantic tier in one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FuzzyOutcome {
    /// Nothing left to match after the hard tier
    NotNeeded,
    Completed { proposed: usize, accepted: usize },
    /// Collaborator failed; the run degraded to hard matches only
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRun {
    /// Hard matches first, then validated fuzzy matches
    pub suggestions: Vec<MatchSuggestion>,
    pub hard_matches: usize,
    pub fuzzy: FuzzyOutcome,
}

pub struct MatchCoordinator {
    fuzzy: Arc<dyn FuzzyMatcher>,
    policy: MatchPolicy,
}

impl MatchCoordinator {
    pub fn new(fuzzy: Arc<dyn FuzzyMatcher>) -> Self {
        Self::with_policy(fuzzy, MatchPolicy::default())
    }

    pub fn with_policy(fuzzy: Arc<dyn FuzzyMatcher>, policy: MatchPolicy) -> Self {
        Self { fuzzy, policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Produce ranked suggestions for the given ledger snapshot.
    ///
    /// Never fails: collaborator problems degrade to hard matches only.
    pub async fn run(&self, invoices: &[Invoice], transactions: &[Transaction]) -> MatchRun {
        let hard = hard_match(invoices, transactions);
        let hard_matches = hard.suggestions.len();
        let mut suggestions = hard.suggestions;

        info!(hard_matches, "Hard matching complete");

        if hard.remaining_invoices.is_empty() || hard.remaining_transactions.is_empty() {
            return MatchRun {
                suggestions,
                hard_matches,
                fuzzy: FuzzyOutcome::NotNeeded,
            };
        }

        let request = FuzzyMatchRequest::from_remaining(
            &hard.remaining_invoices,
            &hard.remaining_transactions,
            self.policy.max_fuzzy_items,
        );

        debug!(
            invoices = request.reduced_invoices.len(),
            transactions = request.reduced_transactions.len(),
            "Delegating reduced set to semantic matcher"
        );

        let candidates = match self.fuzzy.propose(&request).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Semantic matching unavailable, returning hard matches only: {}", e);
                return MatchRun {
                    suggestions,
                    hard_matches,
                    fuzzy: FuzzyOutcome::Unavailable {
                        reason: e.to_string(),
                    },
                };
            }
        };

        let proposed = candidates.len();
        let accepted = validate_candidates(&request, candidates, &self.policy);
        let accepted_count = accepted.len();

        info!(proposed, accepted = accepted_count, "Semantic matching complete");

        suggestions.extend(accepted);

        MatchRun {
            suggestions,
            hard_matches,
            fuzzy: FuzzyOutcome::Completed {
                proposed,
                accepted: accepted_count,
            },
        }
    }
}

/// Enforce the fuzzy policy on collaborator output.
///
/// Kept: finite confidence in (threshold, 100), both ids inside the request's
/// reduced sets, neither id used by an earlier accepted candidate.
pub fn validate_candidates(
    request: &FuzzyMatchRequest,
    candidates: Vec<FuzzyCandidate>,
    policy: &MatchPolicy,
) -> Vec<MatchSuggestion> {
    let invoice_ids: HashSet<&str> = request
        .reduced_invoices
        .iter()
        .map(|i| i.id.as_str())
        .collect();
    let transaction_ids: HashSet<&str> = request
        .reduced_transactions
        .iter()
        .map(|t| t.id.as_str())
        .collect();

    let mut used_invoices: HashSet<String> = HashSet::new();
    let mut used_transactions: HashSet<String> = HashSet::new();
    let mut accepted = Vec::new();

    for candidate in candidates {
        let confidence = candidate.confidence;

        if !confidence.is_finite()
            || confidence <= policy.min_fuzzy_confidence
            || confidence >= HARD_MATCH_CONFIDENCE
        {
            debug!(
                invoice_id = %candidate.invoice_id,
                transaction_id = %candidate.transaction_id,
                confidence,
                "Discarding fuzzy candidate: confidence outside policy"
            );
            continue;
        }

        if !invoice_ids.contains(candidate.invoice_id.as_str())
            || !transaction_ids.contains(candidate.transaction_id.as_str())
        {
            warn!(
                invoice_id = %candidate.invoice_id,
                transaction_id = %candidate.transaction_id,
                "Discarding fuzzy candidate: identifier not in request"
            );
            continue;
        }

        if used_invoices.contains(&candidate.invoice_id)
            || used_transactions.contains(&candidate.transaction_id)
        {
            debug!(
                invoice_id = %candidate.invoice_id,
                transaction_id = %candidate.transaction_id,
                "Discarding fuzzy candidate: identifier already paired"
            );
            continue;
        }

        let reasoning = match candidate.reasoning.trim() {
            "" => FALLBACK_FUZZY_REASONING.to_string(),
            text => text.to_string(),
        };

        used_invoices.insert(candidate.invoice_id.clone());
        used_transactions.insert(candidate.transaction_id.clone());

        accepted.push(MatchSuggestion {
            invoice_id: candidate.invoice_id,
            transaction_id: candidate.transaction_id,
            confidence,
            reasoning,
        });
    }

    accepted
}
