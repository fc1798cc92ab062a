//! Session orchestration
//!
//! INGEST → SUGGEST → CONFIRM → AUDIT
//!
//! The ledger and the audit trail live behind one lock so a confirmation and
//! its audit entry are never observed apart. Matching runs work on a snapshot
//! and at most one runs at a time.

use crate::anomaly::{detect_duplicates, AnomalyGroup};
use crate::audit::AuditRecorder;
use crate::erp::{new_invoices_only, ErpConnector, ErpProvider};
use crate::error::ReconcileError;
use crate::ledger::{ConfirmOutcome, LedgerStore, LedgerSummary};
use crate::matcher::{MatchCoordinator, MatchRun};
use crate::models::{AuditLogEntry, Invoice, Transaction};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub struct Workspace {
    pub ledger: LedgerStore,
    pub audit: AuditRecorder,
}

/// Point-in-time copy of the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub invoices: Vec<Invoice>,
    pub transactions: Vec<Transaction>,
    pub summary: LedgerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResult {
    pub outcome: ConfirmOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_entry: Option<AuditLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub provider: ErpProvider,
    pub fetched: usize,
    pub added: usize,
}

pub struct Reconciler {
    workspace: RwLock<Workspace>,
    coordinator: MatchCoordinator,
    run_guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(coordinator: MatchCoordinator, audit: AuditRecorder) -> Self {
        Self::with_ledger(LedgerStore::new(), coordinator, audit)
    }

    pub fn with_ledger(
        ledger: LedgerStore,
        coordinator: MatchCoordinator,
        audit: AuditRecorder,
    ) -> Self {
        let policy = coordinator.policy();
        info!(
            actor = audit.actor(),
            max_fuzzy_items = policy.max_fuzzy_items,
            min_fuzzy_confidence = policy.min_fuzzy_confidence,
            "Reconciler ready"
        );
        Self {
            workspace: RwLock::new(Workspace { ledger, audit }),
            coordinator,
            run_guard: Mutex::new(()),
        }
    }

    /// Run hard + semantic matching over the current ledger.
    ///
    /// Fails only with `RunInProgress`; collaborator trouble degrades the run.
    pub async fn suggest_matches(&self) -> Result<MatchRun> {
        let _guard = self
            .run_guard
            .try_lock()
            .map_err(|_| ReconcileError::RunInProgress)?;

        let start_time = Instant::now();
        let (invoices, transactions) = {
            let ws = self.workspace.read().await;
            (
                ws.ledger.invoices().to_vec(),
                ws.ledger.transactions().to_vec(),
            )
        };

        info!(
            invoices = invoices.len(),
            transactions = transactions.len(),
            "Reconciler: starting matching run"
        );

        let mut run = self.coordinator.run(&invoices, &transactions).await;

        // The ledger may have moved on while the collaborator was thinking
        let ws = self.workspace.read().await;
        let before = run.suggestions.len();
        run.suggestions.retain(|s| {
            ws.ledger.invoice(&s.invoice_id).is_some_and(Invoice::is_open)
                && ws
                    .ledger
                    .transaction(&s.transaction_id)
                    .is_some_and(Transaction::is_open)
        });
        let stale = before - run.suggestions.len();
        if stale > 0 {
            warn!(stale, "Dropped suggestions settled during the run");
        }

        info!(
            suggestions = run.suggestions.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Reconciler: matching run complete"
        );

        Ok(run)
    }

    /// Settle a pair and record it. Nothing is audited unless the ledger changed.
    pub async fn confirm_match(&self, invoice_id: &str, transaction_id: &str) -> ConfirmResult {
        let mut ws = self.workspace.write().await;
        let outcome = ws.ledger.confirm_match(invoice_id, transaction_id);

        let audit_entry = if outcome.is_applied() {
            Some(ws.audit.record_match(invoice_id, transaction_id))
        } else {
            debug!(invoice_id, transaction_id, ?outcome, "Confirmation was a no-op");
            None
        };

        ConfirmResult {
            outcome,
            audit_entry,
        }
    }

    pub async fn append_invoices(&self, invoices: Vec<Invoice>) -> usize {
        self.workspace.write().await.ledger.append_invoices(invoices)
    }

    pub async fn append_transactions(&self, transactions: Vec<Transaction>) -> usize {
        self.workspace
            .write()
            .await
            .ledger
            .append_transactions(transactions)
    }

    /// Replace the ledger contents wholesale (demo load)
    pub async fn load_dataset(&self, invoices: Vec<Invoice>, transactions: Vec<Transaction>) {
        self.workspace
            .write()
            .await
            .ledger
            .replace_all(invoices, transactions);
    }

    /// Clear the ledger. The audit trail is kept.
    pub async fn reset(&self) {
        self.workspace.write().await.ledger.reset();
        info!("Ledger reset");
    }

    /// Pull invoices from an ERP and append those not already in the ledger
    pub async fn sync_erp(
        &self,
        connector: &dyn ErpConnector,
        provider: ErpProvider,
    ) -> Result<SyncReport> {
        let fetched = connector.fetch_invoices(provider).await?;
        let fetched_count = fetched.len();

        let mut ws = self.workspace.write().await;
        let fresh = new_invoices_only(ws.ledger.invoices(), fetched);
        let added = ws.ledger.append_invoices(fresh);

        info!(%provider, fetched = fetched_count, added, "ERP sync complete");

        Ok(SyncReport {
            provider,
            fetched: fetched_count,
            added,
        })
    }

    pub async fn anomalies(&self) -> Vec<AnomalyGroup> {
        detect_duplicates(self.workspace.read().await.ledger.transactions())
    }

    pub async fn summary(&self) -> LedgerSummary {
        self.workspace.read().await.ledger.summary()
    }

    /// Newest first
    pub async fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.workspace.read().await.audit.entries().cloned().collect()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let ws = self.workspace.read().await;
        LedgerSnapshot {
            invoices: ws.ledger.invoices().to_vec(),
            transactions: ws.ledger.transactions().to_vec(),
            summary: ws.ledger.summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::verify_entry;
    use crate::demo::fallback_dataset;
    use crate::erp::SimulatedErpConnector;
    use crate::matcher::{
        DisabledFuzzyMatcher, FuzzyCandidate, FuzzyMatchRequest, FuzzyMatcher, FuzzyOutcome,
    };
    use crate::models::{InvoiceStatus, MatchTier};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn reconciler(fuzzy: Arc<dyn FuzzyMatcher>) -> Reconciler {
        Reconciler::new(MatchCoordinator::new(fuzzy), AuditRecorder::default())
    }

    async fn demo_reconciler(fuzzy: Arc<dyn FuzzyMatcher>) -> Reconciler {
        let r = reconciler(fuzzy);
        let data = fallback_dataset();
        r.load_dataset(data.invoices, data.transactions).await;
        r
    }

    struct FixedMatcher(Vec<FuzzyCandidate>);

    #[async_trait]
    impl FuzzyMatcher for FixedMatcher {
        async fn propose(&self, _request: &FuzzyMatchRequest) -> Result<Vec<FuzzyCandidate>> {
            Ok(self.0.clone())
        }
    }

    /// Blocks until released, so tests can act while a run is in flight
    struct GatedMatcher {
        entered: Notify,
        release: Notify,
        candidates: Vec<FuzzyCandidate>,
    }

    #[async_trait]
    impl FuzzyMatcher for GatedMatcher {
        async fn propose(&self, _request: &FuzzyMatchRequest) -> Result<Vec<FuzzyCandidate>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.candidates.clone())
        }
    }

    fn candidate(invoice_id: &str, transaction_id: &str, confidence: f64) -> FuzzyCandidate {
        FuzzyCandidate {
            invoice_id: invoice_id.into(),
            transaction_id: transaction_id.into(),
            confidence,
            reasoning: "Name variance".into(),
        }
    }

    #[tokio::test]
    async fn test_suggest_without_collaborator() {
        let r = demo_reconciler(Arc::new(DisabledFuzzyMatcher)).await;
        let run = r.suggest_matches().await.unwrap();

        assert_eq!(run.suggestions.len(), 1);
        assert_eq!(run.suggestions[0].tier(), MatchTier::Hard);
        assert!(matches!(run.fuzzy, FuzzyOutcome::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_suggest_with_fuzzy_matches() {
        let r = demo_reconciler(Arc::new(FixedMatcher(vec![
            candidate("INV-2024-002", "TXN-1002", 92.0),
            candidate("INV-2024-003", "TXN-1003", 78.0),
            candidate("INV-2024-006", "TXN-1004", 40.0),
        ])))
        .await;

        let run = r.suggest_matches().await.unwrap();
        let ids: Vec<&str> = run.suggestions.iter().map(|s| s.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["TXN-1001", "TXN-1002", "TXN-1003"]);
    }

    #[tokio::test]
    async fn test_confirm_writes_ledger_and_audit() {
        let r = demo_reconciler(Arc::new(DisabledFuzzyMatcher)).await;

        let result = r.confirm_match("INV-2024-001", "TXN-1001").await;
        assert_eq!(result.outcome, ConfirmOutcome::Applied);
        let entry = result.audit_entry.unwrap();
        assert!(verify_entry(&entry));

        let snapshot = r.snapshot().await;
        let invoice = snapshot.invoices.iter().find(|i| i.id == "INV-2024-001").unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        let txn = snapshot.transactions.iter().find(|t| t.id == "TXN-1001").unwrap();
        assert_eq!(txn.matched_invoice_id.as_deref(), Some("INV-2024-001"));

        assert_eq!(r.audit_log().await, vec![entry]);

        // Settled pair is no longer suggested
        let run = r.suggest_matches().await.unwrap();
        assert!(run.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_confirmation_is_not_audited() {
        let r = demo_reconciler(Arc::new(DisabledFuzzyMatcher)).await;

        let result = r.confirm_match("INV-404", "TXN-1001").await;
        assert_eq!(result.outcome, ConfirmOutcome::UnknownInvoice);
        assert!(result.audit_entry.is_none());

        r.confirm_match("INV-2024-001", "TXN-1001").await;
        let again = r.confirm_match("INV-2024-001", "TXN-1001").await;
        assert_eq!(again.outcome, ConfirmOutcome::AlreadyReconciled);
        assert_eq!(r.audit_log().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_in_flight() {
        let gate = Arc::new(GatedMatcher {
            entered: Notify::new(),
            release: Notify::new(),
            candidates: Vec::new(),
        });
        let r = Arc::new(demo_reconciler(gate.clone()).await);

        let first = tokio::spawn({
            let r = r.clone();
            async move { r.suggest_matches().await }
        });
        gate.entered.notified().await;

        let second = r.suggest_matches().await;
        assert!(matches!(second, Err(ReconcileError::RunInProgress)));

        gate.release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stale_suggestions_are_dropped() {
        let gate = Arc::new(GatedMatcher {
            entered: Notify::new(),
            release: Notify::new(),
            candidates: vec![candidate("INV-2024-002", "TXN-1002", 90.0)],
        });
        let r = Arc::new(demo_reconciler(gate.clone()).await);

        let run = tokio::spawn({
            let r = r.clone();
            async move { r.suggest_matches().await }
        });
        gate.entered.notified().await;

        // Settled by hand while the collaborator is still working
        r.confirm_match("INV-2024-002", "TXN-1002").await;
        gate.release.notify_one();

        let run = run.await.unwrap().unwrap();
        let ids: Vec<&str> = run.suggestions.iter().map(|s| s.invoice_id.as_str()).collect();
        assert_eq!(ids, vec!["INV-2024-001"]);
    }

    #[tokio::test]
    async fn test_sync_erp_deduplicates() {
        let r = reconciler(Arc::new(DisabledFuzzyMatcher));
        let connector = SimulatedErpConnector::new(Duration::ZERO);

        let first = r.sync_erp(&connector, ErpProvider::Odoo).await.unwrap();
        assert_eq!((first.fetched, first.added), (2, 2));

        let second = r.sync_erp(&connector, ErpProvider::Odoo).await.unwrap();
        assert_eq!((second.fetched, second.added), (2, 0));
        assert_eq!(r.summary().await.invoice_count, 2);
    }

    #[tokio::test]
    async fn test_reset_keeps_audit_trail() {
        let r = demo_reconciler(Arc::new(DisabledFuzzyMatcher)).await;
        assert_eq!(r.anomalies().await.len(), 1);

        r.confirm_match("INV-2024-001", "TXN-1001").await;
        r.reset().await;

        let summary = r.summary().await;
        assert_eq!(summary.invoice_count, 0);
        assert_eq!(summary.transaction_count, 0);
        assert_eq!(r.audit_log().await.len(), 1);
        assert!(r.anomalies().await.is_empty());
    }

    #[tokio::test]
    async fn test_append_is_additive() {
        let r = reconciler(Arc::new(DisabledFuzzyMatcher));
        let data = fallback_dataset();

        assert_eq!(r.append_invoices(data.invoices.clone()).await, 6);
        assert_eq!(r.append_transactions(data.transactions[..2].to_vec()).await, 2);
        assert_eq!(r.append_transactions(data.transactions[2..].to_vec()).await, 4);

        let snapshot = r.snapshot().await;
        assert_eq!(snapshot.transactions, data.transactions);
        assert_eq!(snapshot.summary.unreconciled_count, 6);
    }
}
