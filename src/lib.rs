//! Ledger Reconciler
//!
//! Reconciles customer invoices against bank transactions:
//! - Deterministic hard matching on amount and invoice identifier
//! - Semantic (fuzzy) matching of the leftovers via a generative model
//! - Duplicate-charge anomaly detection
//! - Human confirmation with an append-only, digest-checked audit trail
//!
//! FLOW:
//! INGEST → HARD MATCH → FUZZY MATCH → CONFIRM → AUDIT

pub mod anomaly;
pub mod api;
pub mod assistant;
pub mod audit;
pub mod config;
pub mod demo;
pub mod erp;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod reconciler;
pub mod todo;

pub use error::Result;

// Re-export common types
pub use ledger::{ConfirmOutcome, LedgerStore, LedgerSummary};
pub use models::*;
pub use reconciler::Reconciler;
