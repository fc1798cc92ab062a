//! Audit trail for confirmed matches
//!
//! Append-only, newest first. Entries are never mutated or removed; each one
//! carries a digest so an exported copy can be checked.

use crate::models::{AuditAction, AuditLogEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::io::Write;
use tracing::{error, info};
use uuid::Uuid;

/// Actor label used until a real identity/session layer supplies one
pub const DEFAULT_ACTOR: &str = "Current User";

pub struct AuditRecorder {
    entries: VecDeque<AuditLogEntry>,
    actor: String,
}

impl AuditRecorder {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            entries: VecDeque::new(),
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Record a user-confirmed match
    pub fn record_match(&mut self, invoice_id: &str, transaction_id: &str) -> AuditLogEntry {
        let details = format!(
            "Reconciled Invoice {} against Transaction {}",
            invoice_id, transaction_id
        );
        self.append(AuditAction::Match, details)
    }

    fn append(&mut self, action: AuditAction, details: String) -> AuditLogEntry {
        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let digest = compute_entry_digest(id, timestamp, action, &details, &self.actor);

        let entry = AuditLogEntry {
            id,
            timestamp,
            action,
            details,
            user: self.actor.clone(),
            digest,
        };

        info!(audit_id = %entry.id, action = %entry.action, "{}", entry.details);
        self.entries.push_front(entry.clone());
        entry
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &AuditLogEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&AuditLogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_ACTOR)
    }
}

#[derive(Serialize)]
struct DigestInput<'a> {
    id: Uuid,
    timestamp: DateTime<Utc>,
    action: AuditAction,
    details: &'a str,
    user: &'a str,
}

/// SHA-256 over the entry content, streamed straight into the hasher
pub fn compute_entry_digest(
    id: Uuid,
    timestamp: DateTime<Utc>,
    action: AuditAction,
    details: &str,
    user: &str,
) -> String {
    let input = DigestInput {
        id,
        timestamp,
        action,
        details,
        user,
    };

    let mut hasher = Sha256::new();
    if let Err(e) = serde_json::to_writer(&mut HashWriter(&mut hasher), &input) {
        // An empty digest never verifies
        error!(audit_id = %id, error = %e, "Failed to compute audit digest");
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Check an entry (e.g. one read back from an export) against its digest
pub fn verify_entry(entry: &AuditLogEntry) -> bool {
    let expected = compute_entry_digest(
        entry.id,
        entry.timestamp,
        entry.action,
        &entry.details,
        &entry.user,
    );
    !expected.is_empty() && expected == entry.digest
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_newest_first() {
        let mut recorder = AuditRecorder::default();
        recorder.record_match("INV-1", "T1");
        recorder.record_match("INV-2", "T2");

        let details: Vec<&str> = recorder.entries().map(|e| e.details.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "Reconciled Invoice INV-2 against Transaction T2",
                "Reconciled Invoice INV-1 against Transaction T1",
            ]
        );
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_entry_fields() {
        let mut recorder = AuditRecorder::new("ops@example.com");
        let entry = recorder.record_match("INV-1", "T1");

        assert_eq!(entry.action, AuditAction::Match);
        assert_eq!(entry.user, "ops@example.com");
        assert_eq!(recorder.actor(), entry.user);
        assert_eq!(AuditRecorder::default().actor(), DEFAULT_ACTOR);
        assert_eq!(recorder.get(entry.id), Some(&entry));
        assert!(verify_entry(&entry));
    }

    #[test]
    fn test_tampered_entry_fails_verification() {
        let mut recorder = AuditRecorder::default();
        let mut entry = recorder.record_match("INV-1", "T1");

        // Round-trip through JSON like an export would
        let json = serde_json::to_string(&entry).unwrap();
        let restored: AuditLogEntry = serde_json::from_str(&json).unwrap();
        assert!(verify_entry(&restored));

        entry.details = "Reconciled Invoice INV-9 against Transaction T1".into();
        assert!(!verify_entry(&entry));
    }

    #[test]
    fn test_entry_without_digest_never_verifies() {
        let mut recorder = AuditRecorder::default();
        let mut entry = recorder.record_match("INV-1", "T1");
        assert_eq!(entry.digest.len(), 64);

        entry.digest = String::new();
        assert!(!verify_entry(&entry));
    }
}
