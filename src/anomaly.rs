//! Duplicate-charge anomaly detection
//!
//! Flags unreconciled transactions that share an exact (date, amount) key.
//! No near-amount or cross-date fuzziness.

use crate::models::Transaction;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A set of unreconciled transactions sharing date and amount
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyGroup {
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Every member, in input order
    pub transactions: Vec<Transaction>,
}

/// Group unreconciled transactions by (date, amount) and keep groups with
/// more than one member. Groups come out in order of first occurrence.
pub fn detect_duplicates(transactions: &[Transaction]) -> Vec<AnomalyGroup> {
    let mut index: HashMap<(NaiveDate, Decimal), usize> = HashMap::new();
    let mut groups: Vec<AnomalyGroup> = Vec::new();

    for txn in transactions.iter().filter(|t| t.is_open()) {
        // Decimal hashes on the normalized value, so 150 and 150.00 share a key
        let key = (txn.date, txn.amount.normalize());

        match index.get(&key) {
            Some(&pos) => groups[pos].transactions.push(txn.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(AnomalyGroup {
                    date: txn.date,
                    amount: txn.amount,
                    transactions: vec![txn.clone()],
                });
            }
        }
    }

    groups.retain(|g| g.transactions.len() > 1);
    groups
}

/// Flattened view of every flagged transaction
pub fn flagged_transactions(groups: &[AnomalyGroup]) -> Vec<&Transaction> {
    groups.iter().flat_map(|g| g.transactions.iter()).collect()
}
