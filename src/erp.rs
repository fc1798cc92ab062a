//! ERP invoice sync
//!
//! The connector returns whatever the ERP holds; de-duplication against the
//! ledger is the caller's job.

use crate::error::ReconcileError;
use crate::models::{Invoice, InvoiceStatus};
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ErpProvider {
    Odoo,
    Netsuite,
    Sap,
    Xero,
}

impl FromStr for ErpProvider {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "odoo" => Ok(ErpProvider::Odoo),
            "netsuite" => Ok(ErpProvider::Netsuite),
            "sap" => Ok(ErpProvider::Sap),
            "xero" => Ok(ErpProvider::Xero),
            other => Err(ReconcileError::InvalidInput(format!(
                "Unknown ERP provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ErpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErpProvider::Odoo => "ODOO",
            ErpProvider::Netsuite => "NETSUITE",
            ErpProvider::Sap => "SAP",
            ErpProvider::Xero => "XERO",
        };
        write!(f, "{}", s)
    }
}

/// ERP-sync collaborator
#[async_trait]
pub trait ErpConnector: Send + Sync {
    async fn fetch_invoices(&self, provider: ErpProvider) -> Result<Vec<Invoice>>;
}

/// Stand-in for the per-ERP backend adapters
pub struct SimulatedErpConnector {
    latency: Duration,
}

impl SimulatedErpConnector {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedErpConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[async_trait]
impl ErpConnector for SimulatedErpConnector {
    async fn fetch_invoices(&self, provider: ErpProvider) -> Result<Vec<Invoice>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let invoices = simulated_dataset(provider);
        info!(%provider, fetched = invoices.len(), "Fetched invoices from ERP");
        Ok(invoices)
    }
}

/// Drop fetched invoices whose id already exists in the ledger (or earlier in the batch)
pub fn new_invoices_only(existing: &[Invoice], fetched: Vec<Invoice>) -> Vec<Invoice> {
    let mut seen: HashSet<String> = existing.iter().map(|i| i.id.clone()).collect();
    fetched
        .into_iter()
        .filter(|inv| seen.insert(inv.id.clone()))
        .collect()
}

fn erp_invoice(id: &str, customer: &str, cents: i64, due: (i32, u32, u32), desc: &str) -> Invoice {
    Invoice {
        id: id.to_string(),
        customer_name: customer.to_string(),
        amount: Decimal::new(cents, 2),
        due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap_or(NaiveDate::MIN),
        status: InvoiceStatus::Unpaid,
        description: Some(desc.to_string()),
    }
}

fn simulated_dataset(provider: ErpProvider) -> Vec<Invoice> {
    match provider {
        ErpProvider::Odoo => vec![
            erp_invoice("ODOO-2024-8821", "MegaCorp Industries", 1_250_000, (2024, 11, 1), "Consulting Services Q4"),
            erp_invoice("ODOO-2024-8822", "StartUp Dynamics", 420_050, (2024, 11, 5), "Software License Renewal"),
        ],
        ErpProvider::Netsuite => vec![
            erp_invoice("NET-99201", "Oracle Systems Inc", 2_500_000, (2024, 10, 30), "Cloud Infrastructure Q3"),
            erp_invoice("NET-99202", "BlueSky Ventures", 315_000, (2024, 11, 10), "Venture Consulting"),
        ],
        ErpProvider::Sap => vec![
            erp_invoice("SAP-1000293", "Global Manufacturing GmbH", 15_420_000, (2024, 11, 15), "Bulk Machinery Order"),
        ],
        ErpProvider::Xero => vec![
            erp_invoice("XERO-INV-001", "Local Coffee Roasters", 45_000, (2024, 10, 28), "Monthly Bean Supply"),
            erp_invoice("XERO-INV-002", "Design Studio 4", 120_000, (2024, 10, 29), "Website Redesign Deposit"),
        ],
    }
}
