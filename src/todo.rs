//! Smart to-do list for the dashboard

use crate::anomaly::{detect_duplicates, flagged_transactions};
use crate::gemini::{strip_json_fence, GeminiClient, Part};
use crate::models::{Invoice, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskType {
    Reconciliation,
    Collection,
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToDoItem {
    pub id: String,
    pub task: String,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
}

impl ToDoItem {
    fn new(id: &str, task: &str, priority: TaskPriority, task_type: TaskType) -> Self {
        Self {
            id: id.to_string(),
            task: task.to_string(),
            priority,
            task_type,
        }
    }
}

/// Starter tasks shown when the model is not configured
pub fn default_todo_list() -> Vec<ToDoItem> {
    vec![
        ToDoItem::new("1", "Upload Invoices", TaskPriority::High, TaskType::Collection),
        ToDoItem::new("2", "Upload Bank Statements", TaskPriority::High, TaskType::Reconciliation),
        ToDoItem::new("3", "Check for Duplicate Transactions", TaskPriority::Medium, TaskType::Review),
    ]
}

pub struct ToDoPlanner {
    client: Arc<GeminiClient>,
}

impl ToDoPlanner {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    pub async fn plan(&self, invoices: &[Invoice], transactions: &[Transaction]) -> Vec<ToDoItem> {
        if !self.client.is_configured() {
            return default_todo_list();
        }

        let prompt = build_prompt(invoices, transactions);
        let schema = json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "STRING" },
                    "task": { "type": "STRING" },
                    "priority": { "type": "STRING", "enum": ["High", "Medium", "Low"] },
                    "type": { "type": "STRING", "enum": ["Reconciliation", "Collection", "Review"] }
                },
                "required": ["id", "task", "priority", "type"]
            }
        });

        match self.client.generate_json(vec![Part::text(prompt)], schema).await {
            Ok(raw) => match serde_json::from_str::<Vec<ToDoItem>>(strip_json_fence(&raw)) {
                Ok(items) => items,
                Err(e) => {
                    warn!("To-do response unusable: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                error!("Failed to generate to-do list: {}", e);
                Vec::new()
            }
        }
    }
}

/// Ledger summary the model plans from
pub fn build_prompt(invoices: &[Invoice], transactions: &[Transaction]) -> String {
    let unpaid = invoices.iter().filter(|i| i.is_open()).count();
    let open: Vec<Transaction> = transactions.iter().filter(|t| t.is_open()).cloned().collect();

    let groups = detect_duplicates(&open);
    let anomalies: Vec<&str> = flagged_transactions(&groups)
        .into_iter()
        .map(|t| t.description.as_str())
        .collect();
    let anomaly_text = if anomalies.is_empty() {
        "None".to_string()
    } else {
        anomalies.join(", ")
    };

    format!(
        r#"You are an intelligent financial assistant. Analyze the current state of the ledger and create a prioritized "To Do" list for the user.

Current State:
- Unpaid Invoices: {}
- Unreconciled Transactions: {}
- Potential Anomalies (Duplicate amounts on same day): {}

Instructions:
- Create 3-5 concise, actionable tasks.
- If there are anomalies, prioritize investigating them.
- If there are many unpaid invoices, suggest following up (Collection).
- If there are many unreconciled transactions, suggest reconciling (Reconciliation).

Return a JSON array of objects with:
- id (string)
- task (short string)
- priority (High, Medium, Low)
- type (Reconciliation, Collection, Review)"#,
        unpaid,
        open.len(),
        anomaly_text
    )
}
