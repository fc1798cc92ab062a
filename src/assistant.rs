//! Conversational assistant ("Ledger Larry")
//!
//! Answers free-text questions about the ledger and may hand back one
//! navigation directive for the host application to act on.

use crate::gemini::{Content, FunctionCall, FunctionDeclaration, GeminiClient, GenerateRequest, Part, Tool};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How long the host should wait before acting on a navigation directive
pub const NAVIGATION_DELAY: Duration = Duration::from_millis(800);

pub const GREETING: &str = "Hi! I'm Ledger Larry. I can help you reconcile transactions or navigate the app. Try saying 'Take me to reconciliation'.";
const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble connecting to the ledger mainframe right now.";
const TOOL_ACK: &str = "Sure, I'm taking care of that for you.";
const NO_ANSWER: &str = "I'm not sure how to help with that.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    Dashboard,
    Upload,
    Reconciliation,
    Settings,
}

impl FromStr for ViewState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dashboard" => Ok(ViewState::Dashboard),
            "upload" => Ok(ViewState::Upload),
            "reconciliation" => Ok(ViewState::Reconciliation),
            "settings" => Ok(ViewState::Settings),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewState::Dashboard => "dashboard",
            ViewState::Upload => "upload",
            ViewState::Reconciliation => "reconciliation",
            ViewState::Settings => "settings",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Snapshot of app state given to the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantContext {
    pub invoice_count: usize,
    pub unpaid_count: usize,
    pub unreconciled_count: usize,
    pub current_view: ViewState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigate_to: Option<ViewState>,
}

impl ChatReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            navigate_to: None,
        }
    }
}

/// Conversational collaborator. Never fails: errors become an apology.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    async fn respond(
        &self,
        history: &[ChatMessage],
        message: &str,
        context: &AssistantContext,
    ) -> ChatReply;
}

pub struct GeminiChatAssistant {
    client: Arc<GeminiClient>,
}

impl GeminiChatAssistant {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    fn system_instruction(context: &AssistantContext) -> String {
        format!(
            r#"You are "Ledger Larry", the intelligent assistant for the LedgerLoop application.

App Context:
- Current View: {}
- Invoices: {}
- Unpaid Invoices: {}
- Unreconciled Transactions: {}

Capabilities (Tools):
You have access to the following tools to control the application.
PROACTIVELY use them if the user asks to go somewhere or do something.

1. navigate_to(view_name)
   - Valid values for view_name: 'dashboard', 'upload', 'reconciliation', 'settings'
   - Use this when user says "go to upload", "I want to reconcile", etc.

2. inspect_anomaly()
   - Use this if user asks to see problems or anomalies. It navigates to dashboard.

Tone: Helpful, professional, slightly witty (junior accountant persona).
If you don't need a tool, just reply with text."#,
            context.current_view,
            context.invoice_count,
            context.unpaid_count,
            context.unreconciled_count,
        )
    }

    fn tools() -> Vec<Tool> {
        vec![Tool {
            function_declarations: vec![
                FunctionDeclaration {
                    name: "navigate_to".to_string(),
                    description: "Navigates the application to a specific page.".to_string(),
                    parameters: Some(json!({
                        "type": "OBJECT",
                        "properties": {
                            "view_name": {
                                "type": "STRING",
                                "enum": ["dashboard", "upload", "reconciliation", "settings"],
                                "description": "The page to navigate to."
                            }
                        },
                        "required": ["view_name"]
                    })),
                },
                FunctionDeclaration {
                    name: "inspect_anomaly".to_string(),
                    description: "Shows detected anomalies on the dashboard.".to_string(),
                    parameters: None,
                },
            ],
        }]
    }

    fn build_request(
        history: &[ChatMessage],
        message: &str,
        context: &AssistantContext,
    ) -> GenerateRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|m| m.role != ChatRole::System && !m.text.trim().is_empty())
            .map(|m| match m.role {
                ChatRole::Model => Content::model(vec![Part::text(m.text.clone())]),
                _ => Content::user(vec![Part::text(m.text.clone())]),
            })
            .collect();
        contents.push(Content::user(vec![Part::text(message)]));

        GenerateRequest {
            contents,
            generation_config: None,
            system_instruction: Some(Content::system(Self::system_instruction(context))),
            tools: Some(Self::tools()),
        }
    }
}

#[async_trait]
impl ChatAssistant for GeminiChatAssistant {
    async fn respond(
        &self,
        history: &[ChatMessage],
        message: &str,
        context: &AssistantContext,
    ) -> ChatReply {
        let request = Self::build_request(history, message, context);

        let response = match self.client.generate(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Chat collaborator failed: {}", e);
                return ChatReply::text(FALLBACK_REPLY);
            }
        };

        if let Some(call) = response.first_function_call() {
            info!(tool = %call.name, "Assistant requested a tool call");
            return reply_for_tool_call(call);
        }

        ChatReply::text(response.first_text().unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}

/// Map a function call onto the fixed set of navigation directives
pub fn reply_for_tool_call(call: &FunctionCall) -> ChatReply {
    let target = match call.name.as_str() {
        "navigate_to" => call
            .args
            .get("view_name")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse::<ViewState>().ok()),
        "inspect_anomaly" => Some(ViewState::Dashboard),
        _ => None,
    };

    match target {
        Some(view) => ChatReply {
            text: format!("Navigating you to {}...", view),
            navigate_to: Some(view),
        },
        None => {
            warn!(tool = %call.name, "Ignoring unsupported tool call");
            ChatReply::text(TOOL_ACK)
        }
    }
}
