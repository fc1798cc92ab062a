//! REST API server for the reconciliation workspace
//!
//! Stands in for the browser UI: every user action is one endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::assistant::{
    AssistantContext, ChatAssistant, ChatMessage, ChatReply, ChatRole, ViewState, NAVIGATION_DELAY,
};
use crate::demo::DemoDataSource;
use crate::erp::{ErpConnector, ErpProvider};
use crate::error::ReconcileError;
use crate::extraction::{DocumentExtractor, RawDocument};
use crate::models::{Invoice, Transaction};
use crate::reconciler::Reconciler;
use crate::todo::ToDoPlanner;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub invoice_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ErpSyncRequest {
    pub provider: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub file_name: String,
    pub mime_type: String,
    /// Base64 payload, optionally as a data URL
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_view")]
    pub current_view: ViewState,
}

fn default_view() -> ViewState {
    ViewState::Dashboard
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(flatten)]
    pub reply: ChatReply,
    /// Present only alongside a navigation directive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_delay_ms: Option<u64>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn error_status(e: &ReconcileError) -> StatusCode {
    match e {
        ReconcileError::RunInProgress => StatusCode::CONFLICT,
        ReconcileError::InvalidInput(_) | ReconcileError::DecodeError(_) => StatusCode::BAD_REQUEST,
        e if e.is_collaborator_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: impl Into<String>) -> ApiResult {
    (status, Json(ApiResponse::error(message.into())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub reconciler: Arc<Reconciler>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub erp: Arc<dyn ErpConnector>,
    pub assistant: Arc<dyn ChatAssistant>,
    pub demo: Arc<DemoDataSource>,
    pub todo: Arc<ToDoPlanner>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Ledger Endpoints
/// =============================

async fn get_ledger(State(state): State<ApiState>) -> ApiResult {
    ok(state.reconciler.snapshot().await)
}

async fn add_invoices(
    State(state): State<ApiState>,
    Json(invoices): Json<Vec<Invoice>>,
) -> ApiResult {
    let added = state.reconciler.append_invoices(invoices).await;
    ok(serde_json::json!({ "added": added }))
}

async fn add_transactions(
    State(state): State<ApiState>,
    Json(transactions): Json<Vec<Transaction>>,
) -> ApiResult {
    let added = state.reconciler.append_transactions(transactions).await;
    ok(serde_json::json!({ "added": added }))
}

async fn load_demo(State(state): State<ApiState>) -> ApiResult {
    let dataset = state.demo.load().await;
    state
        .reconciler
        .load_dataset(dataset.invoices, dataset.transactions)
        .await;
    ok(state.reconciler.snapshot().await)
}

async fn reset(State(state): State<ApiState>) -> ApiResult {
    state.reconciler.reset().await;
    ok(state.reconciler.summary().await)
}

/// =============================
/// Reconciliation Endpoints
/// =============================

async fn reconcile(State(state): State<ApiState>) -> ApiResult {
    match state.reconciler.suggest_matches().await {
        Ok(run) => ok(run),
        Err(e) => fail(error_status(&e), e.to_string()),
    }
}

async fn confirm_match(
    State(state): State<ApiState>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult {
    info!(invoice_id = %req.invoice_id, transaction_id = %req.transaction_id, "Confirm request");
    ok(state
        .reconciler
        .confirm_match(&req.invoice_id, &req.transaction_id)
        .await)
}

async fn anomalies(State(state): State<ApiState>) -> ApiResult {
    ok(state.reconciler.anomalies().await)
}

async fn audit_log(State(state): State<ApiState>) -> ApiResult {
    ok(state.reconciler.audit_log().await)
}

/// =============================
/// Collaborator Endpoints
/// =============================

async fn erp_sync(State(state): State<ApiState>, Json(req): Json<ErpSyncRequest>) -> ApiResult {
    let provider: ErpProvider = match req.provider.parse() {
        Ok(provider) => provider,
        Err(e) => return fail(error_status(&e), e.to_string()),
    };

    match state.reconciler.sync_erp(state.erp.as_ref(), provider).await {
        Ok(report) => ok(report),
        Err(e) => fail(error_status(&e), format!("ERP sync failed: {}", e)),
    }
}

async fn extract_document(
    State(state): State<ApiState>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult {
    // Accept "data:application/pdf;base64,...." as well as the bare payload
    let payload = req
        .data
        .split_once(',')
        .map(|(_, b64)| b64)
        .unwrap_or(req.data.as_str());

    let bytes = match STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            let e = ReconcileError::from(e);
            return fail(error_status(&e), e.to_string());
        }
    };

    let document = RawDocument {
        file_name: req.file_name,
        mime_type: req.mime_type,
        bytes,
    };

    match state.extractor.extract(&document).await {
        Ok(Some(scanned)) => ok(scanned),
        Ok(None) => fail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Could not extract invoice data from {}", document.file_name),
        ),
        Err(e) => fail(error_status(&e), e.to_string()),
    }
}

async fn chat(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    let Some(last_user) = req.messages.iter().rposition(|m| m.role == ChatRole::User) else {
        return fail(StatusCode::BAD_REQUEST, "No user message found");
    };

    let message = &req.messages[last_user].text;
    let history = &req.messages[..last_user];

    let summary = state.reconciler.summary().await;
    let context = AssistantContext {
        invoice_count: summary.invoice_count,
        unpaid_count: summary.unpaid_count,
        unreconciled_count: summary.unreconciled_count,
        current_view: req.current_view,
    };

    let reply = state.assistant.respond(history, message, &context).await;
    let navigation_delay_ms = reply.navigate_to.map(|view| {
        info!(%view, "Assistant navigation directive");
        NAVIGATION_DELAY.as_millis() as u64
    });
    ok(ChatResponse {
        reply,
        navigation_delay_ms,
    })
}

async fn todo_list(State(state): State<ApiState>) -> ApiResult {
    let snapshot = state.reconciler.snapshot().await;
    let items = state
        .todo
        .plan(&snapshot.invoices, &snapshot.transactions)
        .await;
    if items.is_empty() {
        warn!("To-do planner returned no items");
    }
    ok(items)
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ledger", get(get_ledger))
        .route("/api/invoices", post(add_invoices))
        .route("/api/transactions", post(add_transactions))
        .route("/api/reconcile", post(reconcile))
        .route("/api/matches", post(confirm_match))
        .route("/api/anomalies", get(anomalies))
        .route("/api/audit", get(audit_log))
        .route("/api/erp/sync", post(erp_sync))
        .route("/api/documents/extract", post(extract_document))
        .route("/api/chat", post(chat))
        .route("/api/demo", post(load_demo))
        .route("/api/reset", post(reset))
        .route("/api/todo", get(todo_list))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState, port: u16) -> crate::Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
