use ledger_reconciler::{
    api::{start_server, ApiState},
    assistant::GeminiChatAssistant,
    audit::AuditRecorder,
    config::AppConfig,
    demo::DemoDataSource,
    erp::SimulatedErpConnector,
    extraction::GeminiDocumentExtractor,
    gemini::GeminiClient,
    matcher::{
        DisabledFuzzyMatcher, FuzzyMatcher, GeminiFuzzyMatcher, MatchCoordinator, MatchPolicy,
    },
    reconciler::Reconciler,
    todo::ToDoPlanner,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Ledger Reconciler - API Server");
    info!("Port: {}", config.api_port);

    let client = Arc::new(GeminiClient::with_base_url(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    )?);

    let fuzzy: Arc<dyn FuzzyMatcher> = if client.is_configured() {
        info!(model = %client.model(), "Semantic matching enabled");
        Arc::new(GeminiFuzzyMatcher::new(client.clone()))
    } else {
        warn!("GEMINI_API_KEY not set: hard matching only, demo fallbacks enabled");
        Arc::new(DisabledFuzzyMatcher)
    };

    let policy = MatchPolicy {
        max_fuzzy_items: config.fuzzy_max_items,
        ..MatchPolicy::default()
    };
    let reconciler = Arc::new(Reconciler::new(
        MatchCoordinator::with_policy(fuzzy, policy),
        AuditRecorder::new(config.acting_user.clone()),
    ));

    let state = ApiState {
        reconciler,
        extractor: Arc::new(GeminiDocumentExtractor::new(client.clone())),
        erp: Arc::new(SimulatedErpConnector::new(config.erp_latency)),
        assistant: Arc::new(GeminiChatAssistant::new(client.clone())),
        demo: Arc::new(DemoDataSource::new(client.clone())),
        todo: Arc::new(ToDoPlanner::new(client)),
    };

    info!("Reconciler initialized");
    info!("Starting API server...");

    start_server(state, config.api_port).await?;

    Ok(())
}
