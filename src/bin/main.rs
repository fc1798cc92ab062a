use ledger_reconciler::{
    audit::AuditRecorder,
    config::AppConfig,
    demo::DemoDataSource,
    gemini::GeminiClient,
    matcher::{DisabledFuzzyMatcher, FuzzyMatcher, GeminiFuzzyMatcher, MatchCoordinator, MatchPolicy},
    models::MatchTier,
    reconciler::Reconciler,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Ledger Reconciler starting");

    let client = Arc::new(GeminiClient::with_base_url(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    )?);
    let fuzzy: Arc<dyn FuzzyMatcher> = if client.is_configured() {
        Arc::new(GeminiFuzzyMatcher::new(client.clone()))
    } else {
        Arc::new(DisabledFuzzyMatcher)
    };

    let policy = MatchPolicy {
        max_fuzzy_items: config.fuzzy_max_items,
        ..MatchPolicy::default()
    };
    let reconciler = Reconciler::new(
        MatchCoordinator::with_policy(fuzzy, policy),
        AuditRecorder::new(config.acting_user.clone()),
    );

    let dataset = DemoDataSource::new(client).load().await;
    reconciler
        .load_dataset(dataset.invoices, dataset.transactions)
        .await;

    let run = reconciler.suggest_matches().await?;

    println!("\n=== MATCH SUGGESTIONS ===");
    for s in &run.suggestions {
        println!(
            "  [{:?}] {} <-> {} ({:.0}%): {}",
            s.tier(),
            s.invoice_id,
            s.transaction_id,
            s.confidence,
            s.reasoning
        );
    }
    println!("Semantic tier: {:?}", run.fuzzy);

    println!("\n=== ANOMALIES ===");
    for group in reconciler.anomalies().await {
        let ids: Vec<&str> = group.transactions.iter().map(|t| t.id.as_str()).collect();
        println!("  {} / {}: {}", group.date, group.amount, ids.join(", "));
    }

    // Hard matches are deterministic; confirm them straight away
    for s in run.suggestions.iter().filter(|s| s.tier() == MatchTier::Hard) {
        let result = reconciler.confirm_match(&s.invoice_id, &s.transaction_id).await;
        info!(invoice_id = %s.invoice_id, outcome = ?result.outcome, "Confirmed hard match");
    }

    let summary = reconciler.summary().await;
    println!("\n=== SUMMARY ===");
    println!("  Cash position:           {}", summary.cash_position);
    println!("  Outstanding receivables: {}", summary.outstanding_receivables);
    println!("  Reconciliation health:   {}%", summary.reconciliation_health);

    println!("\n=== AUDIT TRAIL ===");
    for entry in reconciler.audit_log().await {
        println!("  {} {} {} by {}", entry.timestamp, entry.action, entry.details, entry.user);
    }

    Ok(())
}
