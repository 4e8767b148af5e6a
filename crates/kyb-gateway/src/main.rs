//! KYB Gateway: entry point for the digital onboarding channel.
//! POST /kyb/check runs a KYB decision; GET /kyb/decisions/{n} reads the ledger.

mod onboarding;
mod routes;

use kyb_core::{
    DecisionStore, FixedScheduler, FixtureRegistry, HttpProviders, KybConfig, KybOrchestrator,
    LlmScheduler, PolicyAssembler, ProviderMode, ProviderSet, Scheduler, SchedulerMode,
};
use routes::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[kyb-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = KybConfig::load()?;
    let limits = cfg.limits();
    let client = reqwest::Client::builder()
        .user_agent(concat!("kyb-gateway/", env!("CARGO_PKG_VERSION")))
        .timeout(limits.provider_timeout.max(limits.scheduler_timeout))
        .build()?;

    let providers = match cfg.provider_mode {
        ProviderMode::Fixture => ProviderSet::from_single(Arc::new(FixtureRegistry::sample())),
        ProviderMode::Http => ProviderSet::from_single(Arc::new(HttpProviders::new(
            client.clone(),
            cfg.provider_base_url.as_str(),
        ))),
    };

    let scheduler: Arc<dyn Scheduler> = match (cfg.scheduler, cfg.llm_api_key.clone()) {
        (SchedulerMode::Llm, Some(key)) => Arc::new(
            LlmScheduler::new(client.clone(), key)
                .with_api_url(cfg.llm_api_url.as_str())
                .with_model(cfg.llm_model.as_str()),
        ),
        (SchedulerMode::Llm, None) => {
            tracing::warn!(
                target: "kyb::gateway",
                "scheduler = llm but OPENROUTER_API_KEY / KYB_LLM_API_KEY is not set; using the fixed scheduler"
            );
            Arc::new(FixedScheduler)
        }
        (SchedulerMode::Fixed, _) => Arc::new(FixedScheduler),
    };

    let store = Arc::new(DecisionStore::open(&cfg.store_path)?);
    let orchestrator = KybOrchestrator::new(providers, Arc::new(PolicyAssembler))
        .with_scheduler(scheduler)
        .with_limits(limits)
        .with_store(Arc::clone(&store));

    tracing::info!(
        target: "kyb::gateway",
        version = kyb_core::version(),
        provider_mode = ?cfg.provider_mode,
        scheduler = orchestrator.scheduler_name(),
        max_steps = cfg.max_steps,
        "KYB gateway configured"
    );

    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        store,
    });
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind_address()).await?;
    tracing::info!(target: "kyb::gateway", address = %cfg.bind_address(), "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
