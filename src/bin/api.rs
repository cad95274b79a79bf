use agent_dialogue_orchestrator::{
    api::start_server,
    config::AppConfig,
    generation::GeminiGenerator,
    orchestrator::ConversationOrchestrator,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if !config.has_api_key() {
        warn!("GEMINI_API_KEY not set; every turn will report a generation error");
        warn!("See .env.example for setup instructions");
    }

    info!("Agent Dialogue Orchestrator - API Server");
    info!(
        port = config.port,
        model = %config.gemini_model,
        max_turns = config.conversation.max_turns,
        "Configuration loaded"
    );

    // Create components
    let generator = Arc::new(GeminiGenerator::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?);
    let agents = config.build_agents(generator);

    let orchestrator = ConversationOrchestrator::with_agents(config.conversation.clone(), agents);

    info!("Orchestrator initialized");

    // Start API server
    start_server(orchestrator, config.port, config.frontend_url.as_deref()).await?;

    Ok(())
}
