use agent_dialogue_orchestrator::{
    config::AppConfig,
    generation::{GeminiGenerator, Generator, ScriptedGenerator},
    orchestrator::ConversationOrchestrator,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SEED: &str = "What is the most surprising thing about the deep ocean?";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Seed prompt from the command line, or a default topic
    let args: Vec<String> = std::env::args().skip(1).collect();
    let seed = if args.is_empty() {
        DEFAULT_SEED.to_string()
    } else {
        args.join(" ")
    };

    let generator: Arc<dyn Generator> = if config.has_api_key() {
        Arc::new(GeminiGenerator::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        )?)
    } else {
        warn!("GEMINI_API_KEY not set; using scripted replies");
        Arc::new(ScriptedGenerator::new([
            "That's a fascinating question! I've always wondered about it myself.",
            "Let me break that down: the short answer is pressure, darkness and cold.",
            "Wow, so life adapts to almost anything? What else should I know?",
        ]))
    };

    let orchestrator =
        ConversationOrchestrator::with_agents(config.conversation.clone(), config.build_agents(generator));

    let mut turns = orchestrator.start(seed.clone()).await?;
    info!(conversation_id = %turns.conversation_id(), "Dialogue started");

    println!("\n=== DIALOGUE ===");
    println!("Seed: {}\n", seed);

    // Ctrl-C stops after the current turn
    let stopper = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    while let Some(turn) = turns.next().await {
        println!("{}: {}\n", turn.agent_name, turn.message);
    }

    println!("=== TRANSCRIPT ===");
    println!("{}", orchestrator.export().await);

    if let Some(reason) = orchestrator.stop_reason().await {
        info!(?reason, "Dialogue finished");
    }

    Ok(())
}
