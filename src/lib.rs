pub mod assistant;
pub mod backend;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod server;

use assistant::Assistant;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Rate Limit (req/s): {}", args.rate_limit_per_second);
    info!("Topics Path: {}", args.topics_path.as_deref().unwrap_or("(built-in)"));
    info!("History Limit: {}", args.history_limit);
    info!("Backend URL: {}", args.backend_url.as_deref().unwrap_or("(disabled)"));
    if args.backend_url.is_some() {
        info!("Projects Path: {}", args.projects_path);
        info!("Experiences Path: {}", args.experiences_path);
        info!("Backend Timeout (s): {}", args.backend_timeout_secs);
    }
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat API Key Set: {}", !args.chat_api_key.is_empty());
    info!("AI Timeout (s): {}", args.ai_timeout_secs);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let assistant = Arc::new(Assistant::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, assistant, args);
    server.run().await?;

    Ok(())
}
