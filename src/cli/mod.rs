use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Maximum number of assistant requests accepted per second across all clients.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "20")]
    pub rate_limit_per_second: u32,

    // --- Topic Table Args ---
    /// Optional path to a JSON topic table. The built-in table is used when unset.
    #[arg(long, env = "TOPICS_PATH")]
    pub topics_path: Option<String>,

    /// Number of most recent conversation turns kept from the request.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "10")]
    pub history_limit: usize,

    // --- Portfolio Backend Args ---
    /// Base URL of the portfolio backend API (e.g., http://localhost:5000/api/).
    /// Grounding context is skipped when unset.
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path of the project listing endpoint, relative to BACKEND_URL.
    #[arg(long, env = "PROJECTS_PATH", default_value = "projects")]
    pub projects_path: String,

    /// Path of the experience listing endpoint, relative to BACKEND_URL.
    #[arg(long, env = "EXPERIENCES_PATH", default_value = "experience")]
    pub experiences_path: String,

    /// Timeout in seconds for each backend read.
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value = "5")]
    pub backend_timeout_secs: u64,

    /// Maximum number of projects and of experience entries rendered into the AI prompt.
    #[arg(long, env = "MAX_GROUNDING_ITEMS", default_value = "12")]
    pub max_grounding_items: usize,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, gemini, ollama, none)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "none")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (e.g., OpenAI, Gemini)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, gemini-1.5-flash, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Timeout in seconds for a single completion call.
    #[arg(long, env = "AI_TIMEOUT_SECS", default_value = "20")]
    pub ai_timeout_secs: u64,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
