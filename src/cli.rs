//! Command-line interface for chatroute
//!
//! Provides argument parsing and subcommand handling for the chatroute binary.

use clap::{Parser, Subcommand};

/// Chat backend with multi-provider model selection and failover
#[derive(Parser)]
#[command(name = "chatroute")]
#[command(version)]
#[command(about = "Chat backend with multi-provider model selection and failover")]
#[command(
    long_about = "chatroute serves a chat API and routes each turn to a catalog of hosted \
    models, failing over between providers on timeouts, rate limits and errors."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# chatroute Configuration
# ========================
#
# Every section is optional. Credentials are best supplied through the
# environment instead of this file:
#
#   GITHUB_TOKEN or AI_API_KEY   upstream.token
#   AI_API_URL                   upstream.endpoint
#   BYTEZ_KEY                    bytez.api_key
#   AI_SYSTEM_PROMPT             chat.system_prompt
#   RUST_LOG                     overrides observability.log_level

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"
port = 3001

# ─────────────────────────────────────────────────────────────────────────────
# PROVIDERS
# ─────────────────────────────────────────────────────────────────────────────

[upstream]
# OpenAI-compatible inference endpoint; "/chat/completions" is appended
endpoint = "https://models.github.ai/inference"
# token = "ghp_..."

[bytez]
base_url = "https://api.bytez.com/models/v2"
# api_key = "..."

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING
# ─────────────────────────────────────────────────────────────────────────────

[routing]
# Deadline for a single model attempt in milliseconds (1..=120000).
# Worst-case latency for auto mode is roughly this times the catalog size.
model_timeout_ms = 8000

# ─────────────────────────────────────────────────────────────────────────────
# MODEL CATALOG
# ─────────────────────────────────────────────────────────────────────────────
#
# Auto mode tries models in ascending priority, starting with whichever one
# answered the previous auto request. Omit all [[models]] entries to use
# the built-in catalog shown here.
#
# Fields:
#   - id: value clients send as "model" ("auto" is reserved)
#   - display_name: reported back as modelUsed
#   - priority: lower is tried first
#   - provider: "inference" or "bytez"
#   - upstream_model: model name sent to the provider (defaults to id)

[[models]]
id = "gpt-4.1"
display_name = "GPT-4.1"
priority = 1
provider = "inference"
upstream_model = "openai/gpt-4.1"

[[models]]
id = "gpt-4.1-bytez"
display_name = "GPT-4.1 BYTEZ"
priority = 2
provider = "bytez"
upstream_model = "openai/gpt-4.1"

[[models]]
id = "gpt-4.1-mini"
display_name = "GPT-4.1 MINI"
priority = 3
provider = "inference"
upstream_model = "openai/gpt-4.1-mini"

# ─────────────────────────────────────────────────────────────────────────────
# CHAT
# ─────────────────────────────────────────────────────────────────────────────

[chat]
system_prompt = "You are a helpful assistant. Answer clearly and concisely."

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
