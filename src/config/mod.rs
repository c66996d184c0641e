/// Configuration management for the Flowforge engine
///
/// Handles server configuration, database location, provider endpoints and
/// sandbox limits. Every value can be overridden through environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// External provider endpoints and fallback credentials
    pub providers: ProvidersConfig,
    /// Limits applied to sandboxed code steps
    pub sandbox: SandboxConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file holding workflows, executions and credentials
    pub path: String,
    /// Base directory for relative spreadsheet paths
    pub files_dir: String,
}

/// Provider endpoints used by the step handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// OpenAI-compatible chat completions base URL (Groq)
    pub groq_base_url: String,
    /// System-wide AI key used when the invoking user has none stored
    pub groq_fallback_api_key: Option<String>,
    /// Twilio REST API base URL
    pub twilio_base_url: String,
    /// SMTP relay host for email steps
    pub smtp_relay: String,
}

/// Sandbox limits for code steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock budget for one code step
    pub time_budget_ms: u64,
    /// Lua allocator ceiling
    pub memory_limit_bytes: usize,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("FLOWFORGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("FLOWFORGE_PORT", 3004),
            },
            database: DatabaseConfig {
                path: std::env::var("FLOWFORGE_DATABASE")
                    .unwrap_or_else(|_| "data/flowforge.db".to_string()),
                files_dir: std::env::var("FLOWFORGE_FILES_DIR")
                    .unwrap_or_else(|_| "data/files".to_string()),
            },
            providers: ProvidersConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            groq_base_url: std::env::var("FLOWFORGE_GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            groq_fallback_api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            twilio_base_url: std::env::var("FLOWFORGE_TWILIO_BASE_URL")
                .unwrap_or_else(|_| "https://api.twilio.com/2010-04-01".to_string()),
            smtp_relay: std::env::var("FLOWFORGE_SMTP_RELAY")
                .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: env_parse("FLOWFORGE_SANDBOX_TIME_MS", 2_000),
            memory_limit_bytes: env_parse("FLOWFORGE_SANDBOX_MEMORY_BYTES", 32 * 1024 * 1024),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
