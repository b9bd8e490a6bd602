// Server and CLI configuration
//
// Every option can come from a flag or an environment variable; `.env`
// files are loaded by the binary before parsing.

use crate::generation::{GenerationConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::jira::{DEFAULT_MAX_RESULTS, DEFAULT_STORIES_JQL};
use clap::Args;
use std::time::Duration;

/// Secret used when SESSION_SECRET is not set
pub const DEV_SESSION_SECRET: &str = "dev-secret";

/// Vite dev server ports that are always allowed
const DEV_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:5175",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:5174",
    "http://127.0.0.1:5175",
];

/// Server options, given as top-level flags
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to bind the server to
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Address to bind the server to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Frontend origin allowed to call the API with credentials
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Secret used to sign session cookies
    #[arg(long, env = "SESSION_SECRET", default_value = DEV_SESSION_SECRET, hide_env_values = true)]
    pub session_secret: String,

    /// Idle minutes before a session and its Jira credentials are dropped
    #[arg(long, env = "SESSION_TTL_MINUTES", default_value = "480")]
    pub session_ttl_minutes: u64,

    /// Mark the session cookie Secure (only behind HTTPS)
    #[arg(long, env = "COOKIE_SECURE")]
    pub cookie_secure: bool,

    /// JQL used to list stories
    #[arg(long, env = "JIRA_STORIES_JQL", default_value = DEFAULT_STORIES_JQL)]
    pub jira_jql: String,

    /// Maximum number of stories returned by the list endpoint
    #[arg(long, env = "JIRA_MAX_RESULTS", default_value_t = DEFAULT_MAX_RESULTS)]
    pub jira_max_results: u32,

    /// Timeout for Jira requests, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    /// Base URL of the OpenAI-compatible generation API
    #[arg(long, env = "GENERATION_API_BASE", default_value = DEFAULT_API_BASE)]
    pub generation_api_base: String,

    /// API key for the generation API (generation is disabled without it)
    #[arg(long, env = "GENERATION_API_KEY", hide_env_values = true)]
    pub generation_api_key: Option<String>,

    /// Model used for test case generation
    #[arg(long, env = "GENERATION_MODEL", default_value = DEFAULT_MODEL)]
    pub generation_model: String,

    /// Timeout for generation requests, in seconds
    #[arg(long, env = "GENERATION_TIMEOUT_SECS", default_value = "120")]
    pub generation_timeout_secs: u64,

    /// Do not expose the /api/jira/_store session dump
    #[arg(long, env = "DISABLE_DEBUG_ROUTES")]
    pub disable_debug_routes: bool,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            cors_origin: self.cors_origin,
            session_secret: self.session_secret,
            session_ttl: Duration::from_secs(self.session_ttl_minutes.max(1) * 60),
            cookie_secure: self.cookie_secure,
            jira_jql: self.jira_jql,
            jira_max_results: self.jira_max_results,
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs.max(1)),
            generation: GenerationConfig {
                api_base: self.generation_api_base,
                api_key: self.generation_api_key.filter(|k| !k.trim().is_empty()),
                model: self.generation_model,
                timeout: Duration::from_secs(self.generation_timeout_secs.max(1)),
            },
            debug_routes: !self.disable_debug_routes,
        }
    }
}

/// Options for `story-tests testdata`
#[derive(Args, Debug, Clone)]
pub struct TestdataArgs {
    /// Mockaroo API key
    #[arg(long, env = "MOCKAROO_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Number of rows to generate
    #[arg(long, default_value_t = crate::testdata::DEFAULT_ROW_COUNT)]
    pub count: u32,

    /// Write rows to this file instead of stdout
    #[arg(long)]
    pub output: Option<std::path::PathBuf>,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub jira_jql: String,
    pub jira_max_results: u32,
    pub upstream_timeout: Duration,
    pub generation: GenerationConfig,
    pub debug_routes: bool,
}

impl ServerConfig {
    /// Configured origin plus the local dev server origins, without duplicates
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::with_capacity(DEV_ORIGINS.len() + 1);
        let configured = self.cors_origin.trim().trim_end_matches('/');
        if !configured.is_empty() {
            origins.push(configured.to_string());
        }
        for origin in DEV_ORIGINS {
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origin: "http://localhost:5173".to_string(),
            session_secret: DEV_SESSION_SECRET.to_string(),
            session_ttl: Duration::from_secs(480 * 60),
            cookie_secure: false,
            jira_jql: DEFAULT_STORIES_JQL.to_string(),
            jira_max_results: DEFAULT_MAX_RESULTS,
            upstream_timeout: Duration::from_secs(30),
            generation: GenerationConfig::default(),
            debug_routes: true,
        }
    }
}
