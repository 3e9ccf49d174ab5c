use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the storefront.
///
/// The configuration is loaded from environment variables (optionally via a
/// `.env` file) with defaults suited to local development. Fields cover the
/// database, the HTTP server, the session cart store, and the outbound
/// assistant (text-generation) endpoint. This struct is deserializable via
/// Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name.
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    // --- Session cart store ---
    /// Idle time after which an untouched session cart may be evicted.
    #[serde(deserialize_with = "deserialize_duration")]
    pub session_ttl: Duration,

    // --- Assistant (outbound text-generation service) ---
    /// Chat-completions endpoint URL of the generation service.
    pub assistant_api_url: String,
    /// API key for the generation service. Empty means unconfigured; the
    /// assistant then answers with a fixed configuration-missing reply.
    pub assistant_api_key: String,
    /// Model name sent with each generation request.
    pub assistant_model: String,
    /// Total timeout for one generation call (human-friendly format).
    #[serde(deserialize_with = "deserialize_duration")]
    pub assistant_timeout: Duration,
}

/// Custom deserializer for human-readable durations like "5s", "1m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from a
    /// `.env` file). Fields not set via env fall back to local-dev defaults.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing
    /// required values.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "shop_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "shop_db")?
            // HTTP
            .set_default("http_port", 8080)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Session store
            .set_default("session_ttl", "24h")?
            // Assistant
            .set_default(
                "assistant_api_url",
                "https://api.openai.com/v1/chat/completions",
            )?
            .set_default("assistant_api_key", "")?
            .set_default("assistant_model", "gpt-4o-mini")?
            .set_default("assistant_timeout", "25s")?
            .add_source(config::Environment::default().separator("_"))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }
}
