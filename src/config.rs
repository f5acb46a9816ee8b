//! Application configuration management.
//!
//! Configuration is read from environment variables with the `envy` crate, after
//! an optional `.env` file has been loaded by `dotenvy`.

use chrono::Duration;
use serde::Deserialize;

/// How long a pending verification token stays redeemable.
pub const VERIFICATION_TTL_SECS: u64 = 30 * 60;

/// Lifetime of an hour-bucketed usage counter after its last write.
pub const USAGE_COUNTER_TTL_SECS: u64 = 60 * 60;

/// Lifetime of a cached email scoring result.
pub const EMAIL_RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Maximum number of emails accepted by the bulk validation endpoint.
pub const MAX_BULK_EMAILS: usize = 1000;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT`: HTTP server port, defaults to 3000
/// - `REDIS_URL`: ephemeral store; when unset an in-process store is used
/// - `API_BASE_URL`: public base URL used to build verification links
/// - `EMAIL_FROM`: sender address for verification emails
/// - `RESEND_API_KEY`: enables email delivery through Resend
/// - `ADMIN_SECRET_KEY`: enables `POST /api/create-api-key`
/// - `KEY_LIMIT`: maximum active keys per email address
/// - `DEFAULT_RATE_LIMIT`: requests per hour granted to new keys
/// - `KEY_VALIDITY_DAYS`: lifetime of keys issued through verification
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_email_from")]
    pub email_from: String,

    #[serde(default)]
    pub resend_api_key: Option<String>,

    #[serde(default)]
    pub admin_secret_key: Option<String>,

    #[serde(default = "default_key_limit")]
    pub key_limit: i64,

    #[serde(default = "default_rate_limit")]
    pub default_rate_limit: i32,

    #[serde(default = "default_key_validity_days")]
    pub key_validity_days: i64,
}

fn default_port() -> u16 {
    3000
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_email_from() -> String {
    "noreply@localhost".to_string()
}

fn default_key_limit() -> i64 {
    5
}

fn default_rate_limit() -> i32 {
    100
}

fn default_key_validity_days() -> i64 {
    365
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a value cannot be parsed.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Issuance policy derived from this configuration.
    pub fn issuance_policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            key_limit: self.key_limit,
            rate_limit: self.default_rate_limit,
            validity: Duration::days(self.key_validity_days),
        }
    }
}

/// Fixed parameters applied when a verified request becomes a key.
#[derive(Debug, Clone, Copy)]
pub struct IssuancePolicy {
    /// Active keys an email address may hold before new requests are refused
    pub key_limit: i64,

    /// Requests per hour granted to every new key
    pub rate_limit: i32,

    /// How long an issued key stays valid
    pub validity: Duration,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            key_limit: default_key_limit(),
            rate_limit: default_rate_limit(),
            validity: Duration::days(default_key_validity_days()),
        }
    }
}
