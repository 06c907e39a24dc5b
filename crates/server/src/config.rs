//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ZAGROS_DATABASE_URL` - `PostgreSQL` connection string
//! - `ZAGROS_PUBLIC_BASE_URL` - Public URL customers are redirected back to
//! - `ZAGROS_JWT_SECRET` - JWT signing secret (min 32 chars, high entropy)
//! - `SMS_API_URL` - Melipayamak shared-send endpoint (contains the account key)
//! - `ZARINPAL_MERCHANT_ID` - Payment gateway merchant ID
//!
//! ## Optional
//! - `ZAGROS_HOST` - Bind address (default: 127.0.0.1)
//! - `ZAGROS_PORT` - Listen port (default: 3000)
//! - `SMS_REGISTER_BODYID` - Registration SMS template ID (default: 389104)
//! - `SMS_PASSWORD_RESET_BODYID` - Password-reset SMS template ID (default: 390389)
//! - `ZARINPAL_SANDBOX` - `true` to use the gateway sandbox
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL the payment gateway redirects customers back to
    pub public_base_url: String,
    /// JWT signing secret
    pub jwt_secret: SecretString,
    /// SMS provider configuration
    pub sms: SmsConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Melipayamak SMS configuration.
///
/// Implements `Debug` manually: the account key is embedded in the API
/// URL path, so the URL itself is treated as a secret.
#[derive(Clone)]
pub struct SmsConfig {
    /// Shared-send endpoint including the account key
    pub api_url: String,
    /// Template ID for registration codes
    pub register_body_id: i64,
    /// Template ID for password-reset codes
    pub password_reset_body_id: i64,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &"[REDACTED]")
            .field("register_body_id", &self.register_body_id)
            .field("password_reset_body_id", &self.password_reset_body_id)
            .finish()
    }
}

/// Zarinpal payment gateway configuration.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Merchant ID
    pub merchant_id: SecretString,
    /// Use the sandbox endpoints instead of production
    pub sandbox: bool,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("merchant_id", &"[REDACTED]")
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid,
    /// or if the JWT secret fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ZAGROS_DATABASE_URL")?;
        let host = get_env_or_default("ZAGROS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ZAGROS_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ZAGROS_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ZAGROS_PORT".to_string(), e.to_string()))?;
        let public_base_url = get_required_env("ZAGROS_PUBLIC_BASE_URL")?;

        let jwt_secret = get_required_secret("ZAGROS_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "ZAGROS_JWT_SECRET")?;

        let sms = SmsConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            public_base_url,
            jwt_secret,
            sms,
            payment,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_env("SMS_API_URL")?,
            register_body_id: get_env_or_default("SMS_REGISTER_BODYID", "389104")
                .parse::<i64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("SMS_REGISTER_BODYID".to_string(), e.to_string())
                })?,
            password_reset_body_id: get_env_or_default("SMS_PASSWORD_RESET_BODYID", "390389")
                .parse::<i64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SMS_PASSWORD_RESET_BODYID".to_string(),
                        e.to_string(),
                    )
                })?,
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            merchant_id: get_required_secret("ZARINPAL_MERCHANT_ID")?,
            sandbox: get_env_or_default("ZARINPAL_SANDBOX", "false") == "true",
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that the JWT secret is long enough, not a placeholder, and
/// has sufficient entropy.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();

    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real secrets are randomly generated and have high entropy.
    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_secret_rejected() {
        let secret = SecretString::from("your-jwt-secret-goes-here-please-change".to_owned());
        assert!(matches!(
            validate_jwt_secret(&secret, "TEST"),
            Err(ConfigError::InsecureSecret(..))
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        let secret = SecretString::from("tooshort".to_owned());
        assert!(matches!(
            validate_jwt_secret(&secret, "TEST"),
            Err(ConfigError::InsecureSecret(..))
        ));
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        let secret = SecretString::from("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_owned());
        assert!(matches!(
            validate_jwt_secret(&secret, "TEST"),
            Err(ConfigError::InsecureSecret(..))
        ));
    }

    #[test]
    fn test_random_secret_accepted() {
        let secret = SecretString::from("Ff3y1R8PqarWk0ZbDv6uHx2mJc9TnE5L4sQgVdNh7K".to_owned());
        assert!(validate_jwt_secret(&secret, "TEST").is_ok());
    }
}
