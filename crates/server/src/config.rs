//! Server configuration loaded from environment variables.
//!
//! The configuration is built once at startup and handed to every service and
//! store constructor; nothing reads the environment after that.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STAPLE_BASE_URL` - Public URL of the API (an `https` URL marks cookies secure)
//!
//! ## Optional
//! - `STAPLE_HOST` - Bind address (default: 127.0.0.1)
//! - `STAPLE_PORT` - Listen port (default: 9998)
//! - `STAPLE_DATABASE_URL` - `PostgreSQL` connection string; falls back to
//!   `DATABASE_URL`. When neither is set, the in-memory backend is used.
//! - `STAPLE_DEFAULT_MAX_STAPLES` - Quota for new accounts (default: 25)
//! - `STAPLE_OPERATION_TIMEOUT_MS` - Deadline for one service call (default: 5000)
//! - `STAPLE_ARCHIVE_MISSING` - `ignore` or `not-found` (default: ignore)
//! - `STAPLE_HASH_MEMORY_KIB` - Argon2 memory cost (default: 19456)
//! - `STAPLE_HASH_ITERATIONS` - Argon2 time cost (default: 2)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   Mail delivery. Without `SMTP_HOST`, notifications are written to the log.
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use staple_core::MaxStaples;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: Url,
    /// `PostgreSQL` connection URL; `None` selects the in-memory backend
    pub database_url: Option<SecretString>,
    /// Behaviour knobs for the staple and user services
    pub service: ServiceConfig,
    /// Password hashing cost
    pub hashing: HashingConfig,
    /// SMTP delivery; `None` logs notifications instead
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// What `archive` does when the staple ID does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveMissing {
    /// Succeed without doing anything.
    #[default]
    Ignore,
    /// Report the staple as not found.
    NotFound,
}

impl FromStr for ArchiveMissing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "not-found" | "not_found" => Ok(Self::NotFound),
            other => Err(format!("expected `ignore` or `not-found`, got `{other}`")),
        }
    }
}

/// Settings shared by the staple and user services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Quota assigned at registration.
    pub default_max_staples: MaxStaples,
    /// Deadline applied to every service operation.
    pub operation_timeout: Duration,
    /// Policy for archiving an unknown staple.
    pub archive_missing: ArchiveMissing,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_max_staples: MaxStaples::DEFAULT,
            operation_timeout: Duration::from_secs(5),
            archive_missing: ArchiveMissing::default(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HashingConfig {
    /// The cheapest parameters Argon2 accepts. Only for tests.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// SMTP configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let host = env.parsed_or("STAPLE_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parsed_or("STAPLE_PORT", 9998_u16)?;
        let base_url = env.required("STAPLE_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STAPLE_BASE_URL".to_owned(), e.to_string())
        })?;

        let database_url = env
            .optional("STAPLE_DATABASE_URL")
            .or_else(|| env.optional("DATABASE_URL"))
            .map(SecretString::from);

        let default_max = env.parsed_or("STAPLE_DEFAULT_MAX_STAPLES", 25_i64)?;
        let default_max_staples = MaxStaples::new(default_max).map_err(|e| {
            ConfigError::InvalidEnvVar("STAPLE_DEFAULT_MAX_STAPLES".to_owned(), e.to_string())
        })?;
        let timeout_ms = env.parsed_or("STAPLE_OPERATION_TIMEOUT_MS", 5000_u64)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STAPLE_OPERATION_TIMEOUT_MS".to_owned(),
                "must be greater than zero".to_owned(),
            ));
        }
        let service = ServiceConfig {
            default_max_staples,
            operation_timeout: Duration::from_millis(timeout_ms),
            archive_missing: env.parsed_or("STAPLE_ARCHIVE_MISSING", ArchiveMissing::Ignore)?,
        };

        let defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: env.parsed_or("STAPLE_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env.parsed_or("STAPLE_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: defaults.parallelism,
        };

        let email = EmailConfig::from_env(&env)?;

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            service,
            hashing,
            email,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl EmailConfig {
    fn from_env<F>(env: &Env<'_, F>) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(smtp_host) = env.optional("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: env.parsed_or("SMTP_PORT", 587_u16)?,
            smtp_username: env.required("SMTP_USERNAME")?,
            smtp_password: SecretString::from(env.required("SMTP_PASSWORD")?),
            from_address: env.required("EMAIL_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Typed accessors over a key lookup.
struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
        })
    }
}
