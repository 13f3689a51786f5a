//! Signup server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (firebase backend)
//! - `FIREBASE_API_KEY` - Web API key for Identity Toolkit and Firestore
//! - `FIREBASE_PROJECT_ID` - Firebase project that owns the Firestore database
//!
//! ## Optional
//! - `NEOAYS_HOST` - Bind address (default: 127.0.0.1)
//! - `NEOAYS_PORT` - Listen port (default: 3000)
//! - `NEOAYS_BASE_URL` - Public URL of the form (default: <http://localhost:3000>)
//! - `NEOAYS_APP_ID` - App id used in document paths (default: neoays-stage0)
//! - `NEOAYS_DOC_NAMESPACE` - Top-level document namespace (default: artifacts)
//! - `NEOAYS_BACKEND` - `firebase` or `memory` (default: firebase)
//! - `NEOAYS_RESERVE_POLICY` - `last-writer-wins` or `create-if-absent` (default: last-writer-wins)
//! - `NEOAYS_INITIAL_AUTH_TOKEN` - Custom token used instead of anonymous sign-in
//! - `FIREBASE_MEASUREMENT_ID` - Google Analytics measurement ID
//! - `FIRESTORE_ACCESS_TOKEN` - OAuth bearer token for Firestore requests
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use neoays_core::DocumentPaths;

use crate::services::reservation::ReservePolicy;

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

/// Which identity provider and document store to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Firebase Identity Toolkit and Firestore over REST.
    Firebase,
    /// In-process fakes. Data is lost on restart.
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{other}' (expected firebase or memory)")),
        }
    }
}

/// Signup server configuration.
#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the form
    pub base_url: String,
    /// Document path layout
    pub documents: DocumentsConfig,
    /// Username reservation write policy
    pub reserve_policy: ReservePolicy,
    /// Custom token used instead of anonymous sign-in
    pub initial_auth_token: Option<SecretString>,
    /// Firebase credentials (absent for the memory backend)
    pub firebase: Option<FirebaseConfig>,
    /// Analytics tag configuration
    pub analytics: AnalyticsConfig,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Document path layout: `/<namespace>/<app_id>/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentsConfig {
    /// Top-level namespace
    pub namespace: String,
    /// Application id
    pub app_id: String,
}

impl DocumentsConfig {
    /// Path builder for this layout.
    #[must_use]
    pub fn paths(&self) -> DocumentPaths {
        DocumentPaths::new(&self.namespace, &self.app_id)
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            namespace: "artifacts".to_string(),
            app_id: "neoays-stage0".to_string(),
        }
    }
}

/// Firebase project credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: SecretString,
    /// Project id
    pub project_id: String,
    /// OAuth bearer token for Firestore requests
    pub firestore_access_token: Option<SecretString>,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field(
                "firestore_access_token",
                &self.firestore_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Analytics tag configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    /// Google Analytics measurement ID
    pub measurement_id: Option<String>,
}

/// Sentry configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// DSN; Sentry is disabled when absent
    pub dsn: Option<String>,
    /// Environment name
    pub environment: Option<String>,
    /// Error event sample rate
    pub sample_rate: f32,
    /// Transaction sample rate
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl SignupConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("NEOAYS_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("NEOAYS_PORT", "3000")?;
        let base_url = get_env_or_default("NEOAYS_BASE_URL", "http://localhost:3000");
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("NEOAYS_BASE_URL".to_string(), e.to_string())
        })?;
        let documents = DocumentsConfig {
            namespace: get_env_or_default("NEOAYS_DOC_NAMESPACE", "artifacts"),
            app_id: get_env_or_default("NEOAYS_APP_ID", "neoays-stage0"),
        };
        let reserve_policy =
            parse_env_or_default::<ReservePolicy>("NEOAYS_RESERVE_POLICY", "last-writer-wins")?;
        let backend = parse_env_or_default::<BackendKind>("NEOAYS_BACKEND", "firebase")?;
        let initial_auth_token =
            get_optional_env("NEOAYS_INITIAL_AUTH_TOKEN").map(SecretString::from);

        let firebase = match backend {
            BackendKind::Firebase => Some(FirebaseConfig::from_env()?),
            BackendKind::Memory => None,
        };

        let analytics = AnalyticsConfig {
            measurement_id: get_optional_env("FIREBASE_MEASUREMENT_ID"),
        };
        let sentry = SentryConfig {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            host,
            port,
            base_url,
            documents,
            reserve_policy,
            initial_auth_token,
            firebase,
            analytics,
            sentry,
        })
    }

    /// Configuration for the in-memory backend, bound to an ephemeral port.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: "http://localhost".to_string(),
            documents: DocumentsConfig::default(),
            reserve_policy: ReservePolicy::default(),
            initial_auth_token: None,
            firebase: None,
            analytics: AnalyticsConfig::default(),
            sentry: SentryConfig::default(),
        }
    }

    /// Which backend this configuration selects.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        if self.firebase.is_some() {
            BackendKind::Firebase
        } else {
            BackendKind::Memory
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("FIREBASE_API_KEY")?,
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            firestore_access_token: get_optional_env("FIRESTORE_ACCESS_TOKEN")
                .map(SecretString::from),
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys are random strings with high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key from the Firebase console."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
