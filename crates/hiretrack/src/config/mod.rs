use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::applications::domain::{Role, UserId};
use crate::workflows::applications::identity::{Caller, StaticTokenIdentity};
use crate::workflows::applications::transition::DEFAULT_CONFLICT_RETRIES;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let conflict_retries = match env::var("APP_CONFLICT_RETRIES") {
            Ok(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|retries| *retries > 0)
                .ok_or(ConfigError::InvalidConflictRetries)?,
            Err(_) => DEFAULT_CONFLICT_RETRIES,
        };

        let tokens = match env::var("APP_API_TOKENS") {
            Ok(raw) => parse_token_grants(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig { conflict_retries },
            auth: AuthConfig { tokens },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the status transition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Attempts per transition when the store reports a concurrent write.
    pub conflict_retries: u8,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

/// Bearer tokens accepted by the static identity provider.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenGrant>,
}

impl AuthConfig {
    pub fn identity(&self) -> StaticTokenIdentity {
        self.tokens
            .iter()
            .map(|grant| (grant.token.clone(), grant.caller))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub caller: Caller,
}

/// Parse `token:user_id:role` entries separated by commas.
pub fn parse_token_grants(raw: &str) -> Result<Vec<TokenGrant>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidTokenGrant {
                entry: entry.to_string(),
            };
            let mut parts = entry.split(':').map(str::trim);
            let (Some(token), Some(user_id), Some(role), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid());
            };
            if token.is_empty() {
                return Err(invalid());
            }
            let user_id = user_id.parse::<u64>().map_err(|_| invalid())?;
            let role = role.parse::<Role>().map_err(|_| invalid())?;
            Ok(TokenGrant {
                token: token.to_string(),
                caller: Caller {
                    user_id: UserId(user_id),
                    role,
                },
            })
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidConflictRetries,
    InvalidTokenGrant { entry: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidConflictRetries => {
                write!(f, "APP_CONFLICT_RETRIES must be an integer between 1 and 255")
            }
            ConfigError::InvalidTokenGrant { entry } => write!(
                f,
                "APP_API_TOKENS entry '{entry}' must look like token:user_id:role"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidConflictRetries
            | ConfigError::InvalidTokenGrant { .. } => None,
        }
    }
}

/// Serializes tests that read or mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
