use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::workflows::resumes::UserId;

const DEFAULT_MIN_SIMILARITY: f32 = 0.8;

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
    pub resumes: ResumeOptions,
    /// Approval chain in order, from `RESUME_APPROVERS` (comma separated user ids).
    pub approvers: Vec<UserId>,
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

        let resumes = match env::var("RESUME_MIN_SIMILARITY") {
            Ok(raw) => ResumeOptions::parse(&raw)?,
            Err(_) => ResumeOptions::default(),
        };

        let approvers = match env::var("RESUME_APPROVERS") {
            Ok(raw) => parse_approvers(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            resumes,
            approvers,
        })
    }
}

fn parse_approvers(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            uuid::Uuid::parse_str(entry)
                .ok()
                .filter(|id| !id.is_nil())
                .map(UserId)
                .ok_or_else(|| ConfigError::InvalidApprover {
                    value: entry.to_string(),
                })
        })
        .collect()
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

/// Knobs consumed by the resume lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumeOptions {
    /// Relations scoring below this value are not reported by the comparer.
    pub min_similarity: f32,
}

impl ResumeOptions {
    pub fn new(min_similarity: f32) -> Result<Self, ConfigError> {
        if min_similarity.is_finite() && (0.0..=1.0).contains(&min_similarity) {
            Ok(Self { min_similarity })
        } else {
            Err(ConfigError::InvalidMinSimilarity {
                value: min_similarity.to_string(),
            })
        }
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let value = raw
            .trim()
            .parse::<f32>()
            .map_err(|_| ConfigError::InvalidMinSimilarity {
                value: raw.to_string(),
            })?;
        Self::new(value)
    }
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMinSimilarity { value: String },
    InvalidApprover { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMinSimilarity { value } => write!(
                f,
                "RESUME_MIN_SIMILARITY must be a number between 0 and 1 (found '{value}')"
            ),
            ConfigError::InvalidApprover { value } => {
                write!(f, "RESUME_APPROVERS entry '{value}' is not a user id")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidMinSimilarity { .. }
            | ConfigError::InvalidApprover { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
