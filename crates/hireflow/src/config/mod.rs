use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

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
    pub pipeline: PipelineConfig,
    pub scoring: ScoringConfig,
    pub storage: StorageConfig,
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

        let pipeline = PipelineConfig {
            processing_secret: non_empty_var("HIREFLOW_PROCESSING_SECRET"),
            failed_documents: match non_empty_var("HIREFLOW_FAILED_DOCUMENTS") {
                Some(raw) => raw.parse()?,
                None => FailedDocumentPolicy::OperatorReset,
            },
            claim_attempts: parse_positive("HIREFLOW_CLAIM_ATTEMPTS", 5)?,
            ranking_concurrency: parse_positive("HIREFLOW_RANKING_CONCURRENCY", 4)?,
        };

        let scoring = ScoringConfig {
            endpoint: non_empty_var("HIREFLOW_SCORING_ENDPOINT"),
            api_key: non_empty_var("HIREFLOW_SCORING_API_KEY"),
            timeout_secs: parse_positive("HIREFLOW_SCORING_TIMEOUT_SECS", 30)? as u64,
            max_retries: parse_bounded("HIREFLOW_SCORING_MAX_RETRIES", 1, MAX_SCORING_RETRIES)?,
            max_context_chars: parse_positive("HIREFLOW_SCORING_MAX_CONTEXT_CHARS", 12_000)?,
        };

        let storage = StorageConfig {
            base_url: non_empty_var("HIREFLOW_STORAGE_URL"),
            service_key: non_empty_var("HIREFLOW_STORAGE_KEY"),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
            scoring,
            storage,
        })
    }
}

fn non_empty_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(default),
    }
}

fn parse_bounded(name: &'static str, default: usize, max: usize) -> Result<usize, ConfigError> {
    let value = parse_number(name, default)?;
    if value > max {
        return Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_positive(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let value = parse_number(name, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
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

/// What an operator may do with a document whose extraction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedDocumentPolicy {
    /// Failures are final; the document has to be registered again.
    Terminal,
    /// Failed documents may be moved back to `pending` explicitly.
    OperatorReset,
}

impl FromStr for FailedDocumentPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "operator-reset" | "operator_reset" | "reset" => Ok(Self::OperatorReset),
            other => Err(ConfigError::InvalidFailurePolicy(other.to_string())),
        }
    }
}

/// Knobs for the intake pipeline entry points.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub processing_secret: Option<String>,
    pub failed_documents: FailedDocumentPolicy,
    pub claim_attempts: usize,
    pub ranking_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processing_secret: None,
            failed_documents: FailedDocumentPolicy::OperatorReset,
            claim_attempts: 5,
            ranking_concurrency: 4,
        }
    }
}

/// Upper bound for `HIREFLOW_SCORING_MAX_RETRIES`.
pub const MAX_SCORING_RETRIES: usize = 10;

/// Connection details for the external scoring collaborator.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub max_context_chars: usize,
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
            max_retries: 1,
            max_context_chars: 12_000,
        }
    }
}

/// Object storage the extraction worker downloads from.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub base_url: Option<String>,
    pub service_key: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidFailurePolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer (got '{value}')")
            }
            ConfigError::InvalidFailurePolicy(value) => write!(
                f,
                "HIREFLOW_FAILED_DOCUMENTS must be 'terminal' or 'operator-reset' (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
