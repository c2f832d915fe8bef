use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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
    pub storage: StorageConfig,
    pub remote: Option<RemoteConfig>,
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

        let storage_dir = env::var("ENROLLMENT_STORAGE_DIR")
            .unwrap_or_else(|_| "enrollments".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                dir: PathBuf::from(storage_dir),
            },
            remote: RemoteConfig::from_env(),
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the on-disk enrollment archive.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

/// App-only credentials for the Microsoft Graph tenant connection.
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}

/// Target SharePoint list for structured enrollment items.
#[derive(Debug, Clone)]
pub struct SharePointConfig {
    pub site_id: String,
    pub list_id: String,
}

/// Remote destinations, present only when the Graph credential triple is complete.
///
/// The notification address and the SharePoint pair each gate their own
/// destination; partial SharePoint configuration disables the list entirely.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub credentials: GraphCredentials,
    pub notification_email: Option<String>,
    pub sharepoint: Option<SharePointConfig>,
}

impl RemoteConfig {
    fn from_env() -> Option<Self> {
        let client_id = non_empty_env("MICROSOFT_CLIENT_ID")?;
        let client_secret = non_empty_env("MICROSOFT_CLIENT_SECRET")?;
        let tenant_id = non_empty_env("MICROSOFT_TENANT_ID")?;

        let sharepoint = match (
            non_empty_env("SHAREPOINT_SITE_ID"),
            non_empty_env("SHAREPOINT_LIST_ID"),
        ) {
            (Some(site_id), Some(list_id)) => Some(SharePointConfig { site_id, list_id }),
            _ => None,
        };

        Some(Self {
            credentials: GraphCredentials {
                client_id,
                client_secret,
                tenant_id,
            },
            notification_email: non_empty_env("ENROLLMENT_NOTIFICATION_EMAIL"),
            sharepoint,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
