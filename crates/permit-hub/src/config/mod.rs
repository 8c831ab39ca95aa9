use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::permits::fallback::FallbackMode;

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
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment != AppEnvironment::Production,
            },
            pipeline: PipelineConfig::from_env()?,
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
    pub ansi: bool,
}

/// Where the pipeline writes its artifacts and how it talks to the city portals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    /// Records must cost strictly more than this. Zero disables the filter.
    pub min_cost: u64,
    pub http_timeout: Duration,
    pub fetch_limit: u32,
    /// Zero means no issue-date window is requested from the portals.
    pub days_back: u32,
    pub fallback: FallbackMode,
    /// A city that succeeded more recently than this is skipped unless the run forces it.
    pub rescrape_after: Option<chrono::Duration>,
    /// Socrata application token; anonymous requests are throttled harder.
    pub app_token: Option<String>,
}

/// A century of issue dates.
const MAX_DAYS_BACK: u64 = 36_500;
/// One year.
const MAX_RESCRAPE_MINUTES: u64 = 525_600;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            state_dir: PathBuf::from("state"),
            min_cost: 1_000_000,
            http_timeout: Duration::from_secs(30),
            fetch_limit: 1000,
            days_back: 30,
            fallback: FallbackMode::Disabled,
            rescrape_after: None,
            app_token: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let output_dir = env::var("PERMIT_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let state_dir = env::var("PERMIT_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_dir);
        let min_cost = env_number("PERMIT_MIN_COST", defaults.min_cost)?;
        let timeout_secs = env_number("PERMIT_HTTP_TIMEOUT_SECS", 30u64)?;
        let fetch_limit = env_number("PERMIT_FETCH_LIMIT", defaults.fetch_limit)?;
        let days_back = env_number("PERMIT_DAYS_BACK", defaults.days_back)?;
        within("PERMIT_DAYS_BACK", u64::from(days_back), MAX_DAYS_BACK)?;

        let fallback_min = env_number("PERMIT_FALLBACK_MIN", 2u32)?;
        let fallback_max = env_number("PERMIT_FALLBACK_MAX", 8u32)?;
        if fallback_min > fallback_max {
            return Err(ConfigError::InvertedFallbackRange {
                min: fallback_min,
                max: fallback_max,
            });
        }
        let fallback_raw = env::var("PERMIT_FALLBACK").unwrap_or_else(|_| "disabled".to_string());
        let fallback = match fallback_raw.trim().to_ascii_lowercase().as_str() {
            "" | "disabled" | "off" | "none" => FallbackMode::Disabled,
            "placeholder" | "demo" => FallbackMode::Placeholder {
                min: fallback_min,
                max: fallback_max,
            },
            _ => return Err(ConfigError::InvalidFallback { value: fallback_raw }),
        };

        let rescrape_minutes = env_number("PERMIT_RESCRAPE_MINUTES", 0i64)?;
        within(
            "PERMIT_RESCRAPE_MINUTES",
            u64::try_from(rescrape_minutes).unwrap_or(0),
            MAX_RESCRAPE_MINUTES,
        )?;
        let rescrape_after =
            (rescrape_minutes > 0).then(|| chrono::Duration::minutes(rescrape_minutes));

        let app_token = env::var("SOCRATA_APP_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            output_dir,
            state_dir,
            min_cost,
            http_timeout: Duration::from_secs(timeout_secs),
            fetch_limit,
            days_back,
            fallback,
            rescrape_after,
            app_token,
        })
    }
}

fn within(var: &'static str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::OutOfRange { var, value, max });
    }
    Ok(())
}

fn env_number<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        _ => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str, value: String },
    InvalidFallback { value: String },
    InvertedFallbackRange { min: u32, max: u32 },
    OutOfRange { var: &'static str, value: u64, max: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a non-negative number (got '{value}')")
            }
            ConfigError::InvalidFallback { value } => write!(
                f,
                "PERMIT_FALLBACK must be 'disabled' or 'placeholder' (got '{value}')"
            ),
            ConfigError::InvertedFallbackRange { min, max } => write!(
                f,
                "PERMIT_FALLBACK_MIN ({min}) must not exceed PERMIT_FALLBACK_MAX ({max})"
            ),
            ConfigError::OutOfRange { var, value, max } => {
                write!(f, "{var} must be at most {max} (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFallback { .. }
            | ConfigError::InvertedFallbackRange { .. }
            | ConfigError::OutOfRange { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "PERMIT_OUTPUT_DIR",
            "PERMIT_STATE_DIR",
            "PERMIT_MIN_COST",
            "PERMIT_HTTP_TIMEOUT_SECS",
            "PERMIT_FETCH_LIMIT",
            "PERMIT_DAYS_BACK",
            "PERMIT_FALLBACK",
            "PERMIT_FALLBACK_MIN",
            "PERMIT_FALLBACK_MAX",
            "PERMIT_RESCRAPE_MINUTES",
            "SOCRATA_APP_TOKEN",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.pipeline.min_cost, 1_000_000);
        assert_eq!(config.pipeline.http_timeout, Duration::from_secs(30));
        assert_eq!(config.pipeline.fallback, FallbackMode::Disabled);
        assert!(config.pipeline.rescrape_after.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8000));
        reset_env();
    }

    #[test]
    fn placeholder_fallback_reads_range() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PERMIT_FALLBACK", "placeholder");
        env::set_var("PERMIT_FALLBACK_MIN", "3");
        env::set_var("PERMIT_FALLBACK_MAX", "5");
        env::set_var("PERMIT_RESCRAPE_MINUTES", "90");
        let pipeline = PipelineConfig::from_env().expect("pipeline config loads");
        assert_eq!(pipeline.fallback, FallbackMode::Placeholder { min: 3, max: 5 });
        assert_eq!(pipeline.rescrape_after, Some(chrono::Duration::minutes(90)));
        reset_env();
    }

    #[test]
    fn rejects_bad_numbers_and_inverted_ranges() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PERMIT_MIN_COST", "lots");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::InvalidNumber { var: "PERMIT_MIN_COST", .. })
        ));

        reset_env();
        env::set_var("PERMIT_FALLBACK_MIN", "9");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::InvertedFallbackRange { min: 9, max: 8 })
        ));

        reset_env();
        env::set_var("PERMIT_FALLBACK", "sometimes");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::InvalidFallback { .. })
        ));
        reset_env();
    }

    #[test]
    fn rejects_windows_beyond_their_ceiling() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("PERMIT_DAYS_BACK", "4000000000");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::OutOfRange { var: "PERMIT_DAYS_BACK", value: 4_000_000_000, .. })
        ));

        reset_env();
        env::set_var("PERMIT_RESCRAPE_MINUTES", "9223372036854775807");
        assert!(matches!(
            PipelineConfig::from_env(),
            Err(ConfigError::OutOfRange { var: "PERMIT_RESCRAPE_MINUTES", .. })
        ));

        reset_env();
        env::set_var("PERMIT_DAYS_BACK", "36500");
        env::set_var("PERMIT_RESCRAPE_MINUTES", "525600");
        let pipeline = PipelineConfig::from_env().expect("bounds are inclusive");
        assert_eq!(pipeline.days_back, 36_500);
        assert_eq!(pipeline.rescrape_after, Some(chrono::Duration::minutes(525_600)));
        reset_env();
    }
}
