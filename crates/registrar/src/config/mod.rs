use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::workflows::results::{
    AggregationPolicy, GradingError, GradingPolicy, RemarkBands, ScoreRange,
};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_WRITE_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

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

/// Top-level configuration for the registrar.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
    pub school: SchoolConfig,
    pub grading: GradingPolicy,
    pub transcript: TranscriptConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let location = match env::var("APP_DATABASE_PATH") {
            Ok(value) if value.trim() == ":memory:" => StoreLocation::Memory,
            Ok(value) if !value.trim().is_empty() => StoreLocation::File(PathBuf::from(value.trim())),
            _ => StoreLocation::File(PathBuf::from("registrar.db")),
        };
        let busy_timeout_ms: u64 = parse_var("APP_BUSY_TIMEOUT_MS", DEFAULT_BUSY_TIMEOUT_MS)?;
        let write_attempts: u32 = parse_var("APP_WRITE_RETRIES", DEFAULT_WRITE_ATTEMPTS)?;
        if write_attempts == 0 {
            return Err(ConfigError::NotPositive {
                key: "APP_WRITE_RETRIES",
            });
        }

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let org_prefix = env::var("APP_ORG_PREFIX").unwrap_or_else(|_| "Kristobell".to_string());
        let logo_url = optional_var("APP_SCHOOL_LOGO_URL");

        let score_range = ScoreRange::new(
            parse_finite("APP_SCORE_MIN", 0.0)?,
            parse_finite("APP_SCORE_MAX", 100.0)?,
        )
        .map_err(|source| ConfigError::Grading {
            key: "APP_SCORE_MIN/APP_SCORE_MAX",
            source,
        })?;
        let remark_bands = match optional_var("APP_REMARK_BANDS") {
            Some(raw) => RemarkBands::parse(&raw).map_err(|source| ConfigError::Grading {
                key: "APP_REMARK_BANDS",
                source,
            })?,
            None => RemarkBands::default(),
        };
        let aggregation = if parse_flag("APP_STRICT_RESULTS")? {
            AggregationPolicy::Strict
        } else {
            AggregationPolicy::Lenient
        };
        let pass_mark = parse_finite("APP_PASS_MARK", 50.0)?;

        Ok(Self {
            environment,
            store: StoreConfig {
                location,
                busy_timeout: Duration::from_millis(busy_timeout_ms),
                write_attempts,
                retry_backoff: DEFAULT_RETRY_BACKOFF,
            },
            telemetry: TelemetryConfig { log_level },
            school: SchoolConfig {
                org_prefix,
                logo_url,
            },
            grading: GradingPolicy {
                score_range,
                remark_bands,
                aggregation,
                pass_mark,
            },
            transcript: TranscriptConfig {
                template_path: optional_var("APP_TEMPLATE_PATH").map(PathBuf::from),
            },
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

fn parse_finite(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value = parse_var(key, default)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })
    }
}

fn parse_flag(key: &'static str) -> Result<bool, ConfigError> {
    match optional_var(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value }),
        },
        None => Ok(false),
    }
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

/// SQLite connection and write-retry settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub busy_timeout: Duration,
    /// Total attempts for one write transaction, including the first.
    pub write_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::with_location(StoreLocation::Memory)
    }

    pub fn at_path(path: &Path) -> Self {
        Self::with_location(StoreLocation::File(path.to_path_buf()))
    }

    fn with_location(location: StoreLocation) -> Self {
        Self {
            location,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// School identity used in identifiers and rendered documents.
#[derive(Debug, Clone)]
pub struct SchoolConfig {
    pub org_prefix: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptConfig {
    pub template_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    NotPositive { key: &'static str },
    InvalidFlag { key: &'static str, value: String },
    Grading {
        key: &'static str,
        source: GradingError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a number, got '{value}'")
            }
            ConfigError::NotPositive { key } => write!(f, "{key} must be greater than zero"),
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false, got '{value}'")
            }
            ConfigError::Grading { key, source } => write!(f, "{key} is invalid: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidNumber { .. }
            | ConfigError::NotPositive { .. }
            | ConfigError::InvalidFlag { .. } => None,
            ConfigError::Grading { source, .. } => Some(source),
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
        for key in [
            "APP_ENV",
            "APP_LOG_LEVEL",
            "APP_DATABASE_PATH",
            "APP_BUSY_TIMEOUT_MS",
            "APP_WRITE_RETRIES",
            "APP_ORG_PREFIX",
            "APP_SCORE_MIN",
            "APP_SCORE_MAX",
            "APP_REMARK_BANDS",
            "APP_STRICT_RESULTS",
            "APP_PASS_MARK",
            "APP_TEMPLATE_PATH",
            "APP_SCHOOL_LOGO_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(
            config.store.location,
            StoreLocation::File(PathBuf::from("registrar.db"))
        );
        assert_eq!(config.store.busy_timeout, Duration::from_millis(5_000));
        assert_eq!(config.store.write_attempts, 5);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.school.org_prefix, "Kristobell");
        assert_eq!(config.school.logo_url, None);
        assert_eq!(config.grading, GradingPolicy::default());
        assert_eq!(config.transcript.template_path, None);
    }

    #[test]
    fn reads_store_and_grading_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_DATABASE_PATH", ":memory:");
        env::set_var("APP_WRITE_RETRIES", "2");
        env::set_var("APP_SCORE_MAX", "60");
        env::set_var("APP_REMARK_BANDS", "40:Pass,0:Fail");
        env::set_var("APP_STRICT_RESULTS", "yes");
        env::set_var("APP_PASS_MARK", "40");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.store.location, StoreLocation::Memory);
        assert_eq!(config.store.write_attempts, 2);
        assert_eq!(config.grading.score_range.max(), 60.0);
        assert_eq!(config.grading.remark_bands.remark_for(39.99), "Fail");
        assert_eq!(config.grading.aggregation, AggregationPolicy::Strict);
        assert_eq!(config.grading.pass_mark, 40.0);
        reset_env();
    }

    #[test]
    fn rejects_malformed_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_BUSY_TIMEOUT_MS", "soon");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "APP_BUSY_TIMEOUT_MS",
                ..
            })
        ));

        reset_env();
        env::set_var("APP_WRITE_RETRIES", "0");
        let err = AppConfig::load().expect_err("zero attempts is rejected");
        assert_eq!(err.to_string(), "APP_WRITE_RETRIES must be greater than zero");

        reset_env();
        env::set_var("APP_REMARK_BANDS", "Excellent");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::Grading {
                key: "APP_REMARK_BANDS",
                ..
            })
        ));

        reset_env();
        env::set_var("APP_SCORE_MIN", "100");
        assert!(matches!(AppConfig::load(), Err(ConfigError::Grading { .. })));
        reset_env();
    }

    #[test]
    fn rejects_non_finite_grading_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PASS_MARK", "NaN");
        let err = AppConfig::load().expect_err("NaN pass mark is rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "APP_PASS_MARK",
                ..
            }
        ));
        assert_eq!(err.to_string(), "APP_PASS_MARK must be a number, got 'NaN'");

        reset_env();
        env::set_var("APP_SCORE_MAX", "inf");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "APP_SCORE_MAX",
                ..
            })
        ));
        reset_env();
    }
}
