use std::env;
use std::fmt;

use crate::engine::{EngineOptions, NonFinitePolicy};
use crate::rules::loader::{DuplicateCodePolicy, LoaderOptions};
use crate::rules::DEFAULT_CATEGORY_FIELD;

/// Distinguishes runtime behavior for different stages of a deployment.
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

/// Top-level configuration for the scorer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let category_field = env::var("APP_CATEGORY_FIELD")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY_FIELD.to_string());

        let duplicate_codes = match env::var("APP_DUPLICATE_CATEGORY_CODES") {
            Ok(value) => DuplicateCodePolicy::from_name(&value)
                .ok_or(ConfigError::InvalidDuplicatePolicy { value })?,
            Err(_) => DuplicateCodePolicy::default(),
        };

        let non_finite = match env::var("APP_NON_FINITE_SCORES") {
            Ok(value) => NonFinitePolicy::from_name(&value)
                .ok_or(ConfigError::InvalidNonFinitePolicy { value })?,
            Err(_) => NonFinitePolicy::default(),
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            scoring: ScoringConfig {
                category_field,
                duplicate_codes,
                non_finite,
            },
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Rule compilation and evaluation policies.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub category_field: String,
    pub duplicate_codes: DuplicateCodePolicy,
    pub non_finite: NonFinitePolicy,
}

impl ScoringConfig {
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            default_category_field: self.category_field.clone(),
            duplicate_codes: self.duplicate_codes,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            non_finite: self.non_finite,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidDuplicatePolicy { value: String },
    InvalidNonFinitePolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDuplicatePolicy { value } => write!(
                f,
                "APP_DUPLICATE_CATEGORY_CODES must be 'reject' or 'last_wins', got '{value}'"
            ),
            ConfigError::InvalidNonFinitePolicy { value } => write!(
                f,
                "APP_NON_FINITE_SCORES must be 'propagate' or 'reject', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
