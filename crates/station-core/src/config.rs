use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const APP_DIR_NAME: &str = "time-station";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the advice cache database)
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Where the forecast is requested for
    #[serde(default)]
    pub location: LocationConfig,

    /// Weather provider settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Advice generator settings
    #[serde(default)]
    pub advisor: AdvisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// County or city name exactly as the provider spells it (e.g. 臺北市)
    pub city: String,

    /// Optional township; when set it is used as the forecast location name
    #[serde(default)]
    pub district: String,

    pub latitude: f64,
    pub longitude: f64,
}

impl LocationConfig {
    /// Name to request forecasts for: the district when configured, else the city.
    pub fn forecast_location(&self) -> &str {
        if self.district.trim().is_empty() {
            &self.city
        } else {
            &self.district
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            city: "臺北市".to_string(),
            district: String::new(),
            latitude: 25.0330,
            longitude: 121.5654,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Open-data API key (falls back to the CWA_API_KEY environment variable)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Datastore base URL
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// Forecast horizon in days: 3 or 7
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Refresh interval in minutes
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_weather_base_url() -> String {
    "https://opendata.cwa.gov.tw/api/v1/rest/datastore".to_string()
}

fn default_forecast_days() -> u8 {
    3
}

fn default_refresh_minutes() -> u32 {
    30
}

impl WeatherConfig {
    /// API key from config, or from the environment when not set in the file.
    pub fn resolved_api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone()).or_else(|| non_blank(std::env::var("CWA_API_KEY").ok()))
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            forecast_days: default_forecast_days(),
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

/// Advice generator backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorProvider {
    #[default]
    Gemini,
    OpenAi,
}

impl AdvisorProvider {
    /// Environment variable consulted when no key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Whether advice is generated at all
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub provider: AdvisorProvider,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model override; provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// Endpoint override (self-hosted gateways, tests)
    #[serde(default)]
    pub base_url: Option<String>,

    /// How long cached advice stays valid
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: u32,
}

fn default_cache_minutes() -> u32 {
    60
}

impl AdvisorConfig {
    /// API key from config, or from the provider's environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        non_blank(self.api_key.clone())
            .or_else(|| non_blank(std::env::var(self.provider.api_key_env()).ok()))
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: AdvisorProvider::default(),
            api_key: None,
            model: None,
            base_url: None,
            cache_minutes: default_cache_minutes(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            location: LocationConfig::default(),
            weather: WeatherConfig::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Reads `path` when given, otherwise the per-user config file. Returns the
    /// config along with any validation warnings, or a [`ConfigError`] when
    /// the file cannot be loaded or validation finds critical errors.
    pub fn load_validated(
        path: Option<&Path>,
    ) -> std::result::Result<(Self, ValidationResult), ConfigError> {
        let config = match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
        .map_err(|e| ConfigError::Load(format!("{:#}", e)))?;

        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.location.city.trim().is_empty() {
            result.add_error("location.city", "City must not be empty");
        }

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if !matches!(self.weather.forecast_days, 3 | 7) {
            result.add_error(
                "weather.forecast_days",
                format!("Forecast days must be 3 or 7, got {}", self.weather.forecast_days),
            );
        }

        if self.weather.resolved_api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                "CWA API key not configured - forecasts can only be read from files",
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh disabled (0 minutes)",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Weather refresh interval is more than 24 hours",
            );
        }

        if let Some(base_url) = &self.advisor.base_url {
            self.validate_url(base_url, "advisor.base_url", &mut result);
        }

        if self.advisor.cache_minutes == 0 {
            result.add_error("advisor.cache_minutes", "Cache validity must be greater than 0");
        }

        if self.advisor.enabled && self.advisor.resolved_api_key().is_none() {
            result.add_warning(
                "advisor.api_key",
                format!(
                    "Advisor enabled but no API key (set {}) - fallback messages will be used",
                    self.advisor.provider.api_key_env()
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default file location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the advice cache database inside the config directory
    pub fn cache_db_path(&self) -> PathBuf {
        self.config_dir.join("advice_cache.db")
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.advisor.base_url = Some("ftp://localhost:8080".to_string());
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_forecast_days_must_be_three_or_seven() {
        let mut config = Config::default();
        config.weather.forecast_days = 5;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.forecast_days"));

        config.weather.forecast_days = 7;
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_zero_cache_minutes_is_error() {
        let mut config = Config::default();
        config.advisor.cache_minutes = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "advisor.cache_minutes"));
    }

    #[test]
    fn test_forecast_location_prefers_district() {
        let mut location = LocationConfig::default();
        assert_eq!(location.forecast_location(), "臺北市");
        location.district = "信義區".to_string();
        assert_eq!(location.forecast_location(), "信義區");
    }

    #[test]
    fn test_configured_key_wins_over_environment() {
        let mut advisor = AdvisorConfig::default();
        advisor.api_key = Some("configured-key".to_string());
        assert_eq!(advisor.resolved_api_key().as_deref(), Some("configured-key"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str(
            r#"
            [location]
            city = "新竹市"
            latitude = 24.8
            longitude = 120.97
            "#,
        )
        .unwrap();
        assert_eq!(config.location.city, "新竹市");
        assert_eq!(config.weather.forecast_days, 3);
        assert_eq!(config.advisor.cache_minutes, 60);
        assert_eq!(config.advisor.provider, AdvisorProvider::Gemini);
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.weather.refresh_minutes, 30);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.location.city, config.location.city);
    }

    #[test]
    fn test_load_validated_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.advisor.cache_minutes = 0;
        config.save_to(&path).unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("advisor.cache_minutes")));
    }

    #[test]
    fn test_load_validated_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[location\ncity = ").unwrap();

        let err = Config::load_validated(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Load(ref m) if m.contains("Failed to parse")));
        assert_eq!(
            err.user_message(),
            "Configuration could not be loaded. Check your settings."
        );
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
