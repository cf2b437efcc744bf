mod error_mapping;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use station_advisor::generator::{GEMINI_API_BASE, OPENAI_API_BASE};
use station_advisor::service::random_fallback;
use station_advisor::{
    Advice, AdviceGenerator, AdviceSource, AdvisoryCache, AdvisoryService, GeminiGenerator,
    KeyValueStore, MemoryStore, Observation, OpenAiGenerator, SqliteStore,
};
use station_core::{AdvisorError, AdvisorProvider, AppError, Config, ConfigError, WeatherError};
use station_weather::{
    CodeCatalog, CwaClient, ForecastNormalizer, ForecastRange, ForecastSequence, LocationMatch,
    RawPayload, SunTimes,
};

use crate::error_mapping::IntoAppError;

#[derive(Debug, Parser)]
#[command(name = "time-station", version, about = "Taiwan weather forecast and daily advice")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the normalized forecast
    Forecast {
        /// Read a raw provider response from a file instead of the network
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Location name (defaults to the configured district or city)
        #[arg(long)]
        location: Option<String>,
        /// Forecast range in days (3 or 7)
        #[arg(long)]
        days: Option<u8>,
        /// Print the forecast as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sunrise and sunset times
    Sun {
        #[arg(long)]
        payload: Option<PathBuf>,
        /// County name (defaults to the configured city)
        #[arg(long)]
        county: Option<String>,
    },
    /// Print a short advice sentence for the current weather
    Advise {
        #[arg(long)]
        payload: Option<PathBuf>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Drop the cached advice
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    station_core::init()?;

    let cli = Cli::parse();
    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => run(cli.command, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    Config::load_validated(path).map(|(config, _)| config)
}

async fn run(command: Command, config: &Config) -> Result<(), AppError> {
    match command {
        Command::Forecast {
            payload,
            location,
            days,
            json,
        } => {
            let location =
                location.unwrap_or_else(|| config.location.forecast_location().to_string());
            let days = days.unwrap_or(config.weather.forecast_days);
            let sequence = load_forecast(config, payload.as_deref(), &location, days).await?;

            if json {
                let text = serde_json::to_string_pretty(&sequence)
                    .map_err(|e| AppError::Other(e.into()))?;
                println!("{}", text);
            } else {
                print_forecast(&sequence);
            }
        }
        Command::Sun { payload, county } => {
            let county = county.unwrap_or_else(|| config.location.city.clone());
            let (county, days) = load_sun_times(config, payload.as_deref(), county).await?;
            print_sun_times(&county, &days);
        }
        Command::Advise { payload, location } => {
            let location =
                location.unwrap_or_else(|| config.location.forecast_location().to_string());
            let sequence = load_forecast(
                config,
                payload.as_deref(),
                &location,
                config.weather.forecast_days,
            )
            .await?;

            let Some(observation) = Observation::from_sequence(&sequence) else {
                println!("{}", NO_FORECAST_DATA);
                return Ok(());
            };

            let advice = advise(config, &observation).await;
            tracing::info!(source = ?advice.source, "Advice ready");
            println!("{}", advice.text);
        }
        Command::ClearCache => {
            let store = SqliteStore::new(config.cache_db_path())
                .map_err(IntoAppError::into_app_error)?;
            AdvisoryCache::new(Arc::new(store)).clear().await;
            println!("Advice cache cleared");
        }
    }

    Ok(())
}

fn cwa_client(config: &Config) -> Result<CwaClient, AppError> {
    let api_key = config
        .weather
        .resolved_api_key()
        .ok_or(AppError::Weather(WeatherError::InvalidApiKey))?;
    CwaClient::with_base_url(&api_key, &config.weather.base_url)
        .map_err(IntoAppError::into_app_error)
}

async fn load_forecast(
    config: &Config,
    payload: Option<&Path>,
    location: &str,
    days: u8,
) -> Result<ForecastSequence, AppError> {
    let normalizer = ForecastNormalizer::default();

    let sequence = match payload {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            let raw = RawPayload::from_slice(&bytes).map_err(IntoAppError::into_app_error)?;
            normalizer
                .normalize(&raw, location)
                .map_err(IntoAppError::into_app_error)?
        }
        None => cwa_client(config)?
            .forecast(&normalizer, location, ForecastRange::from_days(days), None)
            .await
            .map_err(IntoAppError::into_app_error)?,
    };

    if let LocationMatch::Fallback { requested } = &sequence.location_match {
        tracing::warn!(
            requested = %requested,
            using = sequence.location_name.as_deref().unwrap_or_default(),
            "Showing forecast for a different location"
        );
    }

    Ok(sequence)
}

/// Sun times plus the county they belong to. A saved payload names its own
/// county, which wins over the requested one.
async fn load_sun_times(
    config: &Config,
    payload: Option<&Path>,
    county: String,
) -> Result<(String, Vec<SunTimes>), AppError> {
    match payload {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Weather(WeatherError::MalformedPayload(e.to_string()))
            })?;
            let days = station_weather::parse_sun_times(&value).ok_or_else(|| {
                AppError::Weather(WeatherError::MalformedPayload(
                    "missing sunrise/sunset records".to_string(),
                ))
            })?;
            let county = station_weather::sun::county_name(&value)
                .map(str::to_string)
                .unwrap_or(county);
            Ok((county, days))
        }
        None => {
            let days = cwa_client(config)?
                .sun_times(&county, None)
                .await
                .map_err(IntoAppError::into_app_error)?;
            Ok((county, days))
        }
    }
}

/// Advice for an observation. Never fails: a missing generator or an
/// unusable cache still yields a message.
async fn advise(config: &Config, observation: &Observation) -> Advice {
    let generator = match build_generator(config) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::warn!(error = %e, "Advice generator unavailable, using a fallback message");
            return Advice {
                text: random_fallback().to_string(),
                source: AdviceSource::Fallback,
            };
        }
    };

    AdvisoryService::new(advisory_cache(config), generator)
        .advise(observation)
        .await
}

/// Advice cache on the configured database, or in memory when it cannot be
/// opened.
fn advisory_cache(config: &Config) -> AdvisoryCache {
    let path = config.cache_db_path();
    let store: Arc<dyn KeyValueStore> = match SqliteStore::new(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Advice cache unavailable, keeping advice in memory"
            );
            Arc::new(MemoryStore::new())
        }
    };
    let validity = chrono::Duration::minutes(i64::from(config.advisor.cache_minutes));
    AdvisoryCache::new(store).with_validity(validity)
}

fn build_generator(config: &Config) -> Result<Arc<dyn AdviceGenerator>, AppError> {
    let advisor = &config.advisor;
    if !advisor.enabled {
        tracing::info!("Advisor is disabled in config; generating because advice was requested");
    }

    let api_key = advisor.resolved_api_key().ok_or_else(|| {
        AppError::Advisor(AdvisorError::InvalidApiKey(advisor.provider.name().to_string()))
    })?;
    let model = advisor.model.as_deref();

    let base_url = advisor.base_url.as_deref();

    let generator: Arc<dyn AdviceGenerator> = match advisor.provider {
        AdvisorProvider::Gemini => Arc::new(
            GeminiGenerator::with_base_url(&api_key, model, base_url.unwrap_or(GEMINI_API_BASE))
                .map_err(IntoAppError::into_app_error)?,
        ),
        AdvisorProvider::OpenAi => Arc::new(
            OpenAiGenerator::with_base_url(&api_key, model, base_url.unwrap_or(OPENAI_API_BASE))
                .map_err(IntoAppError::into_app_error)?,
        ),
    };

    Ok(generator)
}

const NO_FORECAST_DATA: &str = "(no forecast data)";

fn print_forecast(sequence: &ForecastSequence) {
    let catalog = CodeCatalog::global();

    println!("{}", sequence.location_name.as_deref().unwrap_or("未知地點"));
    if sequence.is_empty() {
        println!("  {}", NO_FORECAST_DATA);
        return;
    }

    for slot in sequence.iter() {
        let icon = catalog.icon_for(slot.condition_code.as_deref());
        let temperature = slot
            .temperature
            .map(|t| format!("{:.0}°C", t))
            .unwrap_or_else(|| "--".to_string());
        let feels_like = slot
            .feels_like
            .map(|t| format!(" (體感 {:.0}°C)", t))
            .unwrap_or_default();
        let rain = slot
            .rain_probability
            .map(|p| format!("  降雨 {:.0}%", p))
            .unwrap_or_default();

        println!(
            "  {} {} {}{} {}{}",
            slot.start_time.format("%m/%d %H:%M"),
            icon,
            temperature,
            feels_like,
            slot.condition_text.as_deref().unwrap_or_default(),
            rain
        );
    }
}

fn print_sun_times(county: &str, days: &[SunTimes]) {
    println!("{}", county);
    for day in days {
        println!(
            "  {}  日出 {}  日落 {}",
            day.date.format("%Y-%m-%d"),
            day.sunrise.format("%H:%M"),
            day.sunset.format("%H:%M")
        );
    }
}
