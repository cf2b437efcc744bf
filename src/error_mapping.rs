//! Conversions from crate-level errors into [`AppError`].

use station_advisor::{GeneratorError, StoreError};
use station_core::{
    AdvisorError, AppError, DatabaseError, ReqwestErrorExt, RusqliteErrorExt, WeatherError,
};
use station_weather::ParseError;

pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

impl IntoAppError for station_weather::WeatherError {
    fn into_app_error(self) -> AppError {
        use station_weather::WeatherError as Source;

        match self {
            Source::Network(e) => AppError::Network(e.into_network_error()),
            Source::Api { status, .. } if status == 401 || status == 403 => {
                AppError::Weather(WeatherError::InvalidApiKey)
            }
            Source::MissingApiKey => AppError::Weather(WeatherError::InvalidApiKey),
            Source::Parse(e) => e.into_app_error(),
            other if other.is_retryable() => AppError::Weather(WeatherError::ServiceUnavailable),
            Source::Api { status, message } => {
                AppError::Weather(WeatherError::ApiError(format!("{}: {}", status, message)))
            }
            other => AppError::Weather(WeatherError::ApiError(other.to_string())),
        }
    }
}

impl IntoAppError for ParseError {
    fn into_app_error(self) -> AppError {
        AppError::Weather(WeatherError::MalformedPayload(self.message().to_string()))
    }
}

impl IntoAppError for StoreError {
    fn into_app_error(self) -> AppError {
        match self {
            StoreError::Database(e) => AppError::Database(e.into_database_error()),
            StoreError::Io(e) => AppError::Database(DatabaseError::ConnectionFailed(e.to_string())),
        }
    }
}

impl IntoAppError for GeneratorError {
    fn into_app_error(self) -> AppError {
        match self {
            GeneratorError::InvalidApiKey(provider) => {
                AppError::Advisor(AdvisorError::InvalidApiKey(provider))
            }
            GeneratorError::Network(e) => AppError::Network(e.into_network_error()),
            other => AppError::Advisor(AdvisorError::Generator(other.to_string())),
        }
    }
}
