//! Weather data for Time Station
//!
//! Normalizes CWA open-data forecasts (both historical payload schemas) into
//! aligned forecast slots, maps condition codes to labels and icons, and
//! derives trend signals from the result.

pub mod catalog;
pub mod client;
pub mod error;
pub mod normalizer;
pub mod payload;
pub mod sun;
pub mod trend;
pub mod types;

pub use catalog::{CodeCatalog, CodeKey, Locale};
pub use client::{CwaClient, ForecastRange, TimeWindow};
pub use error::{ParseError, WeatherError};
pub use normalizer::ForecastNormalizer;
pub use payload::RawPayload;
pub use sun::parse_sun_times;
pub use trend::{TrendDirection, TrendSummary, WeatherCategory};
pub use types::*;
