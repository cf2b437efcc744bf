//! CWA open-data HTTP client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, FixedOffset, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::instrument;

use crate::error::{ParseError, WeatherError};
use crate::normalizer::ForecastNormalizer;
use crate::sun::parse_sun_times;
use crate::types::{ForecastSequence, SunTimes};

pub const CWA_API_BASE: &str = "https://opendata.cwa.gov.tw/api/v1/rest/datastore";

/// Elements requested from the forecast endpoints.
const FORECAST_ELEMENTS: &str = "舒適度指數,3小時降雨機率,溫度,風速,天氣現象,相對濕度,體感溫度";

const SUN_ENDPOINT: &str = "A-B0062-001";

const TAIWAN_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Which forecast endpoint family to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastRange {
    ThreeDay,
    SevenDay,
}

impl ForecastRange {
    /// 3 selects the three-day endpoint; anything else the seven-day one.
    pub fn from_days(days: u8) -> Self {
        if days == 3 {
            Self::ThreeDay
        } else {
            Self::SevenDay
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::ThreeDay => "F-D0047-089",
            Self::SevenDay => "F-D0047-091",
        }
    }
}

/// Inclusive date range sent as `timeFrom`/`timeTo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl TimeWindow {
    /// Today (Taiwan time) through `days` days later.
    pub fn days_ahead(days: u64) -> Self {
        let today = FixedOffset::east_opt(TAIWAN_UTC_OFFSET_SECS)
            .map(|offset| Utc::now().with_timezone(&offset).date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        Self {
            from: today,
            to: today.checked_add_days(Days::new(days)).unwrap_or(today),
        }
    }

    fn params(&self) -> [(&'static str, String); 2] {
        [
            ("timeFrom", self.from.format("%Y-%m-%d").to_string()),
            ("timeTo", self.to.format("%Y-%m-%d").to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CwaClient {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
}

impl CwaClient {
    pub fn new(api_key: &str) -> Result<Self, WeatherError> {
        Self::with_base_url(api_key, CWA_API_BASE)
    }

    /// Client against a different datastore root (mirrors, tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, WeatherError> {
        if api_key.trim().is_empty() {
            return Err(WeatherError::MissingApiKey);
        }

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the raw forecast body for a location.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_forecast(
        &self,
        location: &str,
        range: ForecastRange,
        window: Option<TimeWindow>,
    ) -> Result<Value, WeatherError> {
        let url = format!("{}/{}", self.base_url, range.endpoint());

        let mut query: Vec<(&str, String)> = vec![
            ("Authorization", self.api_key.clone()),
            ("format", "JSON".to_string()),
            ("LocationName", location.to_string()),
            ("ElementName", FORECAST_ELEMENTS.to_string()),
            ("sort", "time".to_string()),
        ];
        if let Some(window) = window {
            query.extend(window.params());
        }

        tracing::info!("Fetching {} forecast for {}", range.endpoint(), location);
        self.get_json(&url, &query).await
    }

    /// Fetch and normalize the forecast for a location.
    #[instrument(skip(self, normalizer), level = "info")]
    pub async fn forecast(
        &self,
        normalizer: &ForecastNormalizer<'_>,
        location: &str,
        range: ForecastRange,
        window: Option<TimeWindow>,
    ) -> Result<ForecastSequence, WeatherError> {
        let body = self.fetch_forecast(location, range, window).await?;
        Ok(normalizer.normalize_value(body, location)?)
    }

    /// Sunrise and sunset for a county. Defaults to today through two days out.
    #[instrument(skip(self), level = "info")]
    pub async fn sun_times(
        &self,
        county: &str,
        window: Option<TimeWindow>,
    ) -> Result<Vec<SunTimes>, WeatherError> {
        let url = format!("{}/{}", self.base_url, SUN_ENDPOINT);
        let window = window.unwrap_or_else(|| TimeWindow::days_ahead(2));

        let mut query: Vec<(&str, String)> = vec![
            ("Authorization", self.api_key.clone()),
            ("CountyName", county.to_string()),
            ("parameter", "SunRiseTime,SunSetTime".to_string()),
            ("sort", "CountyName".to_string()),
        ];
        query.extend(window.params());

        tracing::info!("Fetching sunrise/sunset for {}", county);
        let body = self.get_json(&url, &query).await?;

        parse_sun_times(&body)
            .ok_or_else(|| ParseError::new("malformed sunrise/sunset payload").into())
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, WeatherError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "CWA request failed");
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ParseError::new(format!("response is not JSON: {}", e)))?;

        if !is_successful(&body) {
            tracing::warn!("CWA reported an unsuccessful response");
            return Err(WeatherError::Unsuccessful);
        }

        Ok(body)
    }
}

/// The datastore marks good responses with `"success": "true"`.
fn is_successful(body: &Value) -> bool {
    match body.get("success") {
        Some(Value::String(s)) => s == "true",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forecast_range() {
        assert_eq!(ForecastRange::from_days(3).endpoint(), "F-D0047-089");
        assert_eq!(ForecastRange::from_days(7).endpoint(), "F-D0047-091");
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            CwaClient::new("  ").unwrap_err(),
            WeatherError::MissingApiKey
        ));
    }

    #[test]
    fn test_time_window_params() {
        let window = TimeWindow {
            from: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            to: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
        };
        let params = window.params();
        assert_eq!(params[0], ("timeFrom", "2026-01-07".to_string()));
        assert_eq!(params[1], ("timeTo", "2026-01-09".to_string()));

        let ahead = TimeWindow::days_ahead(2);
        assert_eq!((ahead.to - ahead.from).num_days(), 2);
    }

    #[test]
    fn test_is_successful() {
        assert!(is_successful(&json!({ "success": "true" })));
        assert!(!is_successful(&json!({ "success": "false" })));
        assert!(!is_successful(&json!({})));
    }
}
