//! The weather state an advisory was generated for.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use station_weather::trend::temperature_trend;
use station_weather::{ForecastSequence, ForecastSlot, WeatherSnapshot};

/// Current conditions plus, optionally, the forecast they came with.
///
/// Records written by older releases hold a bare snapshot with no `current`
/// wrapper; those deserialize with `forecast: None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub current: WeatherSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastSlot>>,
}

impl Observation {
    pub fn new(current: WeatherSnapshot, forecast: Vec<ForecastSlot>) -> Self {
        Self {
            current,
            forecast: Some(forecast),
        }
    }

    /// Observation with no forecast attached.
    pub fn current_only(current: WeatherSnapshot) -> Self {
        Self {
            current,
            forecast: None,
        }
    }

    /// Build from a normalized forecast, using its first slot as current.
    pub fn from_sequence(sequence: &ForecastSequence) -> Option<Self> {
        let current = sequence.current()?;
        Some(Self::new(current, sequence.slots.clone()))
    }

    /// Temperature trend of the attached forecast, if any.
    pub fn trend(&self) -> Option<f64> {
        self.forecast.as_deref().map(temperature_trend)
    }
}

impl<'de> Deserialize<'de> for Observation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Full {
            current: WeatherSnapshot,
            #[serde(default)]
            forecast: Option<Vec<ForecastSlot>>,
        }

        let value = Value::deserialize(deserializer)?;
        let is_full = value
            .as_object()
            .map(|object| object.contains_key("current"))
            .ok_or_else(|| D::Error::custom("observation must be a JSON object"))?;

        if is_full {
            let full: Full = serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(Self {
                current: full.current,
                forecast: full.forecast,
            })
        } else {
            let current: WeatherSnapshot =
                serde_json::from_value(value).map_err(D::Error::custom)?;
            Ok(Self::current_only(current))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_snapshot_is_current_only() {
        let observation: Observation = serde_json::from_value(json!({
            "temperature": 28,
            "rainProbability": 20,
            "weather": "晴時多雲",
            "feelsLike": 29
        }))
        .unwrap();

        assert_eq!(observation.current.temperature, Some(28.0));
        assert_eq!(observation.current.condition.as_deref(), Some("晴時多雲"));
        assert!(observation.forecast.is_none());
        assert_eq!(observation.trend(), None);
    }

    #[test]
    fn test_full_observation_round_trips() {
        let observation: Observation = serde_json::from_value(json!({
            "current": { "temperature": "28", "weather": "多雲" },
            "forecast": [
                {
                    "startTime": "2026-01-07T18:00:00+08:00",
                    "endTime": "2026-01-07T21:00:00+08:00",
                    "temperature": 16.0, "feelsLike": null, "conditionText": null,
                    "conditionCode": null, "rainProbability": null, "humidity": null,
                    "windSpeed": null, "comfort": null
                },
                {
                    "startTime": "2026-01-07T21:00:00+08:00",
                    "endTime": "2026-01-08T00:00:00+08:00",
                    "temperature": 20.0, "feelsLike": null, "conditionText": null,
                    "conditionCode": null, "rainProbability": null, "humidity": null,
                    "windSpeed": null, "comfort": null
                }
            ]
        }))
        .unwrap();

        assert_eq!(observation.trend(), Some(4.0));

        let text = serde_json::to_string(&observation).unwrap();
        let back: Observation = serde_json::from_str(&text).unwrap();
        assert_eq!(back, observation);
    }

    #[test]
    fn test_current_only_omits_forecast_key() {
        let observation = Observation::current_only(WeatherSnapshot::default());
        let value = serde_json::to_value(&observation).unwrap();
        assert!(value.get("forecast").is_none());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(serde_json::from_value::<Observation>(json!("sunny")).is_err());
    }
}
