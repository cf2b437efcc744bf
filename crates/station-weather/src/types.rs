use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Which of the provider's field-naming conventions a payload uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadSchema {
    /// lowerCamel keys (`records.locations[].location[].weatherElement`)
    Legacy,
    /// PascalCase keys (`records.Locations[].Location[].WeatherElement`)
    Current,
}

/// How the requested location name was matched against the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LocationMatch {
    /// A location with exactly the requested name was present
    Exact,
    /// No exact match, but the payload held a single location
    SoleCandidate,
    /// No exact match among several locations; the first one was used
    Fallback { requested: String },
}

/// One normalized forecast record for a time window.
///
/// Numeric fields are `None` when the provider did not report them; they are
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSlot {
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub condition_text: Option<String>,
    pub condition_code: Option<String>,
    pub rain_probability: Option<f64>,
    pub humidity: Option<f64>,
    /// Beaufort scale or m/s as reported (may be a range such as `2-3`)
    pub wind_speed: Option<String>,
    /// Descriptive comfort index (e.g. `舒適`)
    pub comfort: Option<String>,
}

/// Ordered forecast produced for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSequence {
    pub location_name: Option<String>,
    pub location_match: LocationMatch,
    pub schema: PayloadSchema,
    pub slots: Vec<ForecastSlot>,
}

impl ForecastSequence {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForecastSlot> {
        self.slots.iter()
    }

    /// Conditions of the earliest slot, used as "current" weather.
    pub fn current(&self) -> Option<WeatherSnapshot> {
        self.slots.first().map(WeatherSnapshot::from)
    }
}

/// Point-in-time weather used as the "current" half of an observation.
///
/// Deserialization is lenient: cached observations written by older releases
/// stored provider strings (`"28"`) where numbers are now expected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    #[serde(default, deserialize_with = "lenient::number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub feels_like: Option<f64>,
    #[serde(rename = "weather", default, deserialize_with = "lenient::text")]
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rain_probability: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub wind_speed: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub comfort: Option<String>,
}

impl From<&ForecastSlot> for WeatherSnapshot {
    fn from(slot: &ForecastSlot) -> Self {
        Self {
            temperature: slot.temperature,
            feels_like: slot.feels_like,
            condition: slot.condition_text.clone(),
            rain_probability: slot.rain_probability,
            humidity: slot.humidity,
            wind_speed: slot.wind_speed.clone(),
            comfort: slot.comfort.clone(),
        }
    }
}

/// Sunrise and sunset for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub date: NaiveDate,
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// Serde helpers accepting either numbers or numeric strings.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_as_number))
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(value_as_text))
    }

    pub fn value_as_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn value_as_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use serde_json::{json, Value};

    fn slot() -> ForecastSlot {
        let start = DateTime::parse_from_rfc3339("2026-01-07T18:00:00+08:00").unwrap();
        ForecastSlot {
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            temperature: Some(16.0),
            feels_like: None,
            condition_text: Some("多雲".to_string()),
            condition_code: Some("04".to_string()),
            rain_probability: Some(20.0),
            humidity: None,
            wind_speed: Some("2-3".to_string()),
            comfort: None,
        }
    }

    #[test]
    fn test_slot_serializes_missing_values_as_null() {
        let value = serde_json::to_value(slot()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 10);
        assert_eq!(object["feelsLike"], Value::Null);
        assert_eq!(object["humidity"], Value::Null);
        assert_eq!(object["startTime"], json!("2026-01-07T18:00:00+08:00"));
    }

    #[test]
    fn test_snapshot_from_slot() {
        let snapshot = WeatherSnapshot::from(&slot());
        assert_eq!(snapshot.temperature, Some(16.0));
        assert_eq!(snapshot.condition.as_deref(), Some("多雲"));
        assert_eq!(snapshot.feels_like, None);
    }

    #[test]
    fn test_snapshot_accepts_string_numbers() {
        let snapshot: WeatherSnapshot = serde_json::from_value(json!({
            "temperature": "28",
            "weather": "晴時多雲",
            "feelsLike": 29,
            "rainProbability": " 20 ",
            "windSpeed": 3,
            "comfort": ""
        }))
        .unwrap();

        assert_eq!(snapshot.temperature, Some(28.0));
        assert_eq!(snapshot.feels_like, Some(29.0));
        assert_eq!(snapshot.rain_probability, Some(20.0));
        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.wind_speed.as_deref(), Some("3"));
        assert_eq!(snapshot.comfort, None);
    }

    #[test]
    fn test_snapshot_ignores_non_numeric_values() {
        let snapshot: WeatherSnapshot =
            serde_json::from_value(json!({ "temperature": "-", "humidity": null })).unwrap();
        assert_eq!(snapshot.temperature, None);
        assert_eq!(snapshot.humidity, None);
    }

    #[test]
    fn test_location_match_serialization() {
        let value = serde_json::to_value(LocationMatch::Fallback {
            requested: "新竹市".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "kind": "fallback", "requested": "新竹市" }));
    }
}
