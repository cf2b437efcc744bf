//! Raw provider payloads.
//!
//! The provider has shipped two naming conventions for the same forecast
//! document. Each gets its own serde model; [`RawPayload`] picks one by probing
//! the structure and both lower into the same [`RawLocation`] form.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::types::PayloadSchema;

/// Offset applied to legacy timestamps, which carry no zone (Taiwan local time).
const LEGACY_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// When a sample applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTime {
    /// Instantaneous reading (`DataTime`)
    Point(DateTime<FixedOffset>),
    /// Reading valid over `[start, end)` (`StartTime`/`EndTime`)
    Interval {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

impl SampleTime {
    /// The instant this sample is anchored at.
    pub fn anchor(&self) -> DateTime<FixedOffset> {
        match self {
            Self::Point(at) => *at,
            Self::Interval { start, .. } => *start,
        }
    }
}

/// One timestamped sample of an element series.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub time: SampleTime,
    /// Element-value objects in provider order
    pub values: Vec<Map<String, Value>>,
}

/// A named element series (temperature, rain probability, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub name: String,
    pub samples: Vec<RawSample>,
}

/// A location record with its element series.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLocation {
    pub name: String,
    pub series: Vec<RawSeries>,
}

/// Common view over the payload variants.
pub trait PayloadShape {
    fn schema(&self) -> PayloadSchema;

    /// All location records, flattened across location groups.
    fn locations(&self) -> Result<Vec<RawLocation>, ParseError>;
}

/// A provider payload in one of its known shapes.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Legacy(LegacyPayload),
    Current(CurrentPayload),
}

impl RawPayload {
    /// Detect the shape of a JSON document and parse it.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let records = value
            .get("records")
            .and_then(Value::as_object)
            .ok_or_else(ParseError::malformed)?;

        if records.contains_key("Locations") {
            let payload: CurrentPayload = serde_json::from_value(value)
                .map_err(|e| ParseError::new(format!("malformed payload: {}", e)))?;
            Ok(Self::Current(payload))
        } else if records.contains_key("locations") {
            let payload: LegacyPayload = serde_json::from_value(value)
                .map_err(|e| ParseError::new(format!("malformed payload: {}", e)))?;
            Ok(Self::Legacy(payload))
        } else {
            Err(ParseError::malformed())
        }
    }

    /// Parse a raw response body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ParseError::new(format!("payload is not JSON: {}", e)))?;
        Self::from_value(value)
    }

    fn shape(&self) -> &dyn PayloadShape {
        match self {
            Self::Legacy(payload) => payload,
            Self::Current(payload) => payload,
        }
    }
}

impl PayloadShape for RawPayload {
    fn schema(&self) -> PayloadSchema {
        self.shape().schema()
    }

    fn locations(&self) -> Result<Vec<RawLocation>, ParseError> {
        self.shape().locations()
    }
}

// Current (PascalCase) schema

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentPayload {
    records: CurrentRecords,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentRecords {
    locations: Vec<CurrentLocationGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentLocationGroup {
    location: Vec<CurrentLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentLocation {
    location_name: String,
    weather_element: Vec<CurrentElement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentElement {
    element_name: String,
    time: Vec<CurrentTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentTime {
    data_time: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    element_value: Value,
}

impl PayloadShape for CurrentPayload {
    fn schema(&self) -> PayloadSchema {
        PayloadSchema::Current
    }

    fn locations(&self) -> Result<Vec<RawLocation>, ParseError> {
        self.records
            .locations
            .iter()
            .flat_map(|group| group.location.iter())
            .map(|location| {
                let series = location
                    .weather_element
                    .iter()
                    .map(|element| {
                        let samples = element
                            .time
                            .iter()
                            .map(|t| {
                                raw_sample(
                                    &element.element_name,
                                    t.data_time.as_deref(),
                                    t.start_time.as_deref(),
                                    t.end_time.as_deref(),
                                    &t.element_value,
                                )
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(RawSeries {
                            name: element.element_name.clone(),
                            samples,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Ok(RawLocation {
                    name: location.location_name.clone(),
                    series,
                })
            })
            .collect()
    }
}

// Legacy (lowerCamel) schema

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPayload {
    records: LegacyRecords,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecords {
    locations: Vec<LegacyLocationGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyLocationGroup {
    location: Vec<LegacyLocation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyLocation {
    location_name: String,
    weather_element: Vec<LegacyElement>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyElement {
    element_name: String,
    time: Vec<LegacyTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTime {
    data_time: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    element_value: Value,
}

impl PayloadShape for LegacyPayload {
    fn schema(&self) -> PayloadSchema {
        PayloadSchema::Legacy
    }

    fn locations(&self) -> Result<Vec<RawLocation>, ParseError> {
        self.records
            .locations
            .iter()
            .flat_map(|group| group.location.iter())
            .map(|location| {
                let series = location
                    .weather_element
                    .iter()
                    .map(|element| {
                        let samples = element
                            .time
                            .iter()
                            .map(|t| {
                                raw_sample(
                                    &element.element_name,
                                    t.data_time.as_deref(),
                                    t.start_time.as_deref(),
                                    t.end_time.as_deref(),
                                    &t.element_value,
                                )
                            })
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(RawSeries {
                            name: element.element_name.clone(),
                            samples,
                        })
                    })
                    .collect::<Result<Vec<_>, ParseError>>()?;
                Ok(RawLocation {
                    name: location.location_name.clone(),
                    series,
                })
            })
            .collect()
    }
}

fn raw_sample(
    element: &str,
    data_time: Option<&str>,
    start_time: Option<&str>,
    end_time: Option<&str>,
    element_value: &Value,
) -> Result<RawSample, ParseError> {
    let time = match (data_time, start_time, end_time) {
        (Some(at), _, _) => SampleTime::Point(parse_timestamp(at)?),
        (None, Some(start), Some(end)) => {
            let start = parse_timestamp(start)?;
            let end = parse_timestamp(end)?;
            if end < start {
                return Err(ParseError::new(format!(
                    "interval in {} ends before it starts",
                    element
                )));
            }
            SampleTime::Interval { start, end }
        }
        _ => {
            return Err(ParseError::new(format!(
                "time entry in {} has neither a data time nor a start/end pair",
                element
            )))
        }
    };

    Ok(RawSample {
        time,
        values: value_objects(element_value),
    })
}

/// Element values arrive as an array of objects, occasionally as a bare object.
fn value_objects(value: &Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        Value::Object(object) => vec![object.clone()],
        _ => Vec::new(),
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less legacy one as UTC+8.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at);
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ParseError::new(format!("invalid timestamp: {}", raw)))?;

    let offset = FixedOffset::east_opt(LEGACY_UTC_OFFSET_SECS)
        .ok_or_else(|| ParseError::new("invalid legacy UTC offset"))?;

    naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| ParseError::new(format!("ambiguous timestamp: {}", raw)))
}
