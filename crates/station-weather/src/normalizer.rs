//! Turns provider payloads into an ordered list of [`ForecastSlot`]s.
//!
//! The temperature series is the reference timeline: one slot per temperature
//! sample. Every other element is resolved onto that timeline, either by the
//! `[start, end)` interval containing the slot time or by the most recent point
//! sample, which stays valid until the next one (or for three hours when it is
//! the last).

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset};
use serde_json::{Map, Value};

use crate::catalog::{CodeCatalog, CodeKey};
use crate::error::ParseError;
use crate::payload::{PayloadShape, RawLocation, RawPayload, RawSample, RawSeries, SampleTime};
use crate::types::{lenient, ForecastSequence, ForecastSlot, LocationMatch};

/// How long the last point sample of a series remains valid.
pub const POINT_SAMPLE_VALIDITY_HOURS: i64 = 3;

/// Logical forecast elements and the names the provider has used for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Temperature,
    FeelsLike,
    Condition,
    RainProbability,
    Humidity,
    WindSpeed,
    Comfort,
}

impl Element {
    pub const ALL: [Element; 7] = [
        Element::Temperature,
        Element::FeelsLike,
        Element::Condition,
        Element::RainProbability,
        Element::Humidity,
        Element::WindSpeed,
        Element::Comfort,
    ];

    /// Series names (current Chinese name first, then legacy codes).
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Temperature => &["溫度", "T"],
            Self::FeelsLike => &["體感溫度", "AT"],
            Self::Condition => &["天氣現象", "Wx"],
            Self::RainProbability => &[
                "3小時降雨機率",
                "PoP3h",
                "PoP6h",
                "PoP12h",
                "12小時降雨機率",
            ],
            Self::Humidity => &["相對濕度", "RH"],
            Self::WindSpeed => &["風速", "WS"],
            Self::Comfort => &["舒適度指數", "CI"],
        }
    }

    /// Field read when a value object has no `value` key.
    pub fn override_field(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::FeelsLike => "ApparentTemperature",
            Self::Condition => "Weather",
            Self::RainProbability => "ProbabilityOfPrecipitation",
            Self::Humidity => "RelativeHumidity",
            Self::WindSpeed => "WindSpeed",
            Self::Comfort => "ComfortIndexDescription",
        }
    }

    pub fn from_series_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|element| element.aliases().contains(&name))
    }
}

/// Normalizes provider payloads against a condition catalog.
#[derive(Debug, Clone, Copy)]
pub struct ForecastNormalizer<'a> {
    catalog: &'a CodeCatalog,
}

impl Default for ForecastNormalizer<'static> {
    fn default() -> Self {
        Self::new(CodeCatalog::global())
    }
}

impl<'a> ForecastNormalizer<'a> {
    pub fn new(catalog: &'a CodeCatalog) -> Self {
        Self { catalog }
    }

    /// Parse a raw JSON body and normalize it.
    pub fn normalize_value(
        &self,
        payload: Value,
        requested_location: &str,
    ) -> Result<ForecastSequence, ParseError> {
        let payload = RawPayload::from_value(payload)?;
        self.normalize(&payload, requested_location)
    }

    /// Normalize a payload for the requested location.
    ///
    /// A location without a temperature series yields an empty sequence.
    pub fn normalize(
        &self,
        payload: &RawPayload,
        requested_location: &str,
    ) -> Result<ForecastSequence, ParseError> {
        let schema = payload.schema();
        let locations = payload.locations()?;
        let (location, location_match) = select_location(&locations, requested_location)?;

        let series = index_series(&location.series);
        let Some(reference) = series.get(&Element::Temperature) else {
            tracing::debug!(location = %location.name, "No temperature series, nothing to show");
            return Ok(ForecastSequence {
                location_name: Some(location.name.clone()),
                location_match,
                schema,
                slots: Vec::new(),
            });
        };

        let mut slots: Vec<ForecastSlot> = reference
            .samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                let next = reference.samples.get(index + 1);
                self.build_slot(sample, next, &series)
            })
            .collect();

        // Provider output is chronological already; sort is stable for ties.
        slots.sort_by_key(|slot| slot.start_time);

        tracing::debug!(
            location = %location.name,
            slots = slots.len(),
            ?schema,
            "Normalized forecast"
        );

        Ok(ForecastSequence {
            location_name: Some(location.name.clone()),
            location_match,
            schema,
            slots,
        })
    }

    fn build_slot(
        &self,
        reference: &RawSample,
        next: Option<&RawSample>,
        series: &HashMap<Element, &RawSeries>,
    ) -> ForecastSlot {
        let (start_time, end_time) = slot_window(reference, next);

        let resolve = |element: Element| {
            if element == Element::Temperature {
                return reference.values.first();
            }
            series
                .get(&element)
                .and_then(|s| resolve_sample(s, start_time))
                .and_then(|sample| sample.values.first())
        };

        let condition_sample = series
            .get(&Element::Condition)
            .and_then(|s| resolve_sample(s, start_time));
        let condition_text = condition_sample
            .and_then(|sample| sample.values.first())
            .and_then(|object| extract(object, Element::Condition))
            .and_then(lenient::value_as_text);
        let condition_code = condition_sample
            .and_then(condition_code_of)
            .or_else(|| {
                condition_text
                    .as_deref()
                    .and_then(|text| self.catalog.code_for_label(text))
                    .and_then(format_code)
            });

        let number = |element: Element| {
            resolve(element)
                .and_then(|object| extract(object, element))
                .and_then(lenient::value_as_number)
        };
        let text = |element: Element| {
            resolve(element)
                .and_then(|object| extract(object, element))
                .and_then(lenient::value_as_text)
        };

        ForecastSlot {
            start_time,
            end_time,
            temperature: number(Element::Temperature),
            feels_like: number(Element::FeelsLike),
            condition_text,
            condition_code,
            rain_probability: number(Element::RainProbability),
            humidity: number(Element::Humidity),
            wind_speed: text(Element::WindSpeed),
            comfort: text(Element::Comfort),
        }
    }
}

fn select_location<'l>(
    locations: &'l [RawLocation],
    requested: &str,
) -> Result<(&'l RawLocation, LocationMatch), ParseError> {
    let requested = requested.trim();

    if let Some(exact) = locations.iter().find(|l| l.name.trim() == requested) {
        return Ok((exact, LocationMatch::Exact));
    }

    match locations {
        [] => Err(ParseError::new("payload contains no locations")),
        [only] => Ok((only, LocationMatch::SoleCandidate)),
        [first, ..] => {
            tracing::warn!(
                requested,
                using = %first.name,
                candidates = locations.len(),
                "Requested location not in payload, falling back to first location"
            );
            Ok((
                first,
                LocationMatch::Fallback {
                    requested: requested.to_string(),
                },
            ))
        }
    }
}

/// Map series by logical element. The first series seen for an element wins.
fn index_series(series: &[RawSeries]) -> HashMap<Element, &RawSeries> {
    let mut index = HashMap::new();
    for s in series {
        match Element::from_series_name(&s.name) {
            Some(element) => {
                index.entry(element).or_insert(s);
            }
            None => tracing::trace!(name = %s.name, "Ignoring unknown element series"),
        }
    }
    index
}

fn point_validity() -> Duration {
    Duration::hours(POINT_SAMPLE_VALIDITY_HOURS)
}

fn slot_window(
    reference: &RawSample,
    next: Option<&RawSample>,
) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    match reference.time {
        SampleTime::Interval { start, end } => (start, end),
        SampleTime::Point(at) => {
            let ceiling = at + point_validity();
            let end = next
                .map(|n| n.time.anchor())
                .filter(|next_at| *next_at >= at)
                .map_or(ceiling, |next_at| next_at.min(ceiling));
            (at, end)
        }
    }
}

/// Find the sample of `series` that applies at `at`.
///
/// Intervals are half-open; among overlapping intervals the one that started
/// most recently wins, first listed on ties. A point sample applies until the
/// next point sample starts; the last one applies for up to three hours,
/// inclusive.
fn resolve_sample(series: &RawSeries, at: DateTime<FixedOffset>) -> Option<&RawSample> {
    let interval = series
        .samples
        .iter()
        .rev()
        .filter_map(|sample| match sample.time {
            SampleTime::Interval { start, end } if start <= at && at < end => {
                Some((start, sample))
            }
            _ => None,
        })
        .max_by_key(|(start, _)| *start);
    if let Some((_, sample)) = interval {
        return Some(sample);
    }

    let mut points: Vec<(DateTime<FixedOffset>, &RawSample)> = series
        .samples
        .iter()
        .filter_map(|sample| match sample.time {
            SampleTime::Point(t) => Some((t, sample)),
            SampleTime::Interval { .. } => None,
        })
        .collect();
    points.sort_by_key(|(t, _)| *t);

    let position = points.partition_point(|(t, _)| *t <= at);
    let (sample_at, sample) = *points.get(position.checked_sub(1)?)?;

    match points.get(position) {
        Some(_) => Some(sample),
        None if at - sample_at <= point_validity() => Some(sample),
        None => None,
    }
}

/// Pull an element's value out of a value object.
///
/// Preference: a literal `value` field, then the element's override field, then
/// whatever property comes first. The last rule is a compatibility heuristic
/// and can pick the wrong field for unexpected shapes.
fn extract(object: &Map<String, Value>, element: Element) -> Option<&Value> {
    object
        .get("value")
        .or_else(|| object.get(element.override_field()))
        .or_else(|| object.values().next())
}

/// Condition code carried by the payload itself.
fn condition_code_of(sample: &RawSample) -> Option<String> {
    let current = sample
        .values
        .first()
        .and_then(|object| object.get("WeatherCode"))
        .and_then(lenient::value_as_text);
    let legacy = || {
        sample
            .values
            .get(1)
            .and_then(|object| object.get("value"))
            .and_then(lenient::value_as_text)
    };
    current
        .or_else(legacy)
        .filter(|code| !CodeKey::parse(code).is_empty())
}

fn format_code(code: CodeKey) -> Option<String> {
    match code {
        CodeKey::Code(n) => Some(format!("{:02}", n)),
        CodeKey::Empty => None,
    }
}
