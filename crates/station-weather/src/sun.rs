//! Sunrise and sunset payloads.

use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::types::SunTimes;

/// Parse a sunrise/sunset response into days in provider order.
///
/// Returns `None` when the expected structure is missing or any day has an
/// unreadable date or time.
pub fn parse_sun_times(payload: &Value) -> Option<Vec<SunTimes>> {
    let location = payload
        .get("records")?
        .get("locations")?
        .get("location")?
        .as_array()?
        .first()?;

    location
        .get("time")?
        .as_array()?
        .iter()
        .map(|day| {
            Some(SunTimes {
                date: NaiveDate::parse_from_str(day.get("Date")?.as_str()?.trim(), "%Y-%m-%d")
                    .ok()?,
                sunrise: parse_clock(day.get("SunRiseTime")?.as_str()?)?,
                sunset: parse_clock(day.get("SunSetTime")?.as_str()?)?,
            })
        })
        .collect()
}

/// County name attached to a sunrise/sunset response.
pub fn county_name(payload: &Value) -> Option<&str> {
    payload
        .get("records")?
        .get("locations")?
        .get("location")?
        .as_array()?
        .first()?
        .get("CountyName")?
        .as_str()
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
