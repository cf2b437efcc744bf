//! Directional signals derived from a forecast.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::types::ForecastSlot;

/// Coarse weather category used for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCategory {
    Rainy,
    Sunny,
    Cloudy,
    Other,
}

// Checked in order; the first category with a matching keyword wins.
const RAINY_KEYWORDS: &[&str] = &["雨", "雷", "rain", "thunder", "shower", "drizzle"];
const SUNNY_KEYWORDS: &[&str] = &["晴", "clear", "sunny"];
const CLOUDY_KEYWORDS: &[&str] = &["多雲", "陰", "cloud", "overcast"];

/// Classify a condition description.
///
/// `晴時多雲` is sunny: rain and thunder are checked before clear skies, and
/// clear skies before clouds.
pub fn category_of(condition: &str) -> WeatherCategory {
    let lowered = condition.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if has(RAINY_KEYWORDS) {
        WeatherCategory::Rainy
    } else if has(SUNNY_KEYWORDS) {
        WeatherCategory::Sunny
    } else if has(CLOUDY_KEYWORDS) {
        WeatherCategory::Cloudy
    } else {
        WeatherCategory::Other
    }
}

/// Last slot's temperature minus the first slot's.
///
/// Zero for fewer than two slots. A missing temperature counts as zero here.
pub fn temperature_trend(slots: &[ForecastSlot]) -> f64 {
    match slots {
        [first, .., last] => last.temperature.unwrap_or(0.0) - first.temperature.unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Sign of a temperature trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Warming,
    Cooling,
    Steady,
}

impl TrendDirection {
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Warming
        } else if delta < 0.0 {
            Self::Cooling
        } else {
            Self::Steady
        }
    }
}

/// Change of weather category between two consecutive slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTransition {
    pub at: DateTime<FixedOffset>,
    pub from: WeatherCategory,
    pub to: WeatherCategory,
}

/// Category changes along the forecast. Slots without a condition are skipped.
pub fn transitions(slots: &[ForecastSlot]) -> Vec<CategoryTransition> {
    let categorized: Vec<(DateTime<FixedOffset>, WeatherCategory)> = slots
        .iter()
        .filter_map(|slot| {
            slot.condition_text
                .as_deref()
                .map(|text| (slot.start_time, category_of(text)))
        })
        .collect();

    categorized
        .windows(2)
        .filter_map(|pair| match pair {
            [(_, from), (at, to)] if from != to => Some(CategoryTransition {
                at: *at,
                from: *from,
                to: *to,
            }),
            _ => None,
        })
        .collect()
}

/// Trend overview handed to the advice generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub temperature_delta: f64,
    pub direction: TrendDirection,
    pub transitions: Vec<CategoryTransition>,
}

pub fn summarize(slots: &[ForecastSlot]) -> TrendSummary {
    let temperature_delta = temperature_trend(slots);
    TrendSummary {
        temperature_delta,
        direction: TrendDirection::of(temperature_delta),
        transitions: transitions(slots),
    }
}
