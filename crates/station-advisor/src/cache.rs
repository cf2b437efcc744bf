//! Single-slot advisory cache.
//!
//! One record (advice text, creation time, observation) lives under three
//! fixed keys. Validity is decided on read: a record is served while it is
//! younger than the validity window and the new observation is not
//! significantly different from the cached one. Nothing is evicted eagerly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use station_weather::trend::{category_of, TrendDirection, WeatherCategory};

use crate::observation::Observation;
use crate::store::KeyValueStore;

pub const ADVICE_KEY: &str = "advisor.advice";
pub const TIMESTAMP_KEY: &str = "advisor.created_at";
pub const OBSERVATION_KEY: &str = "advisor.observation";

pub const DEFAULT_VALIDITY_MINUTES: i64 = 60;

pub const TEMPERATURE_THRESHOLD: f64 = 3.0;
pub const RAIN_PROBABILITY_THRESHOLD: f64 = 30.0;
pub const FEELS_LIKE_THRESHOLD: f64 = 4.0;
pub const TREND_FLIP_THRESHOLD: f64 = 2.0;

/// Why a cached advisory no longer applies.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeReason {
    Temperature { delta: f64 },
    RainProbability { delta: f64 },
    Category { from: WeatherCategory, to: WeatherCategory },
    FeelsLike { delta: f64 },
    TrendFlip { old: f64, new: f64 },
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature { delta } => write!(f, "temperature changed by {:.1}", delta),
            Self::RainProbability { delta } => {
                write!(f, "rain probability changed by {:.0}", delta)
            }
            Self::Category { from, to } => write!(f, "weather changed from {:?} to {:?}", from, to),
            Self::FeelsLike { delta } => write!(f, "feels-like changed by {:.1}", delta),
            Self::TrendFlip { old, new } => write!(f, "trend flipped from {:.1} to {:.1}", old, new),
        }
    }
}

/// First threshold crossed between two observations, if any.
///
/// Missing readings count as zero. The trend check runs only when both
/// observations carry a forecast.
pub fn significant_change(old: &Observation, new: &Observation) -> Option<ChangeReason> {
    let (was, now) = (&old.current, &new.current);
    let reading = |v: Option<f64>| v.unwrap_or(0.0);

    let delta = reading(now.temperature) - reading(was.temperature);
    if delta.abs() > TEMPERATURE_THRESHOLD {
        return Some(ChangeReason::Temperature { delta });
    }

    let delta = reading(now.rain_probability) - reading(was.rain_probability);
    if delta.abs() > RAIN_PROBABILITY_THRESHOLD {
        return Some(ChangeReason::RainProbability { delta });
    }

    let from = category_of(was.condition.as_deref().unwrap_or_default());
    let to = category_of(now.condition.as_deref().unwrap_or_default());
    if from != to {
        return Some(ChangeReason::Category { from, to });
    }

    let delta = reading(now.feels_like) - reading(was.feels_like);
    if delta.abs() > FEELS_LIKE_THRESHOLD {
        return Some(ChangeReason::FeelsLike { delta });
    }

    if let (Some(old_trend), Some(new_trend)) = (old.trend(), new.trend()) {
        if TrendDirection::of(old_trend) != TrendDirection::of(new_trend)
            && new_trend.abs() > TREND_FLIP_THRESHOLD
        {
            return Some(ChangeReason::TrendFlip {
                old: old_trend,
                new: new_trend,
            });
        }
    }

    None
}

/// Cached advisory backed by a [`KeyValueStore`].
///
/// Store failures never surface: reads degrade to a miss and writes to a
/// no-op, both logged.
#[derive(Clone)]
pub struct AdvisoryCache {
    store: Arc<dyn KeyValueStore>,
    validity: Duration,
}

impl std::fmt::Debug for AdvisoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryCache")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl AdvisoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            validity: Duration::minutes(DEFAULT_VALIDITY_MINUTES),
        }
    }

    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Cached advice for `observation`, if still valid now.
    pub async fn lookup(&self, observation: &Observation) -> Option<String> {
        self.lookup_at(observation, Utc::now()).await
    }

    pub async fn lookup_at(&self, observation: &Observation, now: DateTime<Utc>) -> Option<String> {
        let advice = self.read(ADVICE_KEY).await?;
        let timestamp = self.read(TIMESTAMP_KEY).await?;
        let cached = self.read(OBSERVATION_KEY).await?;

        let created_at = match DateTime::parse_from_rfc3339(&timestamp) {
            Ok(at) => at.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable advisory timestamp, treating as miss");
                return None;
            }
        };

        if now - created_at > self.validity {
            tracing::debug!(%created_at, "Cached advisory expired");
            return None;
        }

        let cached: Observation = match serde_json::from_str(&cached) {
            Ok(observation) => observation,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable cached observation, treating as miss");
                return None;
            }
        };

        if let Some(reason) = significant_change(&cached, observation) {
            tracing::debug!(%reason, "Weather changed, cached advisory no longer applies");
            return None;
        }

        tracing::debug!("Advisory cache hit");
        Some(advice)
    }

    /// Replace the cached record.
    pub async fn store(&self, advice: &str, observation: &Observation) {
        self.store_at(advice, observation, Utc::now()).await;
    }

    /// Write order keeps a half-written record detectable: the timestamp is
    /// removed first and written last.
    pub async fn store_at(&self, advice: &str, observation: &Observation, now: DateTime<Utc>) {
        let serialized = match serde_json::to_string(observation) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize observation, advisory not cached");
                return;
            }
        };

        if let Err(e) = self.store.remove(TIMESTAMP_KEY).await {
            tracing::warn!(error = %e, "Advisory cache write failed");
            return;
        }

        let writes = [
            (ADVICE_KEY, advice.to_string()),
            (OBSERVATION_KEY, serialized),
            (TIMESTAMP_KEY, now.to_rfc3339()),
        ];
        for (key, value) in &writes {
            if let Err(e) = self.store.set(key, value).await {
                tracing::warn!(error = %e, key, "Advisory cache write failed");
                return;
            }
        }

        tracing::debug!("Advisory cached");
    }

    /// Remove the cached record.
    pub async fn clear(&self) {
        for key in [TIMESTAMP_KEY, ADVICE_KEY, OBSERVATION_KEY] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(error = %e, key, "Failed to clear advisory cache entry");
            }
        }
        tracing::info!("Advisory cache cleared");
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                tracing::debug!(key, "Advisory cache record missing or incomplete");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, key, "Advisory cache read failed, treating as miss");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use station_weather::{ForecastSlot, WeatherSnapshot};

    fn snapshot(temperature: f64, rain: f64, condition: &str, feels_like: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: Some(temperature),
            feels_like: Some(feels_like),
            condition: Some(condition.to_string()),
            rain_probability: Some(rain),
            ..WeatherSnapshot::default()
        }
    }

    fn observation_a() -> Observation {
        Observation::current_only(snapshot(28.0, 20.0, "晴時多雲", 29.0))
    }

    fn forecast(temperatures: &[f64]) -> Vec<ForecastSlot> {
        let start = DateTime::parse_from_rfc3339("2026-01-07T00:00:00+08:00").unwrap();
        temperatures
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let at = start + Duration::hours(3 * i as i64);
                ForecastSlot {
                    start_time: at,
                    end_time: at + Duration::hours(3),
                    temperature: Some(*t),
                    feels_like: None,
                    condition_text: None,
                    condition_code: None,
                    rain_probability: None,
                    humidity: None,
                    wind_speed: None,
                    comfort: None,
                }
            })
            .collect()
    }

    fn cache() -> (AdvisoryCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (AdvisoryCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_empty_cache_misses() {
        let (cache, _) = cache();
        assert_eq!(cache.lookup(&observation_a()).await, None);
    }

    #[tokio::test]
    async fn test_hit_and_temperature_thresholds() {
        let (cache, _) = cache();
        cache.store("記得防曬", &observation_a()).await;

        assert_eq!(
            cache.lookup(&observation_a()).await.as_deref(),
            Some("記得防曬")
        );

        let b = Observation::current_only(snapshot(32.0, 20.0, "晴時多雲", 29.0));
        assert_eq!(cache.lookup(&b).await, None);

        let c = Observation::current_only(snapshot(30.5, 20.0, "晴時多雲", 29.0));
        assert_eq!(cache.lookup(&c).await.as_deref(), Some("記得防曬"));
    }

    #[test]
    fn test_significant_change_reasons() {
        let a = observation_a();

        let rain = Observation::current_only(snapshot(28.0, 51.0, "晴時多雲", 29.0));
        assert!(matches!(
            significant_change(&a, &rain),
            Some(ChangeReason::RainProbability { .. })
        ));

        let rain_edge = Observation::current_only(snapshot(28.0, 50.0, "晴時多雲", 29.0));
        assert_eq!(significant_change(&a, &rain_edge), None);

        let category = Observation::current_only(snapshot(28.0, 20.0, "短暫雨", 29.0));
        assert_eq!(
            significant_change(&a, &category),
            Some(ChangeReason::Category {
                from: WeatherCategory::Sunny,
                to: WeatherCategory::Rainy
            })
        );

        let feels = Observation::current_only(snapshot(28.0, 20.0, "晴時多雲", 33.5));
        assert!(matches!(
            significant_change(&a, &feels),
            Some(ChangeReason::FeelsLike { .. })
        ));

        let missing = Observation::current_only(WeatherSnapshot {
            condition: Some("晴時多雲".into()),
            ..WeatherSnapshot::default()
        });
        assert!(matches!(
            significant_change(&a, &missing),
            Some(ChangeReason::Temperature { .. })
        ));
    }

    #[tokio::test]
    async fn test_trend_flip_misses() {
        let (cache, _) = cache();
        let current = snapshot(28.0, 20.0, "晴時多雲", 29.0);

        let warming = Observation::new(current.clone(), forecast(&[20.0, 22.0, 24.0]));
        assert_eq!(warming.trend(), Some(4.0));
        cache.store("天氣轉熱", &warming).await;

        let cooling = Observation::new(current.clone(), forecast(&[24.0, 22.0, 21.0]));
        assert_eq!(cache.lookup(&cooling).await, None);

        let slight = Observation::new(current.clone(), forecast(&[24.0, 22.0]));
        assert_eq!(cache.lookup(&slight).await.as_deref(), Some("天氣轉熱"));

        // Trend is ignored when one side has no forecast
        let bare = Observation::current_only(current);
        assert_eq!(cache.lookup(&bare).await.as_deref(), Some("天氣轉熱"));
    }

    #[test]
    fn test_flip_from_flat_trend() {
        let current = snapshot(28.0, 20.0, "晴時多雲", 29.0);
        let flat = Observation::new(current.clone(), forecast(&[20.0, 20.0]));
        let rising = Observation::new(current, forecast(&[20.0, 23.0]));
        assert!(matches!(
            significant_change(&flat, &rising),
            Some(ChangeReason::TrendFlip { .. })
        ));
    }

    #[tokio::test]
    async fn test_expiry() {
        let (cache, _) = cache();
        let created = Utc::now();
        cache
            .store_at("出門帶傘", &observation_a(), created)
            .await;

        let within = created + Duration::minutes(60);
        assert!(cache.lookup_at(&observation_a(), within).await.is_some());

        let after = created + Duration::minutes(61);
        assert!(cache.lookup_at(&observation_a(), after).await.is_none());

        let short = cache.clone().with_validity(Duration::minutes(5));
        assert!(short
            .lookup_at(&observation_a(), created + Duration::minutes(6))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_incomplete_record_misses() {
        let (cache, store) = cache();
        cache.store("記得防曬", &observation_a()).await;
        assert_eq!(store.len(), 3);

        store.remove(TIMESTAMP_KEY).await.unwrap();
        assert_eq!(cache.lookup(&observation_a()).await, None);

        cache.store("記得防曬", &observation_a()).await;
        store.remove(OBSERVATION_KEY).await.unwrap();
        assert_eq!(cache.lookup(&observation_a()).await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entries_miss() {
        let (cache, store) = cache();
        cache.store("記得防曬", &observation_a()).await;

        store.set(OBSERVATION_KEY, "{not json").await.unwrap();
        assert_eq!(cache.lookup(&observation_a()).await, None);

        cache.store("記得防曬", &observation_a()).await;
        store.set(TIMESTAMP_KEY, "yesterday").await.unwrap();
        assert_eq!(cache.lookup(&observation_a()).await, None);
    }

    #[tokio::test]
    async fn test_legacy_bare_observation_record() {
        let (cache, store) = cache();
        store.set(ADVICE_KEY, "舊的建議").await.unwrap();
        store
            .set(
                OBSERVATION_KEY,
                r#"{"temperature":"28","rainProbability":"20","weather":"晴時多雲","feelsLike":"29"}"#,
            )
            .await
            .unwrap();
        store.set(TIMESTAMP_KEY, &Utc::now().to_rfc3339()).await.unwrap();

        let with_forecast = Observation::new(
            snapshot(28.0, 20.0, "晴時多雲", 29.0),
            forecast(&[30.0, 20.0]),
        );
        assert_eq!(
            cache.lookup(&with_forecast).await.as_deref(),
            Some("舊的建議")
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let (cache, store) = cache();
        cache.store("記得防曬", &observation_a()).await;
        cache.clear().await;

        assert!(store.is_empty());
        assert_eq!(cache.lookup(&observation_a()).await, None);
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let cache = AdvisoryCache::new(Arc::new(FailingStore));
        cache.store("記得防曬", &observation_a()).await;
        cache.clear().await;
        assert_eq!(cache.lookup(&observation_a()).await, None);
    }
}
