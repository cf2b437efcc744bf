//! Cache-first advice with a friendly fallback.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::{info, warn};

use crate::cache::AdvisoryCache;
use crate::error::GeneratorError;
use crate::generator::AdviceGenerator;
use crate::observation::Observation;
use crate::prompt::{user_message, SYSTEM_PROMPT};

/// Shown when no advice can be generated. Never cached.
pub const FALLBACK_MESSAGES: [&str; 4] = [
    "目前無法連線，但祝您有個美好的一天！",
    "網路似乎不穩定，不過別忘了保持好心情！",
    "暫時無法取得建議，但記得照顧好自己喔！",
    "連線中斷了，但祝您今天一切順利！",
];

/// Where a piece of advice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceSource {
    Cache,
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub text: String,
    pub source: AdviceSource,
}

pub struct AdvisoryService {
    cache: AdvisoryCache,
    generator: Arc<dyn AdviceGenerator>,
}

impl AdvisoryService {
    pub fn new(cache: AdvisoryCache, generator: Arc<dyn AdviceGenerator>) -> Self {
        Self { cache, generator }
    }

    pub fn cache(&self) -> &AdvisoryCache {
        &self.cache
    }

    /// Advice text for an observation. Never fails.
    pub async fn get_advice(&self, observation: &Observation) -> String {
        self.advise(observation).await.text
    }

    /// Like [`get_advice`](Self::get_advice), also reporting the source.
    pub async fn advise(&self, observation: &Observation) -> Advice {
        if let Some(text) = self.cache.lookup(observation).await {
            info!("Using cached advice");
            return Advice {
                text,
                source: AdviceSource::Cache,
            };
        }

        match self.generate(observation).await {
            Ok(text) => {
                self.cache.store(&text, observation).await;
                info!(generator = self.generator.name(), "Advice generated");
                Advice {
                    text,
                    source: AdviceSource::Generated,
                }
            }
            Err(e) => {
                warn!(error = %e, generator = self.generator.name(), "Advice generation failed");
                Advice {
                    text: random_fallback().to_string(),
                    source: AdviceSource::Fallback,
                }
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    async fn generate(&self, observation: &Observation) -> Result<String, GeneratorError> {
        let message = user_message(observation)?;
        let text = self.generator.generate(SYSTEM_PROMPT, &message).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

pub fn random_fallback() -> &'static str {
    FALLBACK_MESSAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_MESSAGES[0])
}
