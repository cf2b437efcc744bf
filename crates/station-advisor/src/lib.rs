//! Cached weather advice for Time Station
//!
//! Produces a short advisory sentence for the current weather, reusing the
//! last one until it expires or the weather changes significantly.

pub mod cache;
pub mod error;
pub mod generator;
pub mod observation;
pub mod prompt;
pub mod service;
pub mod store;

pub use cache::{significant_change, AdvisoryCache, ChangeReason};
pub use error::{GeneratorError, StoreError};
pub use generator::{AdviceGenerator, GeminiGenerator, OpenAiGenerator};
pub use observation::Observation;
pub use service::{Advice, AdviceSource, AdvisoryService, FALLBACK_MESSAGES};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
