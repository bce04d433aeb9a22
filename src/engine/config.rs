use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::StopWords;
use crate::error::{LexstoreError, Result};
use crate::lexical::scoring::{Bm25Params, DEFAULT_B, DEFAULT_EPSILON, DEFAULT_K1};

/// Default number of results when a search request does not set `k`.
pub const DEFAULT_TOP_K: usize = 10;

/// Configuration for the engine.
///
/// Missing keys take their defaults and unknown keys are ignored, so a
/// configuration written for a newer version still loads. Known keys with
/// out-of-range values are rejected by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// BM25 term-frequency saturation (`>= 0`).
    pub k1: f64,
    /// BM25 length normalization (`0..=1`).
    pub b: f64,
    /// IDF floor factor (`>= 0`).
    pub epsilon: f64,
    /// Result count used when a search does not specify `k`.
    pub top_k_default: usize,
    /// Run batches all-or-nothing instead of reporting per item.
    pub strict_batch: bool,
    /// Snapshot file loaded on startup and written by `flush`.
    pub index_path: Option<PathBuf>,
    /// Keep token positions in postings.
    pub store_positions: bool,
    /// Stop words removed at index and query time.
    pub stop_words: StopWords,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            epsilon: DEFAULT_EPSILON,
            top_k_default: DEFAULT_TOP_K,
            strict_batch: false,
            index_path: None,
            store_positions: false,
            stop_words: StopWords::None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| LexstoreError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert and validate a JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: EngineConfig = serde_json::from_value(value)
            .map_err(|e| LexstoreError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
            epsilon: self.epsilon,
        }
    }

    /// Fail fast on out-of-range values.
    pub fn validate(&self) -> Result<()> {
        self.bm25_params().validate()?;
        if self.top_k_default == 0 {
            return Err(LexstoreError::invalid_config(
                "top_k_default must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn k1(mut self, k1: f64) -> Self {
        self.config.k1 = k1;
        self
    }

    pub fn b(mut self, b: f64) -> Self {
        self.config.b = b;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn top_k_default(mut self, k: usize) -> Self {
        self.config.top_k_default = k;
        self
    }

    pub fn strict_batch(mut self, strict: bool) -> Self {
        self.config.strict_batch = strict;
        self
    }

    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = Some(path.into());
        self
    }

    pub fn store_positions(mut self, store: bool) -> Self {
        self.config.store_positions = store;
        self
    }

    pub fn stop_words(mut self, stop_words: StopWords) -> Self {
        self.config.stop_words = stop_words;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
