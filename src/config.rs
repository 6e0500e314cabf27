//! Render configuration, loadable from JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::dsp::synth::{CachePolicy, Synthesizer};
use crate::error::SongError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output gain applied when converting to PCM, in [0, 1].
    pub volume: f64,
    /// Whether identical tones within one render share their noise.
    pub cache: CachePolicy,
    /// Fixed noise seed for reproducible renders.
    pub seed: Option<u64>,
    /// Render only this track instead of mixing all of them.
    pub track: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            volume: 0.1,
            cache: CachePolicy::Memoize,
            seed: None,
            track: None,
        }
    }
}

impl RenderConfig {
    pub fn from_json(source: &str) -> Result<Self, SongError> {
        Ok(serde_json::from_str(source)?)
    }

    /// A synthesizer honouring `seed` and `cache`.
    pub fn synthesizer(&self) -> Synthesizer {
        let synth = match self.seed {
            Some(seed) => Synthesizer::seeded(seed),
            None => Synthesizer::new(),
        };
        synth.with_policy(self.cache)
    }
}
