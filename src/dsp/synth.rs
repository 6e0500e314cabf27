//! Plucked-string synthesizer (Karplus-Strong).
//!
//! A burst of uniform noise whose length sets the fundamental is recirculated
//! through a damped two-point averaging filter. The output is centred and
//! normalized so every tone peaks at exactly 1.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::compositor::{MAX_SAMPLES, centralize, checked_sample_count, normalize};
use crate::error::DspError;

/// Everything that determines the shape of one synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthParams {
    /// Fundamental frequency in Hz.
    pub frequency: f64,
    /// Length of the output in seconds.
    pub duration: f64,
    pub sample_rate: u32,
    /// Per-step attenuation of the averaging filter, in (0, 1).
    pub damping: f64,
}

impl SynthParams {
    pub fn new(frequency: f64, duration: f64, sample_rate: u32, damping: f64) -> Self {
        SynthParams {
            frequency,
            duration,
            sample_rate,
            damping,
        }
    }

    /// Length of the excitation buffer, `round(rate / frequency)`.
    ///
    /// At least two samples and at most [`MAX_SAMPLES`].
    pub fn excitation_size(&self) -> Result<usize, DspError> {
        let n = (self.sample_rate as f64 / self.frequency).round_ties_even();
        if !(self.frequency.is_finite() && self.frequency > 0.0 && n >= 2.0) {
            return Err(DspError::DegenerateBuffer {
                frequency: self.frequency,
                sample_rate: self.sample_rate,
            });
        }
        if n > MAX_SAMPLES as f64 {
            return Err(DspError::BufferTooLong {
                seconds: 1.0 / self.frequency,
                sample_rate: self.sample_rate,
            });
        }
        Ok(n as usize)
    }

    fn cache_key(&self) -> CacheKey {
        (
            self.frequency.to_bits(),
            self.duration.to_bits(),
            self.sample_rate,
            self.damping.to_bits(),
        )
    }
}

/// Whether repeated identical requests share one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Every call draws fresh noise.
    #[default]
    Fresh,
    /// The first result for a parameter set is reused for later calls.
    Memoize,
}

type CacheKey = (u64, u64, u32, u64);

/// The damped averaging recursion over a circular buffer.
///
/// Never ends on its own; callers `take` as many samples as they need.
/// Restarting means building a new `Vibration` from the original excitation.
#[derive(Debug, Clone)]
pub struct Vibration {
    buffer: Vec<f64>,
    cursor: usize,
    damping: f64,
}

impl Vibration {
    /// Start vibrating a private copy of `excitation`.
    pub fn new(excitation: &[f64], damping: f64) -> Self {
        Vibration {
            buffer: excitation.to_vec(),
            cursor: 0,
            damping,
        }
    }
}

impl Iterator for Vibration {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let size = self.buffer.len();
        if size == 0 {
            return None;
        }
        let i = self.cursor;
        let current = self.buffer[i];
        let next = self.buffer[(i + 1) % size];
        self.buffer[i] = (current + next) * self.damping;
        self.cursor = (i + 1) % size;
        Some(current)
    }
}

/// Generates string tones from an owned, seedable noise source.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    rng: Pcg32,
    policy: CachePolicy,
    cache: HashMap<CacheKey, Vec<f64>>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    /// A synthesizer seeded from the process entropy source.
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// A synthesizer whose noise sequence is fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Synthesizer {
            rng: Pcg32::seed_from_u64(seed),
            policy: CachePolicy::default(),
            cache: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Number of memoized tones.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Uniform noise in `[-1, 1]`.
    pub fn excitation(&mut self, size: usize) -> Vec<f64> {
        (0..size).map(|_| self.rng.random_range(-1.0..=1.0)).collect()
    }

    /// Synthesize one normalized tone of `round(duration * rate)` samples.
    pub fn synthesize(&mut self, params: &SynthParams) -> Result<Vec<f64>, DspError> {
        if !(params.duration.is_finite() && params.duration > 0.0) {
            return Err(DspError::InvalidDuration {
                duration: params.duration,
            });
        }
        if !(params.damping > 0.0 && params.damping < 1.0) {
            return Err(DspError::InvalidDamping {
                damping: params.damping,
            });
        }
        let size = params.excitation_size()?;
        let count = checked_sample_count(params.duration, params.sample_rate)?;

        if self.policy == CachePolicy::Memoize {
            if let Some(hit) = self.cache.get(&params.cache_key()) {
                log::trace!("synth cache hit for {:.2} Hz", params.frequency);
                return Ok(hit.clone());
            }
        }

        let excitation = self.excitation(size);
        let raw: Vec<f64> = Vibration::new(&excitation, params.damping)
            .take(count)
            .collect();
        let tone = normalize(centralize(raw))?;
        log::trace!(
            "synthesized {:.2} Hz: {} samples from a {}-sample excitation",
            params.frequency,
            tone.len(),
            size
        );

        if self.policy == CachePolicy::Memoize {
            self.cache
                .entry(params.cache_key())
                .or_insert_with(|| tone.clone());
        }
        Ok(tone)
    }
}
