//! Stock demo programs: single tones, scales, a strummed open chord and a
//! tour of note names. Each returns the buffers in playing order so a
//! caller can hand them to a [`PlaybackSink`] one after another.

use crate::dsp::compositor::{delay, overlay};
use crate::dsp::renderer::{PlaybackSink, play_buffer};
use crate::dsp::synth::{SynthParams, Synthesizer};
use crate::error::{DspError, PluckError};
use crate::pitch::{change_pitch, parse_pitch};

/// C4 up to C5.
pub const C_MAJOR_SCALE: [f64; 8] = [261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25];

/// Open E major on a guitar in standard tuning, high string first.
pub const OPEN_E_CHORD: [f64; 6] = [329.63, 246.94, 196.00, 146.83, 110.00, 82.41];

pub const NOTATION_TOUR: [&str; 15] = [
    "C", "C0", "A#", "C#4", "A4", "E4", "B3", "G3", "D3", "A2", "E2", "G2", "D2", "A1", "E1",
];

/// Duration and damping shared by every tone of a demo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pluck {
    pub duration: f64,
    pub damping: f64,
    pub sample_rate: u32,
}

impl Pluck {
    pub fn new(duration: f64, damping: f64, sample_rate: u32) -> Self {
        Pluck {
            duration,
            damping,
            sample_rate,
        }
    }

    fn params(&self, frequency: f64) -> SynthParams {
        SynthParams::new(frequency, self.duration, self.sample_rate, self.damping)
    }
}

pub fn tone(synth: &mut Synthesizer, frequency: f64, pluck: Pluck) -> Result<Vec<f64>, DspError> {
    synth.synthesize(&pluck.params(frequency))
}

/// One tone per frequency.
pub fn sequence(
    synth: &mut Synthesizer,
    frequencies: &[f64],
    pluck: Pluck,
) -> Result<Vec<Vec<f64>>, DspError> {
    frequencies
        .iter()
        .map(|&f| tone(synth, f, pluck))
        .collect()
}

/// 200 Hz to 600 Hz in 10 Hz steps.
pub fn tone_sweep(synth: &mut Synthesizer, pluck: Pluck) -> Result<Vec<Vec<f64>>, DspError> {
    let frequencies: Vec<f64> = (200..=600).step_by(10).map(f64::from).collect();
    sequence(synth, &frequencies, pluck)
}

pub fn c_major_sequence(synth: &mut Synthesizer, pluck: Pluck) -> Result<Vec<Vec<f64>>, DspError> {
    sequence(synth, &C_MAJOR_SCALE, pluck)
}

/// Strum `frequencies` in order, each string `strum_delay` seconds after
/// the previous one and all ringing for the full duration.
pub fn strum(
    synth: &mut Synthesizer,
    frequencies: &[f64],
    pluck: Pluck,
    strum_delay: f64,
    reverse: bool,
) -> Result<Vec<f64>, DspError> {
    let mut order = frequencies.to_vec();
    if reverse {
        order.reverse();
    }
    let mut sounds = Vec::with_capacity(order.len());
    for (i, &f) in order.iter().enumerate() {
        let t = tone(synth, f, pluck)?;
        sounds.push(delay(&t, i as f64 * strum_delay, pluck.sample_rate)?);
    }
    overlay(&sounds)
}

/// The open E chord, five seconds long with a 40 ms strum.
pub fn open_e_strum(synth: &mut Synthesizer, reverse: bool, sample_rate: u32) -> Result<Vec<f64>, DspError> {
    strum(synth, &OPEN_E_CHORD, Pluck::new(5.0, 0.499, sample_rate), 0.04, reverse)
}

/// 110 Hz transposed an octave down, each semitone up to an octave above,
/// and two octaves up.
pub fn pitch_ladder(synth: &mut Synthesizer, pluck: Pluck) -> Result<Vec<Vec<f64>>, DspError> {
    let mut steps: Vec<i32> = vec![-12, 24];
    steps.extend(0..=12);
    steps.sort_unstable();
    let frequencies: Vec<f64> = steps
        .into_iter()
        .map(|s| change_pitch(110.0, s as f64))
        .collect();
    sequence(synth, &frequencies, pluck)
}

pub fn notation_tour(synth: &mut Synthesizer, pluck: Pluck) -> Result<Vec<Vec<f64>>, PluckError> {
    let frequencies = NOTATION_TOUR
        .iter()
        .map(|n| parse_pitch(n))
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(sequence(synth, &frequencies, pluck)?)
}

/// Play buffers one after another.
pub fn play_all<S: PlaybackSink>(
    sink: &mut S,
    buffers: &[Vec<f64>],
    volume: f64,
    sample_rate: u32,
) -> Result<(), S::Error> {
    for buffer in buffers {
        play_buffer(sink, buffer, volume, sample_rate)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::compositor::{peak, sample_count};
    use crate::dsp::renderer::WavSink;

    const RATE: u32 = 8000;

    #[test]
    fn sweep_covers_200_to_600() {
        let mut synth = Synthesizer::seeded(1);
        let tones = tone_sweep(&mut synth, Pluck::new(0.05, 0.495, RATE)).unwrap();
        assert_eq!(tones.len(), 41);
        assert!(tones.iter().all(|t| t.len() == 400));
    }

    #[test]
    fn ladder_has_fifteen_steps() {
        let mut synth = Synthesizer::seeded(1);
        let tones = pitch_ladder(&mut synth, Pluck::new(0.05, 0.495, RATE)).unwrap();
        assert_eq!(tones.len(), 15);
    }

    #[test]
    fn strum_length_includes_stagger() {
        let mut synth = Synthesizer::seeded(4);
        let out = strum(&mut synth, &OPEN_E_CHORD, Pluck::new(0.5, 0.499, RATE), 0.04, true).unwrap();
        assert_eq!(out.len(), sample_count(0.2, RATE) + sample_count(0.5, RATE));
        assert!((peak(&out) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tour_plays_into_a_sink() {
        let mut synth = Synthesizer::seeded(8);
        let pluck = Pluck::new(0.1, 0.495, RATE);
        let tones = notation_tour(&mut synth, pluck).unwrap();
        let mut sink = WavSink::new();
        play_all(&mut sink, &tones, 0.1, RATE).unwrap();
        assert_eq!(sink.samples().len(), 15 * 800);
        assert!(sink.samples().iter().all(|s| s.abs() <= 0.1 + 1e-6));
    }

    #[test]
    fn lowest_tour_note_fits_the_rate() {
        // "C" (octave 0) is ~16 Hz, a 490-sample excitation at 8 kHz.
        let mut synth = Synthesizer::seeded(8);
        assert!(tone(&mut synth, parse_pitch("C").unwrap(), Pluck::new(0.1, 0.495, RATE)).is_ok());
    }
}
