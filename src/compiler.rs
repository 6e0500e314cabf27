use serde::{Deserialize, Serialize};

use crate::ast::Bindings;
use crate::dsp::compositor::{checked_sample_count, delay, normalize, overlay};
use crate::dsp::synth::{SynthParams, Synthesizer};
use crate::error::{CompileError, DspError, ExprError};
use crate::pitch::{change_pitch, parse_pitch};
use crate::song::{Direction, Song, Track};

/// Share of the base duration a string loses per rank above the lowest.
const DECAY_PER_RANK: f64 = 0.1;

// ── Chords ──────────────────────────────────────────────────

/// One strummed chord, ready to synthesize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSpec {
    /// Frequencies in downstroke order.
    pub frequencies: Vec<f64>,
    /// Ring time of the lowest string, in seconds.
    pub duration: f64,
    pub damping: f64,
    pub direction: Direction,
    /// Silence placed before the chord, in seconds.
    pub position_offset: f64,
    /// Delay between consecutive strings, in seconds.
    pub strum_delay: f64,
    pub sample_rate: u32,
}

/// Decay rank of each frequency: 0 for the lowest, counting upwards.
/// Equal frequencies keep their input order.
fn decay_ranks(frequencies: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..frequencies.len()).collect();
    order.sort_by(|&a, &b| frequencies[a].total_cmp(&frequencies[b]));
    let mut ranks = vec![0; frequencies.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = rank;
    }
    ranks
}

/// Synthesize a chord into one normalized buffer.
///
/// Lower strings ring longer: the string of rank `r` lasts
/// `duration - 0.1 * duration * r`. An upstroke reverses which string
/// receives which strum delay but leaves the ranks alone.
pub fn build_chord(synth: &mut Synthesizer, chord: &ChordSpec) -> Result<Vec<f64>, DspError> {
    if chord.frequencies.is_empty() {
        return Err(DspError::EmptyInput);
    }
    let ranks = decay_ranks(&chord.frequencies);

    let mut strum: Vec<usize> = (0..chord.frequencies.len()).collect();
    if chord.direction == Direction::Up {
        strum.reverse();
    }

    let mut sounds = Vec::with_capacity(strum.len());
    for (position, &idx) in strum.iter().enumerate() {
        let rank = ranks[idx] as f64;
        let duration = chord.duration - DECAY_PER_RANK * chord.duration * rank;
        let tone = synth.synthesize(&SynthParams::new(
            chord.frequencies[idx],
            duration,
            chord.sample_rate,
            chord.damping,
        ))?;
        sounds.push(delay(
            &tone,
            position as f64 * chord.strum_delay,
            chord.sample_rate,
        )?);
    }

    let mixed = normalize(overlay(&sounds)?)?;
    delay(&mixed, chord.position_offset, chord.sample_rate)
}

// ── Schedule (Compiler Output) ──────────────────────────────

/// A stroke placed on the timeline, with its strings already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledStroke {
    /// Start time in seconds from the beginning of the track.
    pub time: f64,
    pub bar: usize,
    pub note: usize,
    /// Sounding frequencies, in fret order.
    pub frequencies: Vec<f64>,
    pub direction: Direction,
    pub arpeggio: f64,
}

/// The compiled form of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub track_name: String,
    pub sample_rate: u32,
    pub vibration: f64,
    pub damping: f64,
    pub strokes: Vec<ScheduledStroke>,
    /// End of the last bar, in seconds.
    pub total_seconds: f64,
}

impl Schedule {
    pub fn chord(&self, stroke: &ScheduledStroke) -> ChordSpec {
        ChordSpec {
            frequencies: stroke.frequencies.clone(),
            duration: self.vibration,
            damping: self.damping,
            direction: stroke.direction,
            position_offset: stroke.time,
            strum_delay: stroke.arpeggio,
            sample_rate: self.sample_rate,
        }
    }
}

/// Evaluate a stroke offset in beats.
///
/// `beat` is bound to 1 and `bar` to the number of beats in a bar.
pub fn evaluate_offset(source: &str, beats_per_bar: u32) -> Result<f64, ExprError> {
    let expr = crate::parse_time_expr(source)?;
    let mut bindings = Bindings::new();
    bindings.insert("beat".to_string(), 1.0);
    bindings.insert("bar".to_string(), beats_per_bar as f64);
    Ok(expr.evaluate(&bindings)?)
}

fn find_track<'a>(song: &'a Song, name: &str) -> Result<&'a Track, CompileError> {
    song.tracks
        .get(name)
        .ok_or_else(|| CompileError::UnknownInstrumentTrack {
            name: name.to_string(),
            available: song.tracks.keys().cloned().collect(),
        })
}

/// Resolve every stroke of a track to absolute times and frequencies.
///
/// Frets pair with the tuning in reverse (tab notation lists the highest
/// string first). Strokes where every string is muted are rests and are
/// left out of the schedule.
pub fn schedule_track(song: &Song, track_name: &str) -> Result<Schedule, CompileError> {
    let track = find_track(song, track_name)?;
    let signature = track.tabs.time_signature()?;
    let seconds_per_beat = track.tabs.seconds_per_beat();
    let beats_per_bar = signature.beats_per_bar as f64;

    let strings = track
        .tuning
        .iter()
        .rev()
        .map(|p| parse_pitch(p))
        .collect::<Result<Vec<f64>, _>>()?;

    let mut strokes = Vec::new();
    for (b, bar) in track.tabs.bars.iter().enumerate() {
        for (n, note) in bar.notes.iter().enumerate() {
            if note.frets.len() != strings.len() {
                return Err(CompileError::StringCountMismatch {
                    bar: b,
                    note: n,
                    expected: strings.len(),
                    found: note.frets.len(),
                });
            }

            let offset = evaluate_offset(&note.offset, signature.beats_per_bar).map_err(|error| {
                CompileError::Offset {
                    bar: b,
                    note: n,
                    source: note.offset.clone(),
                    error,
                }
            })?;
            let time = (b as f64 * beats_per_bar + offset) * seconds_per_beat;
            if !time.is_finite() || checked_sample_count(time, song.rate).is_err() {
                return Err(CompileError::StrokeOutOfRange {
                    bar: b,
                    note: n,
                    seconds: time,
                });
            }
            let time = time.max(0.0);

            let frequencies: Vec<f64> = strings
                .iter()
                .zip(&note.frets)
                .filter_map(|(&open, fret)| fret.map(|f| change_pitch(open, f as f64)))
                .collect();
            if frequencies.is_empty() {
                log::debug!("{track_name}: bar {b} note {n} is a rest");
                continue;
            }

            log::debug!(
                "{track_name}: bar {b} note {n} at {time:.3}s, {} strings",
                frequencies.len()
            );
            strokes.push(ScheduledStroke {
                time,
                bar: b,
                note: n,
                frequencies,
                direction: note.stroke,
                arpeggio: note.arpeggio,
            });
        }
    }

    Ok(Schedule {
        track_name: track_name.to_string(),
        sample_rate: song.rate,
        vibration: track.vibration,
        damping: track.damping,
        strokes,
        total_seconds: track.tabs.bars.len() as f64 * beats_per_bar * seconds_per_beat,
    })
}

/// Compile every track of a song, in track-name order.
pub fn schedule_song(song: &Song) -> Result<Vec<Schedule>, CompileError> {
    song.tracks
        .keys()
        .map(|name| schedule_track(song, name))
        .collect()
}

// ── Rendering ───────────────────────────────────────────────

/// One rendered stroke, already padded to its absolute position.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeBuffer {
    pub time: f64,
    pub samples: Vec<f64>,
}

/// Render each scheduled stroke to its own composite buffer.
pub fn render_strokes(
    synth: &mut Synthesizer,
    schedule: &Schedule,
) -> Result<Vec<StrokeBuffer>, CompileError> {
    let mut out = Vec::with_capacity(schedule.strokes.len());
    for stroke in &schedule.strokes {
        let samples = build_chord(synth, &schedule.chord(stroke))?;
        out.push(StrokeBuffer {
            time: stroke.time,
            samples,
        });
    }
    Ok(out)
}

/// Render a schedule into one performance buffer.
pub fn render_schedule(synth: &mut Synthesizer, schedule: &Schedule) -> Result<Vec<f64>, CompileError> {
    let strokes = render_strokes(synth, schedule)?;
    let buffers: Vec<&[f64]> = strokes.iter().map(|s| s.samples.as_slice()).collect();
    let performance = overlay(&buffers)?;
    log::debug!(
        "rendered track '{}': {} strokes, {} samples",
        schedule.track_name,
        strokes.len(),
        performance.len()
    );
    Ok(performance)
}

/// Compile and render one named track.
pub fn render_track(
    synth: &mut Synthesizer,
    song: &Song,
    track_name: &str,
) -> Result<Vec<f64>, CompileError> {
    render_schedule(synth, &schedule_track(song, track_name)?)
}

/// Render every track and mix them together.
pub fn render_song(synth: &mut Synthesizer, song: &Song) -> Result<Vec<f64>, CompileError> {
    let tracks = schedule_song(song)?
        .iter()
        .map(|schedule| render_schedule(synth, schedule))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(overlay(&tracks)?)
}
