//! Song documents — the tablature a performance is compiled from.
//!
//! These types map directly onto the JSON song format:
//!
//! ```json
//! {
//!   "title": "Open Strings", "artist": "Nobody", "rate": 44100,
//!   "tracks": {
//!     "guitar": {
//!       "tuning": ["E2", "A2", "D3", "G3", "B3", "E4"],
//!       "vibration": 3.5, "damping": 0.499,
//!       "tabs": {
//!         "bpm": 90, "signature": "4/4",
//!         "bars": [{ "notes": [{ "frets": [0, 0, 1, 2, 2, 0], "arpeggio": 0.03 }] }]
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, SongError};
use crate::pitch::parse_pitch;

/// A full song: metadata plus named instrument tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    /// Sample rate in Hz used for every track.
    pub rate: u32,
    pub tracks: BTreeMap<String, Track>,
}

/// An instrument together with the tablature it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Open-string pitches, lowest string first.
    pub tuning: Vec<String>,
    /// How long a plucked string rings, in seconds.
    pub vibration: f64,
    pub damping: f64,
    pub tabs: Tablature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tablature {
    pub bpm: u32,
    /// `"N/M"`: N beats per bar, each an M-th note.
    pub signature: String,
    pub bars: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub notes: Vec<Note>,
}

/// One stroke across the strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// One entry per string, highest string first; `null` mutes the string.
    pub frets: Vec<Option<i32>>,
    /// Delay between consecutive strings, in seconds.
    #[serde(default)]
    pub arpeggio: f64,
    #[serde(default)]
    pub stroke: Direction,
    /// Position inside the bar as a time expression, in beats.
    #[serde(default = "default_offset")]
    pub offset: String,
}

fn default_offset() -> String {
    "0".to_string()
}

/// Strum direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Down,
    Up,
}

/// A parsed `"N/M"` time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_bar: u32,
    pub beat_unit: u32,
}

impl TimeSignature {
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let invalid = || CompileError::InvalidSignature {
            text: text.to_string(),
        };
        let (n, m) = text.split_once('/').ok_or_else(invalid)?;
        let beats_per_bar: u32 = n.trim().parse().map_err(|_| invalid())?;
        let beat_unit: u32 = m.trim().parse().map_err(|_| invalid())?;
        if beats_per_bar == 0 || beat_unit == 0 {
            return Err(invalid());
        }
        Ok(TimeSignature {
            beats_per_bar,
            beat_unit,
        })
    }
}

impl Tablature {
    pub fn time_signature(&self) -> Result<TimeSignature, CompileError> {
        TimeSignature::parse(&self.signature)
    }

    /// Length of one beat in seconds.
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm as f64
    }
}

impl Song {
    /// Decode and validate a JSON song document.
    pub fn from_json(source: &str) -> Result<Song, SongError> {
        let song: Song = serde_json::from_str(source)?;
        song.validate()?;
        Ok(song)
    }

    pub fn to_json(&self) -> Result<String, SongError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the value ranges the compiler relies on.
    ///
    /// Fret counts are checked during compilation, where the failing bar
    /// and note can be reported.
    pub fn validate(&self) -> Result<(), SongError> {
        if self.rate == 0 {
            return Err(invalid("rate", "must be a positive sample rate"));
        }
        if self.tracks.is_empty() {
            return Err(invalid("tracks", "song has no tracks"));
        }
        for (name, track) in &self.tracks {
            track.validate(name)?;
        }
        Ok(())
    }
}

impl Track {
    fn validate(&self, name: &str) -> Result<(), SongError> {
        let field = |f: &str| format!("tracks.{name}.{f}");

        if self.tuning.is_empty() {
            return Err(invalid(&field("tuning"), "needs at least one string"));
        }
        for pitch in &self.tuning {
            parse_pitch(pitch).map_err(|e| invalid(&field("tuning"), &e.to_string()))?;
        }
        if !(self.vibration.is_finite() && self.vibration > 0.0) {
            return Err(invalid(&field("vibration"), "must be a positive number of seconds"));
        }
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(invalid(&field("damping"), "must lie strictly between 0 and 1"));
        }
        if self.tabs.bpm == 0 {
            return Err(invalid(&field("tabs.bpm"), "must be positive"));
        }
        self.tabs
            .time_signature()
            .map_err(|e| invalid(&field("tabs.signature"), &e.to_string()))?;
        for (b, bar) in self.tabs.bars.iter().enumerate() {
            for (n, note) in bar.notes.iter().enumerate() {
                if !(note.arpeggio.is_finite() && note.arpeggio >= 0.0) {
                    return Err(invalid(
                        &field(&format!("tabs.bars[{b}].notes[{n}].arpeggio")),
                        "must be zero or more seconds",
                    ));
                }
                if note.frets.iter().flatten().any(|&f| f < 0) {
                    return Err(invalid(
                        &field(&format!("tabs.bars[{b}].notes[{n}].frets")),
                        "fret numbers cannot be negative",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> SongError {
    SongError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "title": "Test",
        "artist": "Someone",
        "rate": 8000,
        "tracks": {
            "guitar": {
                "tuning": ["E2", "A2", "D3", "G3", "B3", "E4"],
                "vibration": 1.0,
                "damping": 0.499,
                "tabs": {
                    "bpm": 120,
                    "signature": "3/4",
                    "bars": [
                        { "notes": [
                            { "frets": [0, 1, 0, 2, 3, null] },
                            { "frets": [0, 1, 0, 2, 3, null], "stroke": "up", "arpeggio": 0.05, "offset": "1 + 1/2" }
                        ] }
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn decodes_with_defaults() {
        let song = Song::from_json(MINIMAL).unwrap();
        let track = &song.tracks["guitar"];
        let notes = &track.tabs.bars[0].notes;
        assert_eq!(notes[0].stroke, Direction::Down);
        assert_eq!(notes[0].arpeggio, 0.0);
        assert_eq!(notes[0].offset, "0");
        assert_eq!(notes[0].frets[5], None);
        assert_eq!(notes[1].stroke, Direction::Up);
        assert_eq!(notes[1].offset, "1 + 1/2");
    }

    #[test]
    fn json_round_trip_keeps_the_song() {
        let song = Song::from_json(MINIMAL).unwrap();
        let again = Song::from_json(&song.to_json().unwrap()).unwrap();
        assert_eq!(song, again);
    }

    #[test]
    fn time_signature_parsing() {
        let ts = TimeSignature::parse("6/8").unwrap();
        assert_eq!(ts.beats_per_bar, 6);
        assert_eq!(ts.beat_unit, 8);
        assert!(TimeSignature::parse("4").is_err());
        assert!(TimeSignature::parse("0/4").is_err());
        assert!(TimeSignature::parse("four/4").is_err());
    }

    #[test]
    fn seconds_per_beat_from_bpm() {
        let song = Song::from_json(MINIMAL).unwrap();
        assert_eq!(song.tracks["guitar"].tabs.seconds_per_beat(), 0.5);
    }

    #[test]
    fn rejects_bad_damping() {
        let bad = MINIMAL.replace("0.499", "1.5");
        match Song::from_json(&bad) {
            Err(SongError::Invalid { field, .. }) => assert_eq!(field, "tracks.guitar.damping"),
            other => panic!("expected invalid damping, got {other:?}"),
        }
    }

    fn rejected_field<T: std::fmt::Debug>(result: Result<T, SongError>) -> String {
        match result {
            Err(SongError::Invalid { field, .. }) => field,
            other => panic!("expected an invalid field, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_rate() {
        let bad = MINIMAL.replace("\"rate\": 8000", "\"rate\": 0");
        assert_eq!(rejected_field(Song::from_json(&bad)), "rate");
    }

    #[test]
    fn rejects_zero_bpm() {
        let bad = MINIMAL.replace("\"bpm\": 120", "\"bpm\": 0");
        assert_eq!(rejected_field(Song::from_json(&bad)), "tracks.guitar.tabs.bpm");
    }

    #[test]
    fn rejects_bad_vibration() {
        for value in ["0", "-1.0"] {
            let bad = MINIMAL.replace("\"vibration\": 1.0", &format!("\"vibration\": {value}"));
            assert_eq!(rejected_field(Song::from_json(&bad)), "tracks.guitar.vibration");
        }
        let mut song = Song::from_json(MINIMAL).unwrap();
        for value in [f64::INFINITY, f64::NAN] {
            song.tracks.get_mut("guitar").unwrap().vibration = value;
            assert_eq!(rejected_field(song.validate()), "tracks.guitar.vibration");
        }
    }

    #[test]
    fn rejects_negative_arpeggio() {
        let bad = MINIMAL.replace("\"arpeggio\": 0.05", "\"arpeggio\": -0.05");
        assert_eq!(
            rejected_field(Song::from_json(&bad)),
            "tracks.guitar.tabs.bars[0].notes[1].arpeggio"
        );
    }

    #[test]
    fn rejects_negative_fret() {
        let bad = MINIMAL.replacen("[0, 1, 0, 2", "[-1, 1, 0, 2", 1);
        assert_eq!(
            rejected_field(Song::from_json(&bad)),
            "tracks.guitar.tabs.bars[0].notes[0].frets"
        );
    }

    #[test]
    fn rejects_empty_tracks() {
        let mut song = Song::from_json(MINIMAL).unwrap();
        song.tracks.clear();
        assert_eq!(rejected_field(song.validate()), "tracks");
    }

    #[test]
    fn rejects_empty_tuning() {
        let mut song = Song::from_json(MINIMAL).unwrap();
        song.tracks.get_mut("guitar").unwrap().tuning.clear();
        assert_eq!(rejected_field(song.validate()), "tracks.guitar.tuning");
    }

    #[test]
    fn rejects_bad_tuning() {
        let bad = MINIMAL.replace("\"B3\"", "\"H3\"");
        assert!(matches!(Song::from_json(&bad), Err(SongError::Invalid { .. })));
    }

    #[test]
    fn rejects_unknown_stroke_direction() {
        let bad = MINIMAL.replace("\"up\"", "\"sideways\"");
        assert!(matches!(Song::from_json(&bad), Err(SongError::Json(_))));
    }
}
