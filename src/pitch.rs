//! Pitch utilities — note-name parsing and semitone transposition.

use crate::error::PitchError;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;

/// Semitone index of A4 counted from C0.
const A4_SEMITONES_FROM_C0: i64 = 57;

/// Transpose `freq` by `semitones` in equal temperament.
pub fn change_pitch(freq: f64, semitones: f64) -> f64 {
    freq * 2f64.powf(semitones / 12.0)
}

/// Parse a note name such as `"A4"`, `"C#3"`, `"E-1"` or `"G"` into Hz.
///
/// Accepts exactly `[A-G](#)?(-?digits)?`. The octave defaults to 0.
pub fn parse_pitch(notation: &str) -> Result<f64, PitchError> {
    let invalid = || PitchError::InvalidNotation {
        text: notation.to_string(),
    };

    let bytes = notation.as_bytes();
    let class: i64 = match bytes.first() {
        Some(b'C') => 0,
        Some(b'D') => 2,
        Some(b'E') => 4,
        Some(b'F') => 5,
        Some(b'G') => 7,
        Some(b'A') => 9,
        Some(b'B') => 11,
        _ => return Err(invalid()),
    };

    let mut rest = &notation[1..];
    let mut semitone = class;
    if let Some(stripped) = rest.strip_prefix('#') {
        semitone += 1;
        rest = stripped;
    }

    let octave: i64 = if rest.is_empty() {
        0
    } else {
        let digits = rest.strip_prefix('-').unwrap_or(rest);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        rest.parse().map_err(|_| invalid())?
    };

    let index = octave
        .checked_mul(12)
        .and_then(|o| o.checked_add(semitone - A4_SEMITONES_FROM_C0))
        .ok_or_else(invalid)?;
    Ok(change_pitch(A4_FREQUENCY, index as f64))
}
