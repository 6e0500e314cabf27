//! Compositor — combines waveform buffers in time (delay) and amplitude
//! (overlay, normalize).
//!
//! Functions that take a `Vec<f64>` by value reuse its allocation; the ones
//! taking a slice leave the caller's buffer untouched.

use crate::error::DspError;

/// Longest buffer the compositor and synthesizer will allocate: one hour
/// at 48 kHz.
pub const MAX_SAMPLES: usize = 48_000 * 3600;

/// Number of samples covering `duration` seconds, rounded half-to-even.
///
/// Saturates instead of failing; use [`checked_sample_count`] before
/// allocating.
pub fn sample_count(duration: f64, sample_rate: u32) -> usize {
    let n = (duration * sample_rate as f64).round_ties_even();
    if n.is_finite() && n > 0.0 { n as usize } else { 0 }
}

/// Like [`sample_count`], but fails when the result would exceed
/// [`MAX_SAMPLES`] or `duration` is not a number. Negative durations count 0.
pub fn checked_sample_count(duration: f64, sample_rate: u32) -> Result<usize, DspError> {
    let n = (duration * sample_rate as f64).round_ties_even();
    if n.is_nan() || n > MAX_SAMPLES as f64 {
        return Err(DspError::BufferTooLong {
            seconds: duration,
            sample_rate,
        });
    }
    Ok(if n > 0.0 { n as usize } else { 0 })
}

/// Largest absolute sample value (0.0 for an empty buffer).
pub fn peak(buffer: &[f64]) -> f64 {
    buffer.iter().fold(0.0f64, |m, &s| m.max(s.abs()))
}

/// Remove the DC offset by subtracting the mean.
pub fn centralize(mut buffer: Vec<f64>) -> Vec<f64> {
    if buffer.is_empty() {
        return buffer;
    }
    let mean = buffer.iter().sum::<f64>() / buffer.len() as f64;
    for s in &mut buffer {
        *s -= mean;
    }
    buffer
}

/// Scale so the peak absolute value is 1.
///
/// Fails with [`DspError::SilentBuffer`] when the peak is zero, which
/// includes the empty buffer.
pub fn normalize(mut buffer: Vec<f64>) -> Result<Vec<f64>, DspError> {
    let max = peak(&buffer);
    if max == 0.0 {
        return Err(DspError::SilentBuffer);
    }
    for s in &mut buffer {
        *s /= max;
    }
    Ok(buffer)
}

/// Like [`normalize`], but a silent buffer is returned unchanged.
pub fn normalize_or_silence(buffer: Vec<f64>) -> Vec<f64> {
    if peak(&buffer) == 0.0 {
        buffer
    } else {
        normalize(buffer).unwrap_or_default()
    }
}

/// Prepend `lead` seconds of silence. A non-positive lead copies the buffer.
pub fn delay(buffer: &[f64], lead: f64, sample_rate: u32) -> Result<Vec<f64>, DspError> {
    let pad = checked_sample_count(lead, sample_rate)?;
    let total = pad
        .checked_add(buffer.len())
        .filter(|&n| n <= MAX_SAMPLES)
        .ok_or(DspError::BufferTooLong {
            seconds: lead,
            sample_rate,
        })?;
    let mut out = Vec::with_capacity(total);
    out.resize(pad, 0.0);
    out.extend_from_slice(buffer);
    Ok(out)
}

/// Sum buffers sample-by-sample and normalize the result.
///
/// The output is as long as the longest input; shorter inputs contribute
/// nothing past their end.
pub fn overlay<B: AsRef<[f64]>>(buffers: &[B]) -> Result<Vec<f64>, DspError> {
    if buffers.is_empty() {
        return Err(DspError::EmptyInput);
    }
    let size = buffers.iter().map(|b| b.as_ref().len()).max().unwrap_or(0);
    let mut mix = vec![0.0; size];
    for buffer in buffers {
        for (acc, &s) in mix.iter_mut().zip(buffer.as_ref()) {
            *acc += s;
        }
    }
    normalize(mix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_rounds_half_to_even() {
        assert_eq!(sample_count(0.5, 44100), 22050);
        assert_eq!(sample_count(2.5, 1), 2);
        assert_eq!(sample_count(3.5, 1), 4);
        assert_eq!(sample_count(0.0, 44100), 0);
        assert_eq!(sample_count(-1.0, 44100), 0);
    }

    #[test]
    fn centralize_removes_mean() {
        let out = centralize(vec![1.0, 2.0, 3.0]);
        assert_eq!(out, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn normalize_scales_to_unit_peak() {
        let out = normalize(vec![0.5, -2.0, 1.0]).unwrap();
        assert_eq!(out, vec![0.25, -1.0, 0.5]);
    }

    #[test]
    fn normalize_rejects_silence() {
        assert_eq!(normalize(vec![0.0; 8]), Err(DspError::SilentBuffer));
        assert_eq!(normalize(Vec::new()), Err(DspError::SilentBuffer));
    }

    #[test]
    fn normalize_or_silence_passes_zeros_through() {
        assert_eq!(normalize_or_silence(vec![0.0; 3]), vec![0.0; 3]);
        assert_eq!(normalize_or_silence(vec![0.0, 4.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn zero_delay_is_identity() {
        let buf = vec![0.1, -0.2, 0.3];
        assert_eq!(delay(&buf, 0.0, 44100).unwrap(), buf);
        assert_eq!(delay(&buf, -3.0, 44100).unwrap(), buf);
    }

    #[test]
    fn delay_prepends_silence() {
        let out = delay(&[1.0, -1.0], 0.5, 4).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 1.0, -1.0]);
    }

    #[test]
    fn delay_rejects_unbounded_leads() {
        for lead in [f64::INFINITY, f64::NAN, 1e20] {
            let err = delay(&[1.0], lead, 44100).unwrap_err();
            assert!(matches!(err, DspError::BufferTooLong { .. }), "{lead}");
        }
    }

    #[test]
    fn delay_counts_the_buffer_against_the_limit() {
        // The lead alone fits; the one extra sample does not.
        let lead = MAX_SAMPLES as f64;
        assert_eq!(checked_sample_count(lead, 1), Ok(MAX_SAMPLES));
        assert!(matches!(
            delay(&[1.0], lead, 1),
            Err(DspError::BufferTooLong { .. })
        ));
    }

    #[test]
    fn checked_count_matches_saturating_count_in_range() {
        assert_eq!(checked_sample_count(0.5, 44100), Ok(22050));
        assert_eq!(checked_sample_count(-1.0, 44100), Ok(0));
        assert_eq!(checked_sample_count(f64::NEG_INFINITY, 44100), Ok(0));
        assert!(checked_sample_count(3601.0, 48_000).is_err());
    }

    #[test]
    fn overlay_single_equals_normalize() {
        let buf = vec![0.2, -0.4, 0.1, 0.0];
        assert_eq!(overlay(&[buf.clone()]).unwrap(), normalize(buf).unwrap());
    }

    #[test]
    fn overlay_pads_shorter_inputs() {
        let a = vec![1.0, 1.0];
        let b = vec![0.0, 1.0, 2.0, 1.0];
        let out = overlay(&[a, b]).unwrap();
        assert_eq!(out, vec![0.5, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn overlay_empty_fails() {
        let none: [Vec<f64>; 0] = [];
        assert_eq!(overlay(&none), Err(DspError::EmptyInput));
    }

    #[test]
    fn overlay_cancelling_inputs_is_silent() {
        let a = vec![1.0, -1.0];
        let b = vec![-1.0, 1.0];
        assert_eq!(overlay(&[a, b]), Err(DspError::SilentBuffer));
    }
}
