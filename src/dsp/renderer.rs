//! Playback hand-off — volume scaling, PCM conversion, WAV encoding and
//! the sink a finished buffer is written to.

use crate::error::SinkError;

/// Scale a normalized buffer by `volume` (clamped to `[0, 1]`) as f32 PCM.
pub fn to_pcm_f32(buffer: &[f64], volume: f64) -> Vec<f32> {
    let volume = volume.clamp(0.0, 1.0);
    buffer.iter().map(|&s| (s * volume) as f32).collect()
}

/// Convert f32 PCM in `[-1, 1]` to 16-bit samples.
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s as f64 * 32767.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Render a buffer to a mono 16-bit WAV file as bytes.
pub fn render_wav(buffer: &[f64], sample_rate: u32, volume: f64) -> Vec<u8> {
    let pcm = to_pcm_i16(&to_pcm_f32(buffer, volume));
    encode_wav(&pcm, sample_rate, 1)
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Destination for finished mono f32 audio.
///
/// `play` may block until the audio has been consumed; the core hands each
/// buffer over synchronously and keeps no queue of its own.
pub trait PlaybackSink {
    type Error: std::error::Error;

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), Self::Error>;
}

/// Scale `buffer` by `volume` and hand it to `sink`.
pub fn play_buffer<S: PlaybackSink>(
    sink: &mut S,
    buffer: &[f64],
    volume: f64,
    sample_rate: u32,
) -> Result<(), S::Error> {
    sink.play(&to_pcm_f32(buffer, volume), sample_rate)
}

/// A sink that records consecutive plays back-to-back, as a speaker would
/// hear them, for export as one WAV file.
#[derive(Debug, Clone, Default)]
pub struct WavSink {
    sample_rate: Option<u32>,
    samples: Vec<f32>,
}

impl WavSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Recorded length in seconds.
    pub fn duration(&self) -> f64 {
        match self.sample_rate {
            Some(rate) => self.samples.len() as f64 / rate as f64,
            None => 0.0,
        }
    }

    /// Encode everything played so far; `None` if nothing was played.
    pub fn to_wav(&self) -> Option<Vec<u8>> {
        self.sample_rate
            .map(|rate| encode_wav(&to_pcm_i16(&self.samples), rate, 1))
    }
}

impl PlaybackSink for WavSink {
    type Error = SinkError;

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), SinkError> {
        match self.sample_rate {
            Some(expected) if expected != sample_rate => {
                return Err(SinkError::RateMismatch {
                    expected,
                    found: sample_rate,
                });
            }
            _ => self.sample_rate = Some(sample_rate),
        }
        self.samples.extend_from_slice(samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    const SONG: &str = r#"{
        "title": "Open Strings",
        "artist": "Test",
        "rate": 8000,
        "tracks": {
            "guitar": {
                "tuning": ["E2", "A2", "D3", "G3", "B3", "E4"],
                "vibration": 0.75,
                "damping": 0.499,
                "tabs": {
                    "bpm": 120,
                    "signature": "4/4",
                    "bars": [
                        { "notes": [
                            { "frets": [0, 0, 1, 2, 2, 0], "arpeggio": 0.03 },
                            { "frets": [0, 0, 1, 2, 2, 0], "stroke": "up", "arpeggio": 0.02, "offset": "2" }
                        ] },
                        { "notes": [
                            { "frets": [null, null, null, null, null, null] },
                            { "frets": [0, 1, 0, 2, 3, null], "offset": "bar - 1" }
                        ] }
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn volume_scales_and_clamps() {
        assert_eq!(to_pcm_f32(&[1.0, -0.5], 0.5), vec![0.5f32, -0.25f32]);
        assert_eq!(to_pcm_f32(&[1.0], 3.0), vec![1.0f32]);
        assert_eq!(to_pcm_f32(&[1.0], -1.0), vec![0.0f32]);
    }

    #[test]
    fn i16_conversion_saturates() {
        assert_eq!(to_pcm_i16(&[0.0, 1.0, -1.0, 2.0]), vec![0, 32767, -32767, 32767]);
    }

    #[test]
    fn wav_header_valid() {
        let wav = render_wav(&[0.0, 0.5, -0.5, 1.0], 44100, 1.0);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 1);

        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size, 8);
        assert_eq!(wav.len(), 44 + 8);
    }

    #[test]
    fn wav_sink_appends_plays() {
        let mut sink = WavSink::new();
        assert!(sink.to_wav().is_none());
        play_buffer(&mut sink, &[1.0, 1.0], 0.5, 4).unwrap();
        play_buffer(&mut sink, &[-1.0, -1.0], 0.5, 4).unwrap();
        assert_eq!(sink.samples(), &[0.5, 0.5, -0.5, -0.5]);
        assert_eq!(sink.duration(), 1.0);
        assert_eq!(sink.to_wav().unwrap().len(), 44 + 8);
    }

    #[test]
    fn wav_sink_rejects_rate_change() {
        let mut sink = WavSink::new();
        sink.play(&[0.0], 44100).unwrap();
        let err = sink.play(&[0.0], 22050).unwrap_err();
        assert_eq!(
            err,
            SinkError::RateMismatch {
                expected: 44100,
                found: 22050
            }
        );
    }

    #[test]
    fn full_pipeline_json_to_wav() {
        let config = RenderConfig {
            seed: Some(5),
            volume: 0.5,
            ..RenderConfig::default()
        };
        let wav = crate::render_json_wav(SONG, &config).expect("render failed");

        assert_eq!(&wav[0..4], b"RIFF");
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 8000);

        // Last stroke: bar 1, beat 3 at 0.5 s/beat = 3.5 s, ringing 0.75 s.
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
        assert_eq!(data_size, 2 * 34_000);

        let has_sound = wav[44..]
            .chunks_exact(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]) != 0);
        assert!(has_sound, "Rendered WAV should contain non-silent audio");

        let again = crate::render_json_wav(SONG, &config).unwrap();
        assert_eq!(wav, again, "a fixed seed must reproduce the render");
    }

    #[test]
    fn pipeline_samples_respect_volume() {
        let config = RenderConfig {
            seed: Some(1),
            volume: 0.25,
            ..RenderConfig::default()
        };
        let samples = crate::render_json_samples(SONG, &config).unwrap();
        let loudest = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((loudest - 0.25).abs() < 1e-6);
    }
}
