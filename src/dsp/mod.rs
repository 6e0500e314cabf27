//! DSP — plucked-string synthesis and buffer compositing.
//!
//! Everything here works on whole `Vec<f64>` buffers. Rendering is offline:
//! a finished buffer is only handed to a playback sink at the very end.

pub mod compositor;
pub mod renderer;
pub mod synth;
