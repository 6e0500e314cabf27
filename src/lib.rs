pub mod ast;
pub mod compiler;
pub mod config;
pub mod demos;
pub mod dsp;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pitch;
pub mod song;
pub mod token;

use crate::config::RenderConfig;
use crate::error::{ExprError, PluckError};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::song::Song;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the pluckwalker-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a stroke offset such as `"bar - 1/2"` into an expression tree.
pub fn parse_time_expr(input: &str) -> Result<ast::Expr, ExprError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser::new(tokens);
    Ok(parser.parse_expression()?)
}

/// Render a song to a normalized performance buffer.
///
/// Renders `config.track` alone when set, otherwise mixes every track.
pub fn render(song: &Song, config: &RenderConfig) -> Result<Vec<f64>, PluckError> {
    let mut synth = config.synthesizer();
    let buffer = match &config.track {
        Some(name) => compiler::render_track(&mut synth, song, name)?,
        None => compiler::render_song(&mut synth, song)?,
    };
    Ok(buffer)
}

/// Decode a JSON song and render it to volume-scaled f32 PCM.
pub fn render_json_samples(source: &str, config: &RenderConfig) -> Result<Vec<f32>, PluckError> {
    let song = Song::from_json(source)?;
    Ok(dsp::renderer::to_pcm_f32(&render(&song, config)?, config.volume))
}

/// Decode a JSON song and render it to mono 16-bit WAV bytes.
pub fn render_json_wav(source: &str, config: &RenderConfig) -> Result<Vec<u8>, PluckError> {
    let song = Song::from_json(source)?;
    let buffer = render(&song, config)?;
    Ok(dsp::renderer::render_wav(&buffer, song.rate, config.volume))
}

fn js_config(volume: f64, seed: Option<u64>) -> RenderConfig {
    RenderConfig {
        volume,
        seed,
        ..RenderConfig::default()
    }
}

/// WASM-exposed: compile a JSON song into per-track stroke schedules.
#[wasm_bindgen]
pub fn compile_song(source: &str) -> Result<JsValue, JsValue> {
    let schedules = Song::from_json(source)
        .map_err(PluckError::from)
        .and_then(|song| compiler::schedule_song(&song).map_err(PluckError::from))
        .map_err(|e| JsValue::from_str(&e.report()))?;
    serde_wasm_bindgen::to_value(&schedules).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render a JSON song to mono f32 samples for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_song_samples(source: &str, volume: f64, seed: Option<u64>) -> Result<Vec<f32>, JsValue> {
    render_json_samples(source, &js_config(volume, seed)).map_err(|e| JsValue::from_str(&e.report()))
}

/// WASM-exposed: render a JSON song to a WAV byte array.
#[wasm_bindgen]
pub fn render_song_wav(source: &str, volume: f64, seed: Option<u64>) -> Result<Vec<u8>, JsValue> {
    render_json_wav(source, &js_config(volume, seed)).map_err(|e| JsValue::from_str(&e.report()))
}
