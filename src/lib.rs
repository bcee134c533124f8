pub mod clack;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod inputs;
pub mod music;
pub mod radio;
pub mod random;
pub mod scheduler;

use crate::config::EngineConfig;
use crate::engine::{AudioEngine, RenderState};
use crate::inputs::{CabinInputs, Weather};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the cabin_soundscape version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed soundscape for an AudioWorklet host.
///
/// The worklet calls `update` with the elapsed time and `process` with an
/// interleaved stereo buffer on every render quantum; the main thread
/// forwards cabin state through the setters.
#[wasm_bindgen]
pub struct Soundscape {
    engine: AudioEngine,
}

#[wasm_bindgen]
impl Soundscape {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, seed: u64) -> Soundscape {
        let config = EngineConfig {
            seed,
            ..EngineConfig::with_sample_rate(sample_rate)
        };
        Soundscape {
            engine: AudioEngine::with_backend(config, engine::PullBackend),
        }
    }

    /// Build from a (possibly partial) config object.
    pub fn from_config(config: JsValue) -> Result<Soundscape, JsValue> {
        let config: EngineConfig =
            serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(Soundscape {
            engine: AudioEngine::with_backend(config, engine::PullBackend),
        })
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.engine.set_audio_enabled(enabled);
    }

    /// Weather by name: "clear", "cloudy", "rain" or "snow".
    pub fn set_weather(&mut self, weather: &str) {
        self.engine.set_weather(Weather::from_name(weather));
    }

    pub fn set_time_of_day(&mut self, hours: f64) {
        self.engine.set_time_of_day(hours);
    }

    pub fn set_radio_on(&mut self, on: bool) {
        self.engine.set_radio_on(on);
    }

    pub fn set_radio_frequency(&mut self, mhz: f64) {
        self.engine.set_radio_frequency(mhz);
    }

    pub fn set_radio_volume(&mut self, volume: f64) {
        self.engine.set_radio_volume(volume);
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.engine.set_speed(speed);
    }

    /// Apply a full `CabinInputs` snapshot object.
    pub fn apply_inputs(&mut self, inputs: JsValue) -> Result<(), JsValue> {
        let inputs: CabinInputs =
            serde_wasm_bindgen::from_value(inputs).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        self.engine.apply_inputs(&inputs);
        Ok(())
    }

    pub fn notify_user_gesture(&mut self) {
        self.engine.notify_user_gesture();
    }

    /// Advance the control clock by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        self.engine.update(dt);
    }

    /// Render into an interleaved stereo buffer.
    pub fn process(&mut self, out: &mut [f32]) {
        self.engine.render(out);
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.engine.state() == RenderState::Running
    }

    pub fn live_voices(&self) -> usize {
        self.engine.live_voices()
    }

    pub fn pending_tasks(&self) -> usize {
        self.engine.pending_tasks()
    }

    /// Signal quality of the last tuning evaluation.
    pub fn signal_quality(&self) -> f64 {
        self.engine.tuning().map_or(0.0, |t| t.signal_quality)
    }
}
