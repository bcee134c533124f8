//! DSP: pure Rust synthesis and processing for the cabin soundscape.
//!
//! Everything here is sample-rate aware and allocation-free per sample.
//! The same code runs in a browser AudioWorklet (via WASM) and natively.

pub mod automation;
pub mod bus;
pub mod compressor;
pub mod envelope;
pub mod filter;
pub mod noise;
pub mod oscillator;
pub mod pool;
pub mod reverb;
pub mod voice;
