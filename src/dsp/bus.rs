//! Signal bus topology: the fixed mix graph of the cabin.
//!
//! ```text
//! brown noise ─ LP 120 Hz ─ Rumble ──────────────────────────┐
//! pink noise ── HP 400 Hz ─ Rain ────────────────────────────┤
//! white noise ─ RadioStatic ─┐                               ├─ Master ─ tanh ─ out
//! programme ─── RadioMusic ──┴─ BP ~1 kHz ─ RadioMaster ─────┤
//! wheel clacks ──────────────────────────────────────────────┘
//! ```
//!
//! The graph is built once. Buses are addressed by `BusId`; their gains are
//! smoothed params mutated in place, never replaced.

use super::automation::SmoothedParam;
use super::filter::{BiquadFilter, FilterType};
use super::noise::{NoiseBuffer, NoiseLoop};
use crate::config::BusConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusId {
    Master,
    Rumble,
    Rain,
    RadioMaster,
    RadioStatic,
    RadioMusic,
}

impl BusId {
    pub const ALL: [BusId; 6] = [
        BusId::Master,
        BusId::Rumble,
        BusId::Rain,
        BusId::RadioMaster,
        BusId::RadioStatic,
        BusId::RadioMusic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BusId::Master => "master",
            BusId::Rumble => "rumble",
            BusId::Rain => "rain",
            BusId::RadioMaster => "radio-master",
            BusId::RadioStatic => "radio-static",
            BusId::RadioMusic => "radio-music",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A named mix point with one smoothed gain.
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub gain: SmoothedParam,
}

/// The noise buffers the graph loops continuously.
#[derive(Debug, Clone)]
pub struct BedSources {
    pub rumble: NoiseBuffer,
    pub rain: NoiseBuffer,
    pub radio_static: NoiseBuffer,
}

#[derive(Debug)]
pub struct BusGraph {
    buses: Vec<Bus>,
    rumble: Option<NoiseLoop>,
    rain: Option<NoiseLoop>,
    radio_static: Option<NoiseLoop>,
    rumble_filter: BiquadFilter,
    rain_filter: BiquadFilter,
    radio_filter_l: BiquadFilter,
    radio_filter_r: BiquadFilter,
    radio_center: SmoothedParam,
}

impl BusGraph {
    /// Build the graph. Everything but `Master` and `Rumble` starts silent.
    pub fn new(config: &BusConfig, sources: BedSources, sample_rate: f64) -> Self {
        let buses = BusId::ALL
            .iter()
            .map(|&id| {
                let initial = match id {
                    BusId::Master => config.master_gain,
                    BusId::Rumble => config.rumble_gain,
                    _ => 0.0,
                };
                Bus {
                    id,
                    gain: SmoothedParam::gain(initial, sample_rate),
                }
            })
            .collect();

        let radio_filter =
            BiquadFilter::with_params(FilterType::Bandpass, sample_rate, config.radio_filter_hz, config.radio_filter_q);
        BusGraph {
            buses,
            rumble: Some(NoiseLoop::new(sources.rumble)),
            rain: Some(NoiseLoop::new(sources.rain)),
            radio_static: Some(NoiseLoop::new(sources.radio_static)),
            rumble_filter: BiquadFilter::with_params(FilterType::Lowpass, sample_rate, config.rumble_cutoff_hz, 0.707),
            rain_filter: BiquadFilter::with_params(FilterType::Highpass, sample_rate, config.rain_cutoff_hz, 0.707),
            radio_filter_l: radio_filter.clone(),
            radio_filter_r: radio_filter,
            // Audible-range bound only; the filter itself clamps below Nyquist.
            radio_center: SmoothedParam::new(config.radio_filter_hz, 20.0, 20_000.0, sample_rate),
        }
    }

    pub fn bus(&self, id: BusId) -> &Bus {
        &self.buses[id.index()]
    }

    /// Automate a bus gain toward `target` (clamped to [0, 1]).
    pub fn set_gain(&mut self, id: BusId, target: f64, time_constant: f64) {
        self.buses[id.index()].gain.set_target(target, time_constant);
    }

    /// Jump a bus gain with no transition (graph construction only).
    pub fn snap_gain(&mut self, id: BusId, value: f64) {
        self.buses[id.index()].gain.snap(value);
    }

    /// Automate the radio speaker bandpass center.
    pub fn set_radio_center(&mut self, hz: f64, time_constant: f64) {
        self.radio_center.set_target(hz, time_constant);
    }

    pub fn snap_radio_center(&mut self, hz: f64) {
        self.radio_center.snap(hz);
        self.apply_radio_center();
    }

    pub fn radio_center(&self) -> &SmoothedParam {
        &self.radio_center
    }

    /// Advance block-rate automation (filter center) by `frames`.
    pub fn begin_block(&mut self, frames: usize) {
        if !self.radio_center.is_settled() {
            self.radio_center.advance(frames);
            self.apply_radio_center();
        }
    }

    /// The param may sit above Nyquist at low sample rates;
    /// `set_frequency` caps what the filters actually use.
    fn apply_radio_center(&mut self) {
        let hz = self.radio_center.value();
        self.radio_filter_l.set_frequency(hz);
        self.radio_filter_r.set_frequency(hz);
    }

    /// Mix one output frame from the radio programme and cabin transients.
    pub fn process_frame(&mut self, programme: (f32, f32), cabin: f64) -> (f32, f32) {
        let [master, rumble_g, rain_g, radio_master, static_g, music_g] = self.next_gains();

        let rumble = self.rumble.as_mut().map_or(0.0, |n| self.rumble_filter.process(n.next_sample()));
        let rain = self.rain.as_mut().map_or(0.0, |n| self.rain_filter.process(n.next_sample()));
        let hiss = self.radio_static.as_mut().map_or(0.0, NoiseLoop::next_sample);

        let radio_in_l = hiss * static_g + programme.0 as f64 * music_g;
        let radio_in_r = hiss * static_g + programme.1 as f64 * music_g;
        let radio_l = self.radio_filter_l.process(radio_in_l) * radio_master;
        let radio_r = self.radio_filter_r.process(radio_in_r) * radio_master;

        let bed = rumble * rumble_g + rain * rain_g + cabin;
        let left = soft_clip((bed + radio_l) * master);
        let right = soft_clip((bed + radio_r) * master);
        (left as f32, right as f32)
    }

    fn next_gains(&mut self) -> [f64; 6] {
        let mut gains = [0.0; 6];
        for (g, bus) in gains.iter_mut().zip(self.buses.iter_mut()) {
            *g = bus.gain.next_value();
        }
        gains
    }

    /// Drop the looped noise sources (teardown).
    pub fn release_sources(&mut self) {
        self.rumble = None;
        self.rain = None;
        self.radio_static = None;
    }

    pub fn has_sources(&self) -> bool {
        self.rumble.is_some() || self.rain.is_some() || self.radio_static.is_some()
    }

    /// Snap every automation to silence so nothing keeps moving.
    pub fn silence(&mut self) {
        for bus in &mut self.buses {
            bus.gain.snap(0.0);
        }
        let center = self.radio_center.value();
        self.radio_center.snap(center);
    }

    /// True when no automation is in flight.
    pub fn is_settled(&self) -> bool {
        self.buses.iter().all(|b| b.gain.is_settled()) && self.radio_center.is_settled()
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
