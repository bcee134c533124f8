//! Radio tuning model: dial position to signal quality.
//!
//! A pure function of the dial frequency, the station table and one draw
//! from the engine RNG. Recomputing it is idempotent in the sense that it
//! always derives fresh output from the current inputs.

use serde::{Deserialize, Serialize};

use crate::config::RadioConfig;
use crate::random::EngineRng;

/// What a station broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationKind {
    /// The generative sequencer.
    Music,
    /// A monotone buzzer repeating in bursts.
    Buzzer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub kind: StationKind,
    /// Carrier frequency in MHz.
    pub frequency: f64,
    /// Half-width of the receivable window around the carrier, in MHz.
    pub capture_bandwidth: f64,
}

/// Derived receiver state for one dial position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningResult {
    /// The station being received, if the dial is inside its window.
    pub station: Option<StationKind>,
    /// Distance in MHz to the nearest station.
    pub distance: f64,
    pub signal_quality: f64,
    pub static_volume: f64,
    pub music_volume: f64,
    /// Signed offset for the speaker bandpass center, in Hz.
    pub filter_drift_hz: f64,
}

/// Linear falloff from 1 on the carrier to 0 at the band edge.
pub fn signal_quality(distance: f64, capture_bandwidth: f64) -> f64 {
    if capture_bandwidth <= 0.0 || !distance.is_finite() || distance >= capture_bandwidth {
        return 0.0;
    }
    (1.0 - distance.abs() / capture_bandwidth).clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct TuningModel {
    stations: Vec<Station>,
    min_frequency: f64,
    max_frequency: f64,
    dropout_threshold: f64,
    dropout_probability: f64,
    static_span: f64,
    static_floor: f64,
    drift_hz_per_mhz: f64,
}

impl TuningModel {
    pub fn new(config: &RadioConfig) -> Self {
        TuningModel {
            stations: config.stations.clone(),
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            dropout_threshold: config.dropout_threshold,
            dropout_probability: config.dropout_probability,
            static_span: config.static_span,
            static_floor: config.static_floor,
            drift_hz_per_mhz: config.drift_hz_per_mhz,
        }
    }

    /// Clamp a dial position into the band. NaN reads as the bottom.
    pub fn clamp_frequency(&self, frequency: f64) -> f64 {
        if frequency.is_finite() {
            frequency.clamp(self.min_frequency, self.max_frequency)
        } else {
            self.min_frequency
        }
    }

    /// Nearest station and its distance in MHz.
    pub fn nearest(&self, frequency: f64) -> Option<(&Station, f64)> {
        self.stations
            .iter()
            .map(|s| (s, (frequency - s.frequency).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Evaluate the receiver at `frequency` (clamped into the band).
    pub fn evaluate(&self, frequency: f64, rng: &mut EngineRng) -> TuningResult {
        let frequency = self.clamp_frequency(frequency);
        let Some((station, distance)) = self.nearest(frequency) else {
            return self.shape(None, f64::INFINITY, 0.0, 0.0);
        };

        let mut quality = signal_quality(distance, station.capture_bandwidth);
        if quality > 0.0 && quality < self.dropout_threshold && rng.chance(self.dropout_probability) {
            quality *= 0.5;
        }
        let captured = (distance < station.capture_bandwidth).then_some(station.kind);
        let drift = distance.min(station.capture_bandwidth) * self.drift_hz_per_mhz * rng.sign();
        self.shape(captured, distance, quality, drift)
    }

    fn shape(&self, station: Option<StationKind>, distance: f64, quality: f64, drift: f64) -> TuningResult {
        TuningResult {
            station,
            distance,
            signal_quality: quality,
            static_volume: (1.0 - quality) * self.static_span + self.static_floor,
            music_volume: quality,
            filter_drift_hz: drift,
        }
    }
}
