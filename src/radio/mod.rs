//! The in-cabin radio: tuning model, station programmes and the receiver
//! that turns dial moves into bus automation.
//!
//! The receiver is the only writer of `RadioMaster`, `RadioStatic`,
//! `RadioMusic` and the speaker bandpass center.

pub mod buzzer;
pub mod tuning;

use tracing::{debug, trace};

use crate::config::{EngineConfig, SmoothingConfig};
use crate::dsp::automation::SmoothedParam;
use crate::dsp::bus::{BusGraph, BusId};
use crate::inputs::CabinInputs;
use crate::random::EngineRng;

use buzzer::Buzzer;
use tuning::{StationKind, TuningModel, TuningResult};

#[derive(Debug)]
pub struct Receiver {
    model: TuningModel,
    buzzer: Buzzer,
    /// Programme crossfade: which station's source feeds `RadioMusic`.
    music_gate: SmoothedParam,
    buzzer_gate: SmoothedParam,
    programme: StationKind,
    base_center: f64,
    smoothing: SmoothingConfig,
    last: Option<TuningResult>,
}

impl Receiver {
    pub fn new(config: &EngineConfig) -> Self {
        let sr = config.sample_rate;
        Receiver {
            model: TuningModel::new(&config.radio),
            buzzer: Buzzer::new(&config.radio.buzzer, sr),
            music_gate: SmoothedParam::gain(1.0, sr),
            buzzer_gate: SmoothedParam::gain(0.0, sr),
            programme: StationKind::Music,
            base_center: config.buses.radio_filter_hz,
            smoothing: config.smoothing.clone(),
            last: None,
        }
    }

    pub fn model(&self) -> &TuningModel {
        &self.model
    }

    /// Station whose programme currently feeds the music bus.
    pub fn programme(&self) -> StationKind {
        self.programme
    }

    /// The most recent tuning evaluation.
    pub fn last_result(&self) -> Option<&TuningResult> {
        self.last.as_ref()
    }

    /// Set the initial radio levels with no transition (graph build time).
    pub fn prime(&mut self, inputs: &CabinInputs, graph: &mut BusGraph, rng: &mut EngineRng) -> TuningResult {
        let result = self.model.evaluate(inputs.radio_frequency, rng);
        graph.snap_gain(BusId::RadioStatic, result.static_volume);
        graph.snap_gain(BusId::RadioMusic, result.music_volume);
        graph.snap_gain(BusId::RadioMaster, power_target(inputs));
        graph.snap_radio_center(self.base_center + result.filter_drift_hz);
        if let Some(kind) = result.station {
            self.programme = kind;
            let (music, buzz) = gates_for(kind);
            self.music_gate.snap(music);
            self.buzzer_gate.snap(buzz);
        }
        self.last = Some(result);
        result
    }

    /// Recompute the tuning result and automate every radio parameter
    /// toward it. Call whenever dial, power or volume change.
    pub fn retune(&mut self, inputs: &CabinInputs, graph: &mut BusGraph, rng: &mut EngineRng) -> TuningResult {
        let result = self.model.evaluate(inputs.radio_frequency, rng);
        let s = &self.smoothing;
        graph.set_gain(BusId::RadioStatic, result.static_volume, s.tuning);
        graph.set_gain(BusId::RadioMusic, result.music_volume, s.tuning);
        graph.set_gain(BusId::RadioMaster, power_target(inputs), s.radio_power);
        graph.set_radio_center(self.base_center + result.filter_drift_hz, s.filter_drift);

        if let Some(kind) = result.station.filter(|&k| k != self.programme) {
            debug!(from = ?self.programme, to = ?kind, "radio programme change");
            self.programme = kind;
            let (music, buzz) = gates_for(kind);
            self.music_gate.set_target(music, s.programme_crossfade);
            self.buzzer_gate.set_target(buzz, s.programme_crossfade);
        }
        trace!(
            frequency = inputs.radio_frequency,
            quality = result.signal_quality,
            drift = result.filter_drift_hz,
            "retuned"
        );
        self.last = Some(result);
        result
    }

    /// Mix the programme feeding `RadioMusic` for one frame.
    #[inline]
    pub fn programme_frame(&mut self, music: (f32, f32)) -> (f32, f32) {
        let m = self.music_gate.next_value();
        let b = self.buzzer_gate.next_value();
        let buzz = if b > 0.0 { self.buzzer.next_sample() * b } else { 0.0 };
        ((music.0 as f64 * m + buzz) as f32, (music.1 as f64 * m + buzz) as f32)
    }

    /// Freeze the programme crossfade (teardown).
    pub fn silence(&mut self) {
        self.music_gate.snap(0.0);
        self.buzzer_gate.snap(0.0);
    }

    pub fn is_settled(&self) -> bool {
        self.music_gate.is_settled() && self.buzzer_gate.is_settled()
    }
}

fn power_target(inputs: &CabinInputs) -> f64 {
    if inputs.radio_on { inputs.radio_volume } else { 0.0 }
}

fn gates_for(kind: StationKind) -> (f64, f64) {
    match kind {
        StationKind::Music => (1.0, 0.0),
        StationKind::Buzzer => (0.0, 1.0),
    }
}
