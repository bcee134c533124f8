//! The buzzer station's programme: one pitch, switched on and off.

use crate::config::BuzzerConfig;
use crate::dsp::automation::SmoothedParam;
use crate::dsp::oscillator::{Oscillator, Waveform};

/// Gate ramp time constant, short enough to sound like a hard switch.
const GATE_TIME_CONSTANT: f64 = 0.005;

#[derive(Debug, Clone)]
pub struct Buzzer {
    oscillator: Oscillator,
    gate: SmoothedParam,
    period_frames: u64,
    on_frames: u64,
    position: u64,
    level: f64,
}

impl Buzzer {
    pub fn new(config: &BuzzerConfig, sample_rate: f64) -> Self {
        let period_frames = ((config.period * sample_rate) as u64).max(2);
        let on_frames = ((period_frames as f64 * config.duty) as u64).min(period_frames);
        Buzzer {
            oscillator: Oscillator::tuned(Waveform::Sawtooth, sample_rate, config.frequency_hz, 0.0),
            gate: SmoothedParam::gain(0.0, sample_rate),
            period_frames,
            on_frames,
            position: 0,
            level: config.level,
        }
    }

    /// True while the current burst is sounding.
    pub fn is_on(&self) -> bool {
        self.position < self.on_frames
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        if self.position == 0 && self.on_frames > 0 {
            self.gate.set_target(1.0, GATE_TIME_CONSTANT);
        } else if self.position == self.on_frames {
            self.gate.set_target(0.0, GATE_TIME_CONSTANT);
        }
        self.position = (self.position + 1) % self.period_frames;
        self.oscillator.next_sample() * self.gate.next_value() * self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 8000.0;

    fn mean_abs(s: &[f64]) -> f64 {
        s.iter().map(|x| x.abs()).sum::<f64>() / s.len() as f64
    }

    #[test]
    fn sounds_in_bursts() {
        let mut b = Buzzer::new(&BuzzerConfig::default(), SR);
        let period: Vec<f64> = (0..8000).map(|_| b.next_sample()).collect();
        let on = mean_abs(&period[800..3200]);
        let off = mean_abs(&period[4800..7600]);
        assert!(on > 0.05, "burst should be audible, got {on}");
        assert!(off < on * 1e-3, "gap should be silent: on={on} off={off}");
    }

    #[test]
    fn starts_without_a_click() {
        let mut b = Buzzer::new(&BuzzerConfig::default(), SR);
        assert!(b.next_sample().abs() < 0.01);
    }

    #[test]
    fn repeats_every_period() {
        let mut b = Buzzer::new(&BuzzerConfig::default(), SR);
        assert!(b.is_on());
        for _ in 0..4000 {
            b.next_sample();
        }
        assert!(!b.is_on());
        for _ in 0..4000 {
            b.next_sample();
        }
        assert!(b.is_on(), "second burst begins after one period");
    }
}
