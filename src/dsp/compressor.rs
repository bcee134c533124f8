//! Bus compressor gluing the independently scheduled music voices together.
//!
//! Feed-forward design with a soft knee, following the behaviour of the
//! WebAudio DynamicsCompressorNode (threshold, ratio, knee, attack,
//! release). Stereo-linked: both channels get the same gain.

use crate::config::CompressorConfig;

#[derive(Debug, Clone)]
pub struct Compressor {
    /// Threshold in dB.
    threshold: f64,
    ratio: f64,
    /// Knee width in dB (0 = hard knee).
    knee: f64,
    attack_coef: f64,
    release_coef: f64,

    /// Peak envelope (linear).
    envelope: f64,
}

impl Compressor {
    pub fn new(config: &CompressorConfig, sample_rate: f64) -> Self {
        let attack = config.attack.clamp(0.0001, 1.0);
        let release = config.release.clamp(0.001, 5.0);
        Compressor {
            threshold: config.threshold.clamp(-100.0, 0.0),
            ratio: config.ratio.clamp(1.0, 20.0),
            knee: config.knee.clamp(0.0, 40.0),
            attack_coef: (-1.0 / (attack * sample_rate)).exp(),
            release_coef: (-1.0 / (release * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 1e-6 { -120.0 } else { 20.0 * linear.log10() }
    }

    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Gain change in dB (≤ 0) for an input level in dB.
    fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee / 2.0;
        let over = input_db - self.threshold;

        if self.knee <= 0.0 || over >= half_knee {
            if over <= 0.0 { 0.0 } else { -over * slope }
        } else if over <= -half_knee {
            0.0
        } else {
            // quadratic interpolation through the knee
            let x = over + half_knee;
            -slope * x * x / (2.0 * self.knee)
        }
    }

    /// Compress one stereo frame.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let level = left.abs().max(right.abs()) as f64;
        let coef = if level > self.envelope { self.attack_coef } else { self.release_coef };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let gain = Self::db_to_linear(self.gain_reduction_db(Self::linear_to_db(self.envelope))) as f32;
        (left * gain, right * gain)
    }

    /// Current gain reduction in dB (positive number), for diagnostics.
    pub fn gain_reduction(&self) -> f64 {
        -self.gain_reduction_db(Self::linear_to_db(self.envelope))
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glue() -> Compressor {
        Compressor::new(&CompressorConfig::default(), 44100.0)
    }

    fn settle(c: &mut Compressor, level: f32, frames: usize) -> f32 {
        let mut out = 0.0;
        for _ in 0..frames {
            out = c.process(level, level).0;
        }
        out
    }

    #[test]
    fn quiet_signal_passes_untouched() {
        let mut c = glue();
        // -46 dB: far below the knee around -24 dB
        let out = settle(&mut c, 0.005, 5000);
        assert!((out - 0.005).abs() < 1e-5, "got {out}");
    }

    #[test]
    fn loud_signal_is_squashed_hard() {
        let mut c = glue();
        let out = settle(&mut c, 1.0, 20_000);
        // 24 dB over threshold at 12:1 leaves ~2 dB of rise: about -22 dB
        let out_db = 20.0 * (out as f64).log10();
        assert!(out_db < -18.0 && out_db > -26.0, "expected ~-22 dB, got {out_db}");
    }

    #[test]
    fn knee_is_continuous() {
        let c = glue();
        let mut prev = c.gain_reduction_db(-60.0);
        let mut db = -60.0;
        while db < 0.0 {
            let g = c.gain_reduction_db(db);
            assert!(g <= prev + 1e-9, "reduction must not shrink as level rises");
            assert!((g - prev).abs() < 0.2, "jump at {db} dB: {prev} -> {g}");
            prev = g;
            db += 0.01;
        }
    }

    #[test]
    fn gain_recovers_after_release() {
        let mut c = glue();
        settle(&mut c, 1.0, 5000);
        let squashed = c.gain_reduction();
        settle(&mut c, 0.0, 44100);
        assert!(squashed > 10.0);
        assert!(c.gain_reduction() < 0.5, "should release, still {} dB", c.gain_reduction());
    }

    #[test]
    fn channels_share_gain() {
        let mut c = glue();
        settle(&mut c, 0.8, 3000);
        let (l, r) = c.process(0.8, 0.4);
        assert!((l / r - 2.0).abs() < 1e-4);
    }
}
