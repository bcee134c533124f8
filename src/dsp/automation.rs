//! Time-smoothed control parameters.
//!
//! A `SmoothedParam` approaches its target exponentially with a declared
//! time constant, like WebAudio's `setTargetAtTime`. The render side reads
//! it every sample, so every control write goes through a target rather
//! than a direct value store; that is what keeps gain and filter moves
//! click-free.

/// Remaining distance below which a param snaps onto its target.
const SETTLE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct SmoothedParam {
    value: f64,
    target: f64,
    /// Per-sample approach coefficient, `1 - exp(-1 / (tau * sr))`.
    coeff: f64,
    time_constant: f64,
    sample_rate: f64,
    min: f64,
    max: f64,
}

impl SmoothedParam {
    /// A param resting at `value`, bounded to `[min, max]`.
    pub fn new(value: f64, min: f64, max: f64, sample_rate: f64) -> Self {
        let value = value.clamp(min, max);
        SmoothedParam {
            value,
            target: value,
            coeff: 1.0,
            time_constant: 0.0,
            sample_rate,
            min,
            max,
        }
    }

    /// A gain param, bounded to [0, 1].
    pub fn gain(value: f64, sample_rate: f64) -> Self {
        Self::new(value, 0.0, 1.0, sample_rate)
    }

    /// Start approaching `target` with time constant `time_constant` seconds.
    /// A non-positive time constant jumps straight to the target.
    pub fn set_target(&mut self, target: f64, time_constant: f64) {
        let target = if target.is_finite() { target } else { self.target };
        self.target = target.clamp(self.min, self.max);
        self.time_constant = time_constant.max(0.0);
        self.coeff = if self.time_constant > 0.0 {
            1.0 - (-1.0 / (self.time_constant * self.sample_rate)).exp()
        } else {
            1.0
        };
    }

    /// Jump to `value` with no transition. Only for init and teardown,
    /// while nothing is being rendered.
    pub fn snap(&mut self, value: f64) {
        let value = if value.is_finite() { value } else { self.target };
        self.value = value.clamp(self.min, self.max);
        self.target = self.value;
        self.coeff = 1.0;
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next_value(&mut self) -> f64 {
        if self.value != self.target {
            self.value += (self.target - self.value) * self.coeff;
            if (self.target - self.value).abs() < SETTLE_EPSILON {
                self.value = self.target;
            }
        }
        self.value
    }

    /// Advance `frames` samples at once (closed form).
    pub fn advance(&mut self, frames: usize) -> f64 {
        if self.value != self.target && frames > 0 {
            let remaining = (1.0 - self.coeff).powi(frames.min(i32::MAX as usize) as i32);
            self.value = self.target + (self.value - self.target) * remaining;
            if (self.target - self.value).abs() < SETTLE_EPSILON {
                self.value = self.target;
            }
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn time_constant(&self) -> f64 {
        self.time_constant
    }

    /// True once the value has reached its target.
    pub fn is_settled(&self) -> bool {
        self.value == self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_63_percent_after_one_time_constant() {
        let sr = 1000.0;
        let mut p = SmoothedParam::gain(0.0, sr);
        p.set_target(1.0, 0.5);
        for _ in 0..500 {
            p.next_value();
        }
        let expected = 1.0 - (-1.0_f64).exp();
        assert!((p.value() - expected).abs() < 0.01, "got {}", p.value());
    }

    #[test]
    fn no_jump_on_first_sample() {
        let mut p = SmoothedParam::gain(0.0, 44100.0);
        p.set_target(1.0, 0.1);
        let first = p.next_value();
        assert!(first > 0.0 && first < 0.001, "first step should be tiny, got {first}");
    }

    #[test]
    fn settles_exactly() {
        let mut p = SmoothedParam::gain(0.2, 8000.0);
        p.set_target(0.7, 0.05);
        for _ in 0..8000 {
            p.next_value();
        }
        assert!(p.is_settled());
        assert_eq!(p.value(), 0.7);
    }

    #[test]
    fn targets_are_clamped() {
        let mut p = SmoothedParam::gain(0.5, 8000.0);
        p.set_target(3.0, 0.1);
        assert_eq!(p.target(), 1.0);
        p.set_target(-1.0, 0.1);
        assert_eq!(p.target(), 0.0);
        p.set_target(f64::NAN, 0.1);
        assert_eq!(p.target(), 0.0);
    }

    #[test]
    fn advance_matches_per_sample_stepping() {
        let mut a = SmoothedParam::new(1000.0, 20.0, 20000.0, 44100.0);
        let mut b = a.clone();
        a.set_target(1500.0, 0.2);
        b.set_target(1500.0, 0.2);
        for _ in 0..128 {
            a.next_value();
        }
        b.advance(128);
        assert!((a.value() - b.value()).abs() < 1e-6);
    }

    #[test]
    fn zero_time_constant_jumps() {
        let mut p = SmoothedParam::gain(0.0, 44100.0);
        p.set_target(0.4, 0.0);
        assert_eq!(p.next_value(), 0.4);
    }
}
