//! Seedable randomness shared by every generator in the engine.
//!
//! Detune, dropout jitter, melody choice, clack jitter, noise buffers and
//! the reverb tail all draw from one `EngineRng`, so a fixed seed makes a
//! whole session reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct EngineRng {
    rng: StdRng,
}

impl EngineRng {
    pub fn new(seed: u64) -> Self {
        EngineRng {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform in [0, 1).
    pub fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform in [-1, 1).
    pub fn bipolar(&mut self) -> f64 {
        self.unit() * 2.0 - 1.0
    }

    /// True with probability `p` (clamped to [0, 1]).
    pub fn chance(&mut self, p: f64) -> bool {
        let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
        self.rng.gen_bool(p)
    }

    /// +1.0 or -1.0 with equal probability.
    pub fn sign(&mut self) -> f64 {
        if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 }
    }

    /// Symmetric jitter in [-amount, amount).
    pub fn jitter(&mut self, amount: f64) -> f64 {
        self.bipolar() * amount.abs()
    }

    /// Uniform index into a slice of length `len` (0 for empty).
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}
