//! Noise primitives: precomputed, looped white/brown/pink buffers.
//!
//! Buffers are generated once and shared read-only by every voice or bus
//! source that loops them. A fixed-length loop becomes audibly periodic
//! after a long listen, which is accepted in exchange for not synthesizing
//! noise continuously.

use std::sync::Arc;

use crate::random::EngineRng;

/// Noise colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    White,
    /// Leaky-integrated white noise; rumble source.
    Brown,
    /// Kellett-filtered white noise; rain source.
    Pink,
}

/// An immutable, cheaply cloneable sample buffer.
#[derive(Debug, Clone)]
pub struct NoiseBuffer {
    kind: NoiseKind,
    samples: Arc<[f32]>,
}

impl NoiseBuffer {
    pub fn kind(&self) -> NoiseKind {
        self.kind
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of live handles onto the shared storage.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.samples)
    }
}

/// Generate `duration_seconds` of noise at `sample_rate`.
pub fn generate_noise(
    kind: NoiseKind,
    duration_seconds: f64,
    sample_rate: f64,
    rng: &mut EngineRng,
) -> NoiseBuffer {
    let len = ((duration_seconds * sample_rate) as usize).max(1);
    let samples: Vec<f32> = match kind {
        NoiseKind::White => (0..len).map(|_| rng.bipolar() as f32).collect(),
        NoiseKind::Brown => {
            let mut last = 0.0_f64;
            (0..len)
                .map(|_| {
                    let white = rng.bipolar();
                    last = (last + 0.02 * white) / 1.02;
                    // restore energy lost to the integrator
                    (last * 3.5) as f32
                })
                .collect()
        }
        NoiseKind::Pink => {
            let mut pink = KellettPink::default();
            (0..len).map(|_| pink.next(rng.bipolar()) as f32).collect()
        }
    };
    NoiseBuffer {
        kind,
        samples: samples.into(),
    }
}

/// Paul Kellett's refined pink filter (accurate to ±0.05 dB above 9.2 Hz).
#[derive(Debug, Default, Clone)]
struct KellettPink {
    b: [f64; 7],
}

impl KellettPink {
    fn next(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;
        out * 0.11
    }
}

/// A looping read cursor over a shared noise buffer.
#[derive(Debug, Clone)]
pub struct NoiseLoop {
    buffer: NoiseBuffer,
    pos: usize,
}

impl NoiseLoop {
    pub fn new(buffer: NoiseBuffer) -> Self {
        NoiseLoop { buffer, pos: 0 }
    }

    /// Start reading at `offset` (wrapped), so voices sharing one buffer
    /// don't all play the same stretch of it.
    pub fn with_offset(buffer: NoiseBuffer, offset: usize) -> Self {
        let pos = if buffer.is_empty() { 0 } else { offset % buffer.len() };
        NoiseLoop { buffer, pos }
    }

    pub fn next_sample(&mut self) -> f64 {
        let samples = self.buffer.samples();
        if samples.is_empty() {
            return 0.0;
        }
        let s = samples[self.pos];
        self.pos += 1;
        if self.pos >= samples.len() {
            self.pos = 0;
        }
        s as f64
    }
}
