//! Reverb send: convolution against a synthesized impulse response.
//!
//! The impulse response is stereo noise shaped by `(1 - i/N)^k`, a dense
//! diffuse tail with no early reflections. Convolution is uniformly
//! partitioned overlap-save in the frequency domain, so the per-sample cost
//! stays flat however long the tail is. Output lags input by one partition.

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::random::EngineRng;

/// Partition size used by the engine.
pub const PARTITION_SIZE: usize = 128;

/// A stereo impulse response.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl ImpulseResponse {
    /// Synthesize `seconds` of decaying noise, independent per channel,
    /// normalized to unit energy per channel.
    pub fn synthesize(seconds: f64, decay_exponent: f64, sample_rate: f64, rng: &mut EngineRng) -> Self {
        let n = ((seconds * sample_rate) as usize).max(1);
        let mut channel = || -> Vec<f32> {
            let raw: Vec<f64> = (0..n)
                .map(|i| rng.bipolar() * (1.0 - i as f64 / n as f64).powf(decay_exponent))
                .collect();
            let energy: f64 = raw.iter().map(|s| s * s).sum();
            let scale = if energy > 0.0 { 1.0 / energy.sqrt() } else { 0.0 };
            raw.into_iter().map(|s| (s * scale) as f32).collect()
        };
        let left = channel();
        let right = channel();
        ImpulseResponse { left, right }
    }

    pub fn len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mono-in, stereo-out partitioned convolver.
pub struct ConvolutionReverb {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of each zero-padded IR partition (bins 0..=block).
    parts_l: Vec<Vec<Complex32>>,
    parts_r: Vec<Vec<Complex32>>,
    /// Frequency-domain delay line of input windows, newest at `head`.
    history: Vec<Vec<Complex32>>,
    head: usize,
    prev_input: Vec<f32>,
    input: Vec<f32>,
    out_l: Vec<f32>,
    out_r: Vec<f32>,
    pos: usize,
    scratch: Vec<Complex32>,
    acc_l: Vec<Complex32>,
    acc_r: Vec<Complex32>,
}

impl std::fmt::Debug for ConvolutionReverb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionReverb")
            .field("block", &self.block)
            .field("partitions", &self.parts_l.len())
            .finish()
    }
}

impl ConvolutionReverb {
    pub fn new(ir: &ImpulseResponse, block: usize) -> Self {
        let block = block.max(1);
        let n = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);

        let partition = |h: &[f32]| -> Vec<Vec<Complex32>> {
            h.chunks(block)
                .map(|chunk| {
                    let mut buf = vec![Complex32::new(0.0, 0.0); n];
                    for (b, &s) in buf.iter_mut().zip(chunk) {
                        b.re = s;
                    }
                    fft.process(&mut buf);
                    buf.truncate(block + 1);
                    buf
                })
                .collect()
        };
        let mut parts_l = partition(&ir.left);
        let mut parts_r = partition(&ir.right);
        let count = parts_l.len().max(parts_r.len()).max(1);
        parts_l.resize(count, vec![Complex32::new(0.0, 0.0); block + 1]);
        parts_r.resize(count, vec![Complex32::new(0.0, 0.0); block + 1]);

        ConvolutionReverb {
            block,
            fft,
            ifft,
            parts_l,
            parts_r,
            history: vec![vec![Complex32::new(0.0, 0.0); block + 1]; count],
            head: 0,
            prev_input: vec![0.0; block],
            input: vec![0.0; block],
            out_l: vec![0.0; block],
            out_r: vec![0.0; block],
            pos: 0,
            scratch: vec![Complex32::new(0.0, 0.0); n],
            acc_l: vec![Complex32::new(0.0, 0.0); block + 1],
            acc_r: vec![Complex32::new(0.0, 0.0); block + 1],
        }
    }

    /// Number of IR partitions.
    pub fn partitions(&self) -> usize {
        self.parts_l.len()
    }

    /// Latency in samples.
    pub fn latency(&self) -> usize {
        self.block
    }

    /// Push one input sample, get the wet stereo sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        let out = (self.out_l[self.pos], self.out_r[self.pos]);
        self.input[self.pos] = input;
        self.pos += 1;
        if self.pos == self.block {
            self.pos = 0;
            self.convolve_block();
        }
        out
    }

    fn convolve_block(&mut self) {
        let b = self.block;
        let n = b * 2;

        // window = [previous block, current block]
        for (i, c) in self.scratch.iter_mut().enumerate() {
            let s = if i < b { self.prev_input[i] } else { self.input[i - b] };
            *c = Complex32::new(s, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let count = self.history.len();
        self.head = (self.head + count - 1) % count;
        self.history[self.head].copy_from_slice(&self.scratch[..=b]);

        for a in self.acc_l.iter_mut().chain(self.acc_r.iter_mut()) {
            *a = Complex32::new(0.0, 0.0);
        }
        for k in 0..count {
            let x = &self.history[(self.head + k) % count];
            let (hl, hr) = (&self.parts_l[k], &self.parts_r[k]);
            for bin in 0..=b {
                self.acc_l[bin] += x[bin] * hl[bin];
                self.acc_r[bin] += x[bin] * hr[bin];
            }
        }

        let scale = 1.0 / n as f32;
        for (acc, out) in [(&self.acc_l, &mut self.out_l), (&self.acc_r, &mut self.out_r)] {
            // rebuild the Hermitian-symmetric spectrum of a real signal
            self.scratch[..=b].copy_from_slice(acc);
            for bin in (b + 1)..n {
                self.scratch[bin] = acc[n - bin].conj();
            }
            self.ifft.process(&mut self.scratch);
            for (o, c) in out.iter_mut().zip(&self.scratch[b..]) {
                *o = c.re * scale;
            }
        }

        std::mem::swap(&mut self.prev_input, &mut self.input);
    }

    /// Clear all internal buffers.
    pub fn clear(&mut self) {
        for h in &mut self.history {
            h.fill(Complex32::new(0.0, 0.0));
        }
        self.prev_input.fill(0.0);
        self.input.fill(0.0);
        self.out_l.fill(0.0);
        self.out_r.fill(0.0);
        self.pos = 0;
    }
}
