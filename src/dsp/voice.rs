//! Voice: one ephemeral sound: source + optional filter + envelope.
//!
//! Voices are created per note or hit and carry their own start and stop
//! frames. Past `stop_frame` a voice renders nothing and is due for
//! release by the pool.

use super::envelope::Envelope;
use super::filter::{BiquadFilter, FilterType};
use super::noise::{NoiseBuffer, NoiseLoop};
use super::oscillator::{Oscillator, Waveform};

/// Extra time a source keeps running after its envelope completes.
pub const STOP_TAIL_SECONDS: f64 = 0.05;

/// Where a voice's output lands in the bus graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Music bus, dry only (bass, drums).
    MusicDry,
    /// Music bus, dry plus the reverb send (melody).
    MusicWithReverb,
    /// Straight onto the master bus (wheel clacks).
    Cabin,
}

/// Exponential frequency glide, e.g. the kick's pitch drop.
#[derive(Debug, Clone, Copy)]
pub struct PitchSweep {
    pub from: f64,
    pub to: f64,
    pub seconds: f64,
}

#[derive(Debug, Clone)]
enum Source {
    Tone {
        oscillator: Oscillator,
        sweep: Option<PitchSweep>,
    },
    Noise(NoiseLoop),
}

/// Render output of one voice for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoiceOutput {
    pub dry: f64,
    pub send: f64,
    pub cabin: f64,
}

#[derive(Debug, Clone)]
pub struct Voice {
    source: Source,
    filter: Option<BiquadFilter>,
    pub envelope: Envelope,
    pub route: Route,
    /// Frame at which the voice starts sounding.
    pub start_frame: u64,
    /// Frame after which the voice is silent and can be released.
    pub stop_frame: u64,
    sample_rate: f64,
    elapsed: u64,
}

impl Voice {
    /// An oscillator voice at `frequency` (detuned by `detune` cents).
    pub fn tone(
        waveform: Waveform,
        frequency: f64,
        detune: f64,
        envelope: Envelope,
        route: Route,
        sample_rate: f64,
    ) -> Self {
        let oscillator = Oscillator::tuned(waveform, sample_rate, frequency, detune);
        Self::build(Source::Tone { oscillator, sweep: None }, envelope, route, sample_rate)
    }

    /// A voice that loops a shared noise buffer from `offset`.
    pub fn noise(
        buffer: NoiseBuffer,
        offset: usize,
        envelope: Envelope,
        route: Route,
        sample_rate: f64,
    ) -> Self {
        let source = Source::Noise(NoiseLoop::with_offset(buffer, offset));
        Self::build(source, envelope, route, sample_rate)
    }

    fn build(source: Source, envelope: Envelope, route: Route, sample_rate: f64) -> Self {
        let mut voice = Voice {
            source,
            filter: None,
            envelope,
            route,
            start_frame: 0,
            stop_frame: 0,
            sample_rate,
            elapsed: 0,
        };
        voice.schedule(0);
        voice
    }

    /// Glide the oscillator exponentially. No-op on noise voices.
    pub fn with_sweep(mut self, sweep: PitchSweep) -> Self {
        if let Source::Tone { sweep: s, oscillator } = &mut self.source {
            oscillator.frequency = sweep.from;
            *s = Some(sweep);
        }
        self
    }

    pub fn with_filter(mut self, filter_type: FilterType, frequency: f64, q: f64) -> Self {
        self.filter = Some(BiquadFilter::with_params(filter_type, self.sample_rate, frequency, q));
        self
    }

    /// Start at `start_frame`; the stop frame follows from the envelope.
    pub fn schedule(&mut self, start_frame: u64) {
        let lifetime = self.envelope.length() + STOP_TAIL_SECONDS;
        self.start_frame = start_frame;
        self.stop_frame = start_frame.saturating_add((lifetime * self.sample_rate).ceil() as u64);
        self.elapsed = 0;
    }

    pub fn starting_at(mut self, start_frame: u64) -> Self {
        self.schedule(start_frame);
        self
    }

    /// Render the voice at absolute frame `frame`.
    pub fn render(&mut self, frame: u64) -> VoiceOutput {
        if frame < self.start_frame || frame >= self.stop_frame {
            return VoiceOutput::default();
        }
        if self.elapsed == 0 {
            self.envelope.trigger();
        }

        let raw = match &mut self.source {
            Source::Tone { oscillator, sweep } => {
                if let Some(sweep) = sweep {
                    let t = (self.elapsed as f64 / self.sample_rate / sweep.seconds.max(1e-6)).min(1.0);
                    oscillator.frequency = sweep.from * (sweep.to / sweep.from).powf(t);
                }
                oscillator.next_sample()
            }
            Source::Noise(noise) => noise.next_sample(),
        };
        self.elapsed += 1;

        let shaped = match &mut self.filter {
            Some(f) => f.process(raw),
            None => raw,
        };
        let out = shaped * self.envelope.next_sample();

        match self.route {
            Route::MusicDry => VoiceOutput { dry: out, ..Default::default() },
            Route::MusicWithReverb => VoiceOutput { dry: out, send: out, cabin: 0.0 },
            Route::Cabin => VoiceOutput { cabin: out, ..Default::default() },
        }
    }

    /// Is this voice past its stop frame at `frame`?
    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.stop_frame
    }
}
