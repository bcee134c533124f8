//! Audio Engine: the cabin soundscape as one owned object.
//!
//! Two clocks drive it. The host calls `update(dt)` on the control clock,
//! which runs the sequencer and clack tasks and spawns voices; the host
//! calls `render` on the audio side, which consumes the bus graph sample
//! by sample. Input setters only ever write automation targets.
//!
//! Render chain per frame:
//!
//! ```text
//! voices ─┬─ dry ───────────────────────┐
//!         └─ send ─ convolution ─ wet ──┴─ compressor ─ programme ─ RadioMusic
//! clack voices ─ cabin ─────────────────────────────────────────── Master
//! ```

use tracing::{debug, info, trace, warn};

use crate::clack::{ClackGenerator, ClackState};
use crate::config::EngineConfig;
use crate::dsp::automation::SmoothedParam;
use crate::dsp::bus::{BedSources, BusGraph, BusId};
use crate::dsp::compressor::Compressor;
use crate::dsp::noise::{NoiseKind, generate_noise};
use crate::dsp::pool::VoicePool;
use crate::dsp::reverb::{ConvolutionReverb, ImpulseResponse, PARTITION_SIZE};
use crate::dsp::voice::Voice;
use crate::error::EngineError;
use crate::inputs::{CabinInputs, Weather, finite_or};
use crate::music::instruments::Instruments;
use crate::music::sequencer::{Sequencer, SequencerState};
use crate::radio::Receiver;
use crate::radio::tuning::TuningResult;
use crate::random::EngineRng;
use crate::scheduler::{DueTask, Scheduler, Task, TaskHandle};

/// Frames per render block; block-rate automation and voice sweeps run
/// once per block.
pub const BLOCK_SIZE: usize = PARTITION_SIZE;

/// A repeating task that falls further behind than this restarts from
/// the current time instead of replaying every missed firing.
const MAX_CATCH_UP: f64 = 1.0;

/// The platform audio output the engine renders into.
pub trait RenderBackend {
    /// Start (or restart) consuming audio. May fail until the platform
    /// allows playback, e.g. before a user gesture.
    fn resume(&mut self) -> Result<(), EngineError>;
    /// Stop consuming audio without tearing anything down.
    fn suspend(&mut self) -> Result<(), EngineError>;
}

/// Backend for hosts that pull samples through `render` themselves
/// (an AudioWorklet or a test harness). Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PullBackend;

impl RenderBackend for PullBackend {
    fn resume(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Audio disabled by the host.
    Suspended,
    /// Audio enabled but the backend refused to start; retried on the
    /// next input event or user gesture.
    PendingResume,
    Running,
    /// Shut down for good.
    Closed,
}

/// Everything that spawns voices; dropped at teardown.
#[derive(Debug)]
struct Generators {
    sequencer: Sequencer,
    instruments: Instruments,
    clack: ClackGenerator,
}

#[derive(Debug)]
pub struct AudioEngine<B: RenderBackend = PullBackend> {
    config: EngineConfig,
    backend: B,
    state: RenderState,
    inputs: CabinInputs,
    rng: EngineRng,
    scheduler: Scheduler,
    graph: BusGraph,
    receiver: Receiver,
    generators: Option<Generators>,
    sequencer_task: Option<TaskHandle>,
    pool: VoicePool,
    reverb: ConvolutionReverb,
    compressor: Compressor,
    wet: f32,
    frame: u64,
    dropped_voices: u64,
}

impl AudioEngine<PullBackend> {
    /// An engine with default configuration at `sample_rate`.
    pub fn new(sample_rate: f64) -> Self {
        Self::with_backend(EngineConfig::with_sample_rate(sample_rate), PullBackend)
    }

    /// Build from a (possibly partial) JSON config.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(Self::with_backend(EngineConfig::from_json(json)?, PullBackend))
    }
}

impl<B: RenderBackend> AudioEngine<B> {
    /// Build the whole graph and arm both repeating tasks. Audio starts
    /// disabled; nothing is rendered until `set_audio_enabled(true)`.
    pub fn with_backend(config: EngineConfig, backend: B) -> Self {
        let config = config.validated();
        let sr = config.sample_rate;
        let mut rng = EngineRng::new(config.seed);

        let white = generate_noise(NoiseKind::White, config.noise.white_seconds, sr, &mut rng);
        let brown = generate_noise(NoiseKind::Brown, config.noise.brown_seconds, sr, &mut rng);
        let pink = generate_noise(NoiseKind::Pink, config.noise.pink_seconds, sr, &mut rng);
        let ir = ImpulseResponse::synthesize(config.reverb.seconds, config.reverb.decay_exponent, sr, &mut rng);

        let inputs = CabinInputs {
            radio_frequency: config.radio.initial_frequency,
            radio_volume: config.radio.initial_volume,
            ..CabinInputs::default()
        };

        let mut graph = BusGraph::new(
            &config.buses,
            BedSources {
                rumble: brown,
                rain: pink,
                radio_static: white.clone(),
            },
            sr,
        );
        let mut receiver = Receiver::new(&config);
        receiver.prime(&inputs, &mut graph, &mut rng);

        let generators = Generators {
            sequencer: Sequencer::new(&config.sequencer),
            instruments: Instruments::new(&config.sequencer, white.clone(), sr),
            clack: ClackGenerator::new(&config.clack, white, sr),
        };

        let mut engine = AudioEngine {
            pool: VoicePool::new(config.max_voices),
            reverb: ConvolutionReverb::new(&ir, BLOCK_SIZE),
            compressor: Compressor::new(&config.compressor, sr),
            wet: config.reverb.wet as f32,
            backend,
            state: RenderState::Suspended,
            inputs,
            rng,
            scheduler: Scheduler::new(),
            graph,
            receiver,
            generators: Some(generators),
            sequencer_task: None,
            frame: 0,
            dropped_voices: 0,
            config,
        };
        engine.arm();
        info!(
            sample_rate = sr,
            seed = engine.config.seed,
            reverb_partitions = engine.reverb.partitions(),
            "soundscape engine started"
        );
        engine
    }

    fn arm(&mut self) {
        self.sequencer_task = Some(self.scheduler.schedule(0.0, Task::SequencerTick));
        let delay = match &self.generators {
            Some(g) => g.clack.next_delay(self.inputs.speed, &mut self.rng),
            None => return,
        };
        let handle = self.scheduler.schedule(delay, Task::ClackFire);
        if let Some(g) = self.generators.as_mut() {
            g.clack.set_pending(Some(handle));
        }
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Resume or suspend rendering. Scheduled tasks keep their state
    /// either way.
    pub fn set_audio_enabled(&mut self, enabled: bool) {
        if self.state == RenderState::Closed {
            return;
        }
        self.inputs.audio_enabled = enabled;
        if enabled {
            if self.state != RenderState::Running {
                self.try_resume();
            }
        } else if self.state != RenderState::Suspended {
            if let Err(e) = self.backend.suspend() {
                warn!(error = %e, "suspend failed");
            }
            self.state = RenderState::Suspended;
            info!("audio suspended");
        }
    }

    pub fn set_weather(&mut self, weather: Weather) {
        if self.input_event() {
            return;
        }
        self.inputs.weather = weather;
        let target = self.rain_target(weather);
        self.graph.set_gain(BusId::Rain, target, self.config.smoothing.weather);
        debug!(?weather, rain = target, "weather changed");
    }

    pub fn set_time_of_day(&mut self, hours: f64) {
        if self.input_event() {
            return;
        }
        self.inputs.time_of_day = finite_or(hours, self.inputs.time_of_day).rem_euclid(24.0);
    }

    pub fn set_radio_on(&mut self, on: bool) {
        if self.input_event() {
            return;
        }
        self.inputs.radio_on = on;
        self.retune();
    }

    /// Move the dial. Clamped into the band.
    pub fn set_radio_frequency(&mut self, mhz: f64) {
        if self.input_event() {
            return;
        }
        let mhz = finite_or(mhz, self.inputs.radio_frequency);
        self.inputs.radio_frequency = self.receiver.model().clamp_frequency(mhz);
        self.retune();
    }

    pub fn set_radio_volume(&mut self, volume: f64) {
        if self.input_event() {
            return;
        }
        self.inputs.radio_volume = finite_or(volume, self.inputs.radio_volume).clamp(0.0, 1.0);
        self.retune();
    }

    /// Current vehicle speed. Read lazily by the clack generator.
    pub fn set_speed(&mut self, speed: f64) {
        if self.state == RenderState::Closed {
            return;
        }
        self.inputs.speed = finite_or(speed, self.inputs.speed).max(0.0);
    }

    /// Apply a full snapshot, acting only on the fields that changed.
    pub fn apply_inputs(&mut self, next: &CabinInputs) {
        if self.state == RenderState::Closed {
            return;
        }
        let prev = self.inputs.clone();
        if next.speed != prev.speed {
            self.set_speed(next.speed);
        }
        if next.time_of_day != prev.time_of_day {
            self.set_time_of_day(next.time_of_day);
        }
        if next.weather != prev.weather {
            self.set_weather(next.weather);
        }
        let radio_changed = next.radio_on != prev.radio_on
            || next.radio_frequency != prev.radio_frequency
            || next.radio_volume != prev.radio_volume;
        if radio_changed {
            self.inputs.radio_on = next.radio_on;
            self.inputs.radio_volume = finite_or(next.radio_volume, prev.radio_volume).clamp(0.0, 1.0);
            // one retune for the whole radio change
            self.set_radio_frequency(next.radio_frequency);
        }
        if next.audio_enabled != prev.audio_enabled {
            self.set_audio_enabled(next.audio_enabled);
        }
    }

    /// A user gesture happened; platforms that block autoplay allow a
    /// resume now.
    pub fn notify_user_gesture(&mut self) {
        self.input_event();
    }

    /// Common prologue of every input event: a pending resume is retried.
    /// Returns true if the engine is closed and the event must be ignored.
    fn input_event(&mut self) -> bool {
        match self.state {
            RenderState::Closed => true,
            RenderState::PendingResume => {
                self.try_resume();
                false
            }
            _ => false,
        }
    }

    fn try_resume(&mut self) {
        match self.backend.resume() {
            Ok(()) => {
                self.state = RenderState::Running;
                info!("audio running");
            }
            Err(e) => {
                if self.state != RenderState::PendingResume {
                    warn!(error = %e, "audio output unavailable; will retry on next input");
                }
                self.state = RenderState::PendingResume;
            }
        }
    }

    fn retune(&mut self) {
        self.receiver.retune(&self.inputs, &mut self.graph, &mut self.rng);
    }

    fn rain_target(&self, weather: Weather) -> f64 {
        match weather {
            Weather::Rain => self.config.buses.rain_level,
            Weather::Snow => self.config.buses.snow_level,
            Weather::Clear | Weather::Cloudy => 0.0,
        }
    }

    // ------------------------------------------------------------------
    // Control clock
    // ------------------------------------------------------------------

    /// Advance the control clock by `dt` seconds and run every task that
    /// came due.
    pub fn update(&mut self, dt: f64) {
        if self.state == RenderState::Closed {
            return;
        }
        self.scheduler.advance(dt);
        while let Some(due) = self.scheduler.pop_due() {
            self.run(due);
        }
    }

    fn run(&mut self, due: DueTask) {
        match due.task {
            Task::SequencerTick => self.sequencer_tick(due.at),
            Task::ClackFire => self.clack_fire(due.at),
        }
    }

    fn is_active(&self) -> bool {
        self.state == RenderState::Running
    }

    fn sequencer_tick(&mut self, at: f64) {
        let active = self.is_active();
        let Some(g) = self.generators.as_mut() else {
            return;
        };
        if active {
            let events = g.sequencer.tick(&mut self.rng);
            let voices = g.instruments.voices(&events, self.frame, &mut self.rng);
            trace!(step = g.sequencer.state().step, voices = voices.len(), "sequencer tick");
            self.dropped_voices += spawn(&mut self.pool, voices);
        }
        let next = catch_up(at, g.sequencer.step_seconds(), self.scheduler.now());
        self.sequencer_task = Some(self.scheduler.schedule_at(next, Task::SequencerTick));
    }

    fn clack_fire(&mut self, at: f64) {
        let active = self.is_active();
        let speed = self.inputs.speed;
        let Some(g) = self.generators.as_mut() else {
            return;
        };
        if active {
            if let Some(hits) = g.clack.fire(at, speed) {
                let voices = g.clack.voices(&hits, self.frame, &mut self.rng);
                self.dropped_voices += spawn(&mut self.pool, voices);
            }
        }
        let delay = g.clack.next_delay(speed, &mut self.rng);
        let next = catch_up(at, delay, self.scheduler.now());
        let handle = self.scheduler.schedule_at(next, Task::ClackFire);
        g.clack.set_pending(Some(handle));
    }

    // ------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------

    /// Fill `out` with interleaved stereo samples. Writes silence unless
    /// the engine is running.
    pub fn render(&mut self, out: &mut [f32]) {
        if !self.is_active() {
            out.fill(0.0);
            return;
        }
        for block in out.chunks_mut(BLOCK_SIZE * 2) {
            self.pool.sweep(self.frame);
            self.graph.begin_block(block.len() / 2);
            let mut frames = block.chunks_exact_mut(2);
            for pair in &mut frames {
                let (l, r) = self.render_frame();
                pair[0] = l;
                pair[1] = r;
            }
            frames.into_remainder().fill(0.0);
        }
    }

    #[inline]
    fn render_frame(&mut self) -> (f32, f32) {
        let v = self.pool.render(self.frame);
        let (wet_l, wet_r) = self.reverb.process(v.send as f32);
        let dry = v.dry as f32;
        let music = self.compressor.process(dry + wet_l * self.wet, dry + wet_r * self.wet);
        let programme = self.receiver.programme_frame(music);
        self.frame += 1;
        self.graph.process_frame(programme, v.cabin)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel every task, release every voice and noise source, and
    /// freeze all automation. The engine renders silence afterwards.
    pub fn shutdown(&mut self) {
        if self.state == RenderState::Closed {
            return;
        }
        if let Some(handle) = self.sequencer_task.take() {
            self.scheduler.cancel(handle);
        }
        if let Some(handle) = self.generators.as_mut().and_then(|g| g.clack.take_pending()) {
            self.scheduler.cancel(handle);
        }
        let cancelled = self.scheduler.cancel_all();
        let released = self.pool.clear();
        self.generators = None;
        self.graph.release_sources();
        self.graph.silence();
        self.receiver.silence();
        self.reverb.clear();
        self.compressor.reset();
        if let Err(e) = self.backend.suspend() {
            warn!(error = %e, "suspend during shutdown failed");
        }
        self.state = RenderState::Closed;
        info!(cancelled, released, "soundscape engine shut down");
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn inputs(&self) -> &CabinInputs {
        &self.inputs
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Control clock time in seconds.
    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn live_voices(&self) -> usize {
        self.pool.len()
    }

    /// Voices refused because the pool was full.
    pub fn dropped_voices(&self) -> u64 {
        self.dropped_voices
    }

    pub fn bus_gain(&self, id: BusId) -> &SmoothedParam {
        &self.graph.bus(id).gain
    }

    pub fn radio_center(&self) -> &SmoothedParam {
        self.graph.radio_center()
    }

    pub fn tuning(&self) -> Option<&TuningResult> {
        self.receiver.last_result()
    }

    pub fn sequencer_state(&self) -> Option<SequencerState> {
        self.generators.as_ref().map(|g| g.sequencer.state())
    }

    pub fn clack_state(&self) -> Option<ClackState> {
        self.generators.as_ref().map(|g| g.clack.state())
    }

    pub fn sequencer_task(&self) -> Option<TaskHandle> {
        self.sequencer_task
    }

    /// True while any noise buffer or voice generator is still held.
    pub fn has_sources(&self) -> bool {
        self.graph.has_sources() || self.generators.is_some()
    }

    /// True when no automation is in flight anywhere in the graph.
    pub fn is_settled(&self) -> bool {
        self.graph.is_settled() && self.receiver.is_settled()
    }
}

/// Next firing time of a repeating task that was due at `at`.
fn catch_up(at: f64, delay: f64, now: f64) -> f64 {
    let next = at + delay;
    if next < now - MAX_CATCH_UP { now } else { next }
}

/// Insert voices into the pool; returns how many were dropped.
fn spawn(pool: &mut VoicePool, voices: Vec<Voice>) -> u64 {
    let mut dropped = 0;
    for voice in voices {
        if pool.insert(voice).is_none() {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(dropped, capacity = pool.capacity(), "voice pool full; dropping voices");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 8000.0;

    fn engine() -> AudioEngine {
        AudioEngine::new(SR)
    }

    /// Run `seconds` of session time in 20 ms control steps, rendering
    /// alongside. Returns the peak output level.
    fn run(engine: &mut AudioEngine<impl RenderBackend>, seconds: f64) -> f32 {
        let frames = (SR * 0.02) as usize;
        let mut buf = vec![0.0f32; frames * 2];
        let mut peak = 0.0f32;
        for _ in 0..(seconds / 0.02).round() as usize {
            engine.update(0.02);
            engine.render(&mut buf);
            peak = buf.iter().fold(peak, |p, s| p.max(s.abs()));
        }
        peak
    }

    /// Backend that refuses to resume `failures` times, then works.
    #[derive(Debug, Default)]
    struct FlakyBackend {
        failures: usize,
        resumes: usize,
        suspends: usize,
    }

    impl RenderBackend for FlakyBackend {
        fn resume(&mut self) -> Result<(), EngineError> {
            self.resumes += 1;
            if self.failures > 0 {
                self.failures -= 1;
                return Err(EngineError::RenderUnavailable("waiting for user gesture".into()));
            }
            Ok(())
        }

        fn suspend(&mut self) -> Result<(), EngineError> {
            self.suspends += 1;
            Ok(())
        }
    }

    #[test]
    fn starts_suspended_and_silent() {
        let mut e = engine();
        assert_eq!(e.state(), RenderState::Suspended);
        assert_eq!(e.pending_tasks(), 2);
        let mut buf = [1.0f32; 64];
        e.render(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
        assert_eq!(e.bus_gain(BusId::Rain).value(), 0.0);
        assert_eq!(e.bus_gain(BusId::RadioMaster).value(), 0.0);
    }

    #[test]
    fn rain_and_radio_end_to_end() {
        let mut e = engine();
        e.set_audio_enabled(true);
        e.set_weather(Weather::Rain);
        e.set_radio_on(true);
        e.set_radio_frequency(96.0);
        e.set_radio_volume(0.5);

        assert_eq!(e.bus_gain(BusId::Rain).target(), 0.35);
        assert_eq!(e.bus_gain(BusId::RadioMaster).target(), 0.5);
        let t = e.tuning().copied().unwrap();
        assert_eq!(t.music_volume, 1.0);
        assert_eq!(t.static_volume, 0.05);

        let peak = run(&mut e, 12.0);
        assert!(peak > 0.01 && peak <= 1.0, "peak {peak}");
        assert!((e.bus_gain(BusId::Rain).value() - 0.35).abs() < 1e-3);
        assert!((e.bus_gain(BusId::RadioMaster).value() - 0.5).abs() < 1e-3);
        assert!((e.bus_gain(BusId::RadioMusic).value() - 1.0).abs() < 1e-3);
        assert!((e.bus_gain(BusId::RadioStatic).value() - 0.05).abs() < 1e-3);
        assert!(e.sequencer_state().unwrap().bar >= 1);
    }

    #[test]
    fn snow_bleeds_and_clear_silences() {
        let mut e = engine();
        e.set_weather(Weather::Snow);
        assert_eq!(e.bus_gain(BusId::Rain).target(), 0.05);
        e.set_weather(Weather::Cloudy);
        assert_eq!(e.bus_gain(BusId::Rain).target(), 0.0);
        assert_eq!(e.bus_gain(BusId::Rain).time_constant(), 1.5);
    }

    #[test]
    fn teardown_leaves_nothing_running() {
        let mut e = engine();
        e.set_audio_enabled(true);
        e.set_speed(80.0);
        e.set_weather(Weather::Rain);
        e.set_radio_on(true);
        run(&mut e, 3.0);
        e.set_radio_frequency(97.0);
        assert!(e.live_voices() > 0);
        assert!(e.pending_tasks() > 0);
        assert!(!e.is_settled());

        e.shutdown();
        assert_eq!(e.state(), RenderState::Closed);
        assert_eq!(e.pending_tasks(), 0);
        assert_eq!(e.live_voices(), 0);
        assert!(e.is_settled());
        assert!(!e.has_sources());

        // nothing new gets created afterwards
        e.set_weather(Weather::Snow);
        e.set_audio_enabled(true);
        assert_eq!(run(&mut e, 5.0), 0.0);
        assert_eq!(e.pending_tasks(), 0);
        assert_eq!(e.live_voices(), 0);
        assert!(e.is_settled());
    }

    #[test]
    fn suspended_ticks_are_noops_that_keep_rescheduling() {
        let mut e = engine();
        e.set_speed(80.0);
        e.update(5.9);
        assert_eq!(e.live_voices(), 0);
        assert_eq!(e.sequencer_state(), Some(SequencerState::default()));
        assert_eq!(e.pending_tasks(), 2, "both chains must stay armed");
        assert_eq!(e.clack_state().unwrap().last_fire_time, None);

        e.set_audio_enabled(true);
        e.update(0.4);
        assert!(e.live_voices() > 0);
        assert_eq!(e.sequencer_state().unwrap().step, 1);
    }

    #[test]
    fn sequencer_reschedules_from_its_own_time() {
        let mut e = engine();
        e.set_audio_enabled(true);
        e.update(0.0);
        e.update(0.3);
        e.update(0.3);
        // ticks at 0.0 and 0.6
        assert_eq!(e.sequencer_state().unwrap().step, 2);
    }

    #[test]
    fn long_stalls_do_not_replay_every_tick() {
        let mut e = engine();
        e.set_audio_enabled(true);
        e.update(60.0);
        let step = e.sequencer_state().unwrap();
        // a 60 s stall is about 100 steps; only the last second is replayed
        assert!(step.bar == 0 && step.step <= 4, "replayed too much: {step:?}");
    }

    #[test]
    fn clack_pairs_follow_speed() {
        let mut e = engine();
        e.set_audio_enabled(true);
        e.set_speed(80.0);
        // first poll was armed at rest: 1 s
        e.update(1.0);
        assert_eq!(e.clack_state().unwrap().last_fire_time, Some(1.0));
        assert!(e.clack_state().unwrap().pending.is_some());

        e.set_speed(0.0);
        e.update(3.0);
        let last = e.clack_state().unwrap().last_fire_time;
        e.update(5.0);
        assert_eq!(e.clack_state().unwrap().last_fire_time, last, "stopped train stays quiet");
    }

    #[test]
    fn inputs_are_clamped_not_rejected() {
        let mut e = engine();
        e.set_radio_frequency(150.0);
        assert_eq!(e.inputs().radio_frequency, 108.0);
        e.set_radio_frequency(f64::NAN);
        assert_eq!(e.inputs().radio_frequency, 108.0);
        e.set_radio_volume(4.0);
        assert_eq!(e.inputs().radio_volume, 1.0);
        e.set_speed(-20.0);
        assert_eq!(e.inputs().speed, 0.0);
        e.set_time_of_day(25.0);
        assert_eq!(e.inputs().time_of_day, 1.0);
    }

    #[test]
    fn radio_volume_ignored_while_off() {
        let mut e = engine();
        e.set_radio_volume(0.9);
        assert_eq!(e.bus_gain(BusId::RadioMaster).target(), 0.0);
        e.set_radio_on(true);
        assert_eq!(e.bus_gain(BusId::RadioMaster).target(), 0.9);
    }

    #[test]
    fn flaky_backend_retries_on_next_input() {
        let backend = FlakyBackend { failures: 2, ..Default::default() };
        let mut e = AudioEngine::with_backend(EngineConfig::with_sample_rate(SR), backend);
        e.set_audio_enabled(true);
        assert_eq!(e.state(), RenderState::PendingResume);
        assert_eq!(run(&mut e, 1.0), 0.0, "pending engine stays silent");
        assert_eq!(e.live_voices(), 0);

        e.set_weather(Weather::Rain);
        assert_eq!(e.state(), RenderState::PendingResume);
        e.notify_user_gesture();
        assert_eq!(e.state(), RenderState::Running);
        assert_eq!(e.backend().resumes, 3);
        assert!(run(&mut e, 1.0) > 0.0);

        e.set_audio_enabled(false);
        assert_eq!(e.state(), RenderState::Suspended);
        assert_eq!(e.backend().suspends, 1);
    }

    #[test]
    fn voice_pool_is_bounded() {
        let mut config = EngineConfig::with_sample_rate(SR);
        config.max_voices = 4;
        config.sequencer.step_seconds = 0.05;
        config.sequencer.melody_probability = 1.0;
        let mut e = AudioEngine::with_backend(config, PullBackend);
        e.set_audio_enabled(true);
        for _ in 0..40 {
            e.update(0.05);
        }
        assert!(e.live_voices() <= 4);
        assert!(e.dropped_voices() > 0);
    }

    #[test]
    fn apply_inputs_snapshot() {
        let mut e = engine();
        let snapshot = CabinInputs {
            audio_enabled: true,
            weather: Weather::Rain,
            radio_on: true,
            radio_frequency: 104.5,
            radio_volume: 0.7,
            speed: 60.0,
            ..CabinInputs::default()
        };
        e.apply_inputs(&snapshot);
        assert_eq!(e.state(), RenderState::Running);
        assert_eq!(e.inputs(), &snapshot);
        assert_eq!(e.bus_gain(BusId::Rain).target(), 0.35);
        assert_eq!(e.bus_gain(BusId::RadioMaster).target(), 0.7);
        assert_eq!(e.tuning().unwrap().signal_quality, 1.0);
    }

    #[test]
    fn from_json_config() {
        let e = AudioEngine::from_json(r#"{ "sampleRate": 8000, "maxVoices": 8 }"#).unwrap();
        assert_eq!(e.config().sample_rate, 8000.0);
        assert!(AudioEngine::from_json("nope").is_err());
    }

    #[test]
    fn zero_min_ratio_config_keeps_a_halted_train_quiet() {
        let mut e = AudioEngine::from_json(r#"{ "sampleRate": 8000, "clack": { "minRatio": 0 } }"#).unwrap();
        e.set_audio_enabled(true);
        e.set_speed(0.0);
        e.update(1.5);
        assert_eq!(e.clack_state().unwrap().last_fire_time, None);
        assert_eq!(e.pending_tasks(), 2);
        run(&mut e, 2.0);
        assert_eq!(e.clack_state().unwrap().last_fire_time, None);
    }

    #[test]
    fn same_seed_renders_identically() {
        let render = || {
            let mut e = engine();
            e.set_audio_enabled(true);
            e.set_radio_on(true);
            e.set_radio_frequency(96.3);
            let mut out = Vec::new();
            let mut buf = vec![0.0f32; 320];
            for _ in 0..50 {
                e.update(0.02);
                e.render(&mut buf);
                out.extend_from_slice(&buf);
            }
            out
        };
        assert_eq!(render(), render());
    }
}
