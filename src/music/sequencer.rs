//! Fixed-tempo 16-step sequencer.
//!
//! `tick` is the whole state machine: it reads the current step, decides
//! what sounds, then advances. The step/bar pair is the only state that
//! survives between ticks.

use crate::config::SequencerConfig;
use crate::random::EngineRng;

use super::harmony::Harmony;

pub const STEPS_PER_BAR: u8 = 16;
/// Bass notes land on every eighth step and hold until the next one.
pub const BASS_STEPS: u8 = 8;
/// Melody note length, in steps.
const MELODY_STEPS: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerState {
    pub step: u8,
    pub bar: u64,
}

impl SequencerState {
    pub fn advance(&mut self) {
        self.step += 1;
        if self.step >= STEPS_PER_BAR {
            self.step = 0;
            self.bar += 1;
        }
    }
}

/// A pitched note to be voiced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub frequency: f64,
    /// Cents.
    pub detune: f64,
    pub seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drum {
    Kick,
    Snare,
}

/// Everything one step triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepEvents {
    pub bass: Option<Note>,
    pub melody: Option<Note>,
    /// The melody note an octave up, when doubled.
    pub doubling: Option<Note>,
    pub drum: Option<Drum>,
    pub hat: bool,
}

impl StepEvents {
    pub fn count(&self) -> usize {
        [self.bass.is_some(), self.melody.is_some(), self.doubling.is_some(), self.drum.is_some(), self.hat]
            .iter()
            .filter(|&&b| b)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
    harmony: Harmony,
    step_seconds: f64,
    melody_probability: f64,
    octave_doubling_probability: f64,
    detune_cents: f64,
}

impl Sequencer {
    pub fn new(config: &SequencerConfig) -> Self {
        Sequencer {
            state: SequencerState::default(),
            harmony: Harmony::from_config(config),
            step_seconds: config.step_seconds,
            melody_probability: config.melody_probability,
            octave_doubling_probability: config.octave_doubling_probability,
            detune_cents: config.detune_cents,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn step_seconds(&self) -> f64 {
        self.step_seconds
    }

    pub fn harmony(&self) -> &Harmony {
        &self.harmony
    }

    /// Decide this step's events and advance to the next step.
    pub fn tick(&mut self, rng: &mut EngineRng) -> StepEvents {
        let SequencerState { step, bar } = self.state;
        let mut events = StepEvents::default();

        if step % BASS_STEPS == 0 {
            events.bass = Some(Note {
                frequency: self.harmony.root_for_bar(bar),
                detune: rng.jitter(self.detune_cents),
                seconds: self.step_seconds * BASS_STEPS as f64,
            });
        }

        if rng.chance(self.melody_probability) {
            let scale = self.harmony.scale();
            let note = Note {
                frequency: scale[rng.index(scale.len())],
                detune: rng.jitter(self.detune_cents),
                seconds: self.step_seconds * MELODY_STEPS,
            };
            if rng.chance(self.octave_doubling_probability) {
                events.doubling = Some(Note {
                    frequency: note.frequency * 2.0,
                    ..note
                });
            }
            events.melody = Some(note);
        }

        events.drum = match step % 4 {
            0 => Some(Drum::Kick),
            2 => Some(Drum::Snare),
            _ => None,
        };
        events.hat = step % 2 == 0;

        self.state.advance();
        events
    }
}
