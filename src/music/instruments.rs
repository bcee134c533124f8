//! Instruments: turn step events into self-contained voices.
//!
//! Every instrument is one oscillator or noise source through an optional
//! filter and an attack/release envelope. Voices carry their own stop
//! frame, so once built they need nothing more from the sequencer.

use crate::config::SequencerConfig;
use crate::dsp::envelope::Envelope;
use crate::dsp::filter::FilterType;
use crate::dsp::noise::NoiseBuffer;
use crate::dsp::oscillator::Waveform;
use crate::dsp::voice::{PitchSweep, Route, Voice};
use crate::random::EngineRng;

use super::sequencer::{Drum, Note, StepEvents};

/// Attack for pitched notes.
const TONE_ATTACK: f64 = 0.05;

const KICK_START_HZ: f64 = 150.0;
const KICK_END_HZ: f64 = 0.01;
const KICK_SECONDS: f64 = 0.5;

const SNARE_SECONDS: f64 = 0.1;
const SNARE_CUTOFF_HZ: f64 = 1000.0;

const HAT_SECONDS: f64 = 0.02;
const HAT_CUTOFF_HZ: f64 = 7000.0;

#[derive(Debug, Clone)]
pub struct Instruments {
    sample_rate: f64,
    /// White noise shared by every percussion voice.
    noise: NoiseBuffer,
    bass_gain: f64,
    bass_cutoff_hz: f64,
    melody_gain: f64,
    kick_gain: f64,
    snare_gain: f64,
    hat_gain: f64,
}

impl Instruments {
    pub fn new(config: &SequencerConfig, noise: NoiseBuffer, sample_rate: f64) -> Self {
        Instruments {
            sample_rate,
            noise,
            bass_gain: config.bass_gain,
            bass_cutoff_hz: config.bass_cutoff_hz,
            melody_gain: config.melody_gain,
            kick_gain: config.kick_gain,
            snare_gain: config.snare_gain,
            hat_gain: config.hat_gain,
        }
    }

    /// Build every voice for one step, all starting at `start_frame`.
    pub fn voices(&self, events: &StepEvents, start_frame: u64, rng: &mut EngineRng) -> Vec<Voice> {
        let mut voices = Vec::with_capacity(events.count());
        if let Some(note) = events.bass {
            voices.push(self.bass(&note));
        }
        for note in events.melody.iter().chain(events.doubling.iter()) {
            voices.push(self.melody(note));
        }
        match events.drum {
            Some(Drum::Kick) => voices.push(self.kick()),
            Some(Drum::Snare) => voices.push(self.snare(rng)),
            None => {}
        }
        if events.hat {
            voices.push(self.hat(rng));
        }
        for v in &mut voices {
            v.schedule(start_frame);
        }
        voices
    }

    /// Sawtooth through a lowpass, sustained for the whole note, dry only.
    pub fn bass(&self, note: &Note) -> Voice {
        let env = Envelope::shaped(self.sample_rate, TONE_ATTACK, note.seconds, self.bass_gain);
        Voice::tone(Waveform::Sawtooth, note.frequency, note.detune, env, Route::MusicDry, self.sample_rate)
            .with_filter(FilterType::Lowpass, self.bass_cutoff_hz, 0.707)
    }

    /// Soft triangle, dry plus reverb send.
    pub fn melody(&self, note: &Note) -> Voice {
        let env = Envelope::shaped(self.sample_rate, TONE_ATTACK, note.seconds, self.melody_gain);
        Voice::tone(Waveform::Triangle, note.frequency, note.detune, env, Route::MusicWithReverb, self.sample_rate)
    }

    /// Sine dropping exponentially from 150 Hz to near DC.
    pub fn kick(&self) -> Voice {
        let env = Envelope::shaped(self.sample_rate, 0.002, KICK_SECONDS, self.kick_gain);
        Voice::tone(Waveform::Sine, KICK_START_HZ, 0.0, env, Route::MusicDry, self.sample_rate).with_sweep(PitchSweep {
            from: KICK_START_HZ,
            to: KICK_END_HZ,
            seconds: KICK_SECONDS,
        })
    }

    pub fn snare(&self, rng: &mut EngineRng) -> Voice {
        let env = Envelope::shaped(self.sample_rate, 0.002, SNARE_SECONDS, self.snare_gain);
        Voice::noise(self.noise.clone(), rng.index(self.noise.len()), env, Route::MusicDry, self.sample_rate)
            .with_filter(FilterType::Highpass, SNARE_CUTOFF_HZ, 0.707)
    }

    pub fn hat(&self, rng: &mut EngineRng) -> Voice {
        let env = Envelope::shaped(self.sample_rate, 0.001, HAT_SECONDS, self.hat_gain);
        Voice::noise(self.noise.clone(), rng.index(self.noise.len()), env, Route::MusicDry, self.sample_rate)
            .with_filter(FilterType::Highpass, HAT_CUTOFF_HZ, 0.707)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::noise::{NoiseKind, generate_noise};
    use crate::music::sequencer::Sequencer;

    const SR: f64 = 8000.0;

    fn kit(rng: &mut EngineRng) -> Instruments {
        let noise = generate_noise(NoiseKind::White, 0.5, SR, rng);
        Instruments::new(&SequencerConfig::default(), noise, SR)
    }

    fn peak(v: &mut Voice) -> f64 {
        (v.start_frame..v.stop_frame)
            .map(|f| {
                let o = v.render(f);
                o.dry.abs().max(o.send.abs())
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn one_voice_per_event() {
        let mut rng = EngineRng::new(1);
        let kit = kit(&mut rng);
        let mut seq = Sequencer::new(&SequencerConfig::default());
        for _ in 0..64 {
            let events = seq.tick(&mut rng);
            let voices = kit.voices(&events, 1000, &mut rng);
            assert_eq!(voices.len(), events.count());
            assert!(voices.iter().all(|v| v.start_frame == 1000));
        }
    }

    #[test]
    fn bass_is_dry_and_sustained() {
        let mut rng = EngineRng::new(2);
        let kit = kit(&mut rng);
        let note = Note { frequency: 55.0, detune: 3.0, seconds: 4.8 };
        let v = kit.bass(&note);
        assert_eq!(v.route, Route::MusicDry);
        assert!(v.stop_frame as f64 >= 4.8 * SR);
    }

    #[test]
    fn melody_feeds_reverb() {
        let mut rng = EngineRng::new(3);
        let kit = kit(&mut rng);
        let note = Note { frequency: 440.0, detune: -2.0, seconds: 0.9 };
        let mut v = kit.melody(&note);
        assert_eq!(v.route, Route::MusicWithReverb);
        let p = peak(&mut v);
        assert!(p > 0.04 && p <= 0.08 + 1e-9, "melody peak {p}");
    }

    #[test]
    fn percussion_lengths() {
        let mut rng = EngineRng::new(4);
        let kit = kit(&mut rng);
        let kick = kit.kick();
        let snare = kit.snare(&mut rng);
        let hat = kit.hat(&mut rng);
        assert!(kick.stop_frame > snare.stop_frame);
        assert!(snare.stop_frame > hat.stop_frame);
        assert!((hat.envelope.length() - 0.021).abs() < 1e-9);
    }

    #[test]
    fn kick_is_loud_and_short_lived() {
        let mut rng = EngineRng::new(5);
        let kit = kit(&mut rng);
        let mut kick = kit.kick();
        assert!(peak(&mut kick) > 0.3);
        assert!((kick.stop_frame as f64) < 0.6 * SR);
    }
}
