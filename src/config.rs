//! Engine configuration.
//!
//! Every section derives serde with `#[serde(default)]`, so a host can
//! send a partial JSON object and inherit the tuned defaults for the rest.
//! Most values here are perceptual constants tuned by ear rather than
//! derived from a model.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::radio::tuning::{Station, StationKind};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Seed for the single random source behind every stochastic choice.
    pub seed: u64,
    /// Upper bound on simultaneously live voices.
    pub max_voices: usize,
    pub noise: NoiseConfig,
    pub buses: BusConfig,
    pub smoothing: SmoothingConfig,
    pub reverb: ReverbConfig,
    pub compressor: CompressorConfig,
    pub sequencer: SequencerConfig,
    pub radio: RadioConfig,
    pub clack: ClackConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            seed: 0x5EED_CAB1,
            max_voices: 64,
            noise: NoiseConfig::default(),
            buses: BusConfig::default(),
            smoothing: SmoothingConfig::default(),
            reverb: ReverbConfig::default(),
            compressor: CompressorConfig::default(),
            sequencer: SequencerConfig::default(),
            radio: RadioConfig::default(),
            clack: ClackConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default config at the given sample rate.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        EngineConfig {
            sample_rate,
            ..Default::default()
        }
        .validated()
    }

    /// Parse a (possibly partial) JSON config and clamp it into range.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamp out-of-domain values instead of rejecting them.
    pub fn validated(mut self) -> Self {
        if !self.sample_rate.is_finite() || self.sample_rate < 8000.0 {
            self.sample_rate = 8000.0;
        }
        self.max_voices = self.max_voices.max(1);

        self.noise.white_seconds = positive_or(self.noise.white_seconds, 1.0);
        self.noise.brown_seconds = positive_or(self.noise.brown_seconds, 2.0);
        self.noise.pink_seconds = positive_or(self.noise.pink_seconds, 2.0);

        self.buses.master_gain = unit_or(self.buses.master_gain, 0.8);
        self.buses.rumble_gain = unit_or(self.buses.rumble_gain, 0.4);
        self.buses.rain_level = unit_or(self.buses.rain_level, 0.35);
        self.buses.snow_level = unit_or(self.buses.snow_level, 0.05);
        self.buses.radio_filter_q = positive_or(self.buses.radio_filter_q, 1.0);

        self.reverb.seconds = positive_or(self.reverb.seconds, 1.5);
        self.reverb.wet = unit_or(self.reverb.wet, 0.4);

        self.sequencer.step_seconds = self.sequencer.step_seconds.max(0.05);
        self.sequencer.melody_probability = unit_or(self.sequencer.melody_probability, 0.6);
        self.sequencer.octave_doubling_probability = unit_or(self.sequencer.octave_doubling_probability, 0.3);
        self.sequencer.tuning_pitch = positive_or(self.sequencer.tuning_pitch, 440.0);

        self.radio.dropout_probability = unit_or(self.radio.dropout_probability, 0.1);
        if self.radio.max_frequency < self.radio.min_frequency {
            std::mem::swap(&mut self.radio.min_frequency, &mut self.radio.max_frequency);
        }
        self.radio.buzzer.period = positive_or(self.radio.buzzer.period, 1.0);
        self.radio.buzzer.duty = unit_or(self.radio.buzzer.duty, 0.5);
        self.radio.buzzer.level = unit_or(self.radio.buzzer.level, 0.2);
        for station in &mut self.radio.stations {
            station.capture_bandwidth = positive_or(station.capture_bandwidth, 1.5);
        }

        self.clack.reference_speed = positive_or(self.clack.reference_speed, 80.0);
        self.clack.base_delay = positive_or(self.clack.base_delay, 1.2);
        self.clack.slow_poll = positive_or(self.clack.slow_poll, 1.0);
        self.clack.min_delay = positive_or(self.clack.min_delay, 0.05);
        // a zero floor would let a stopped train divide by zero
        self.clack.min_ratio = positive_or(self.clack.min_ratio, 0.1);
        self.clack.pair_offset = positive_or(self.clack.pair_offset, 0.14);
        self.clack.jitter = if self.clack.jitter.is_finite() { self.clack.jitter.abs() } else { 0.1 };
        self
    }
}

fn positive_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { fallback }
}

fn unit_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback }
}

/// Noise buffer lengths, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoiseConfig {
    pub white_seconds: f64,
    pub brown_seconds: f64,
    pub pink_seconds: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            white_seconds: 1.0,
            brown_seconds: 2.0,
            pink_seconds: 2.0,
        }
    }
}

/// Static bus levels and the filter stages that hang off them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusConfig {
    pub master_gain: f64,
    pub rumble_gain: f64,
    pub rumble_cutoff_hz: f64,
    pub rain_cutoff_hz: f64,
    /// Rain bus target while it rains.
    pub rain_level: f64,
    /// Ambient bleed on the rain bus while it snows.
    pub snow_level: f64,
    /// Base center of the radio speaker bandpass.
    pub radio_filter_hz: f64,
    pub radio_filter_q: f64,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            master_gain: 0.8,
            rumble_gain: 0.4,
            rumble_cutoff_hz: 120.0,
            rain_cutoff_hz: 400.0,
            rain_level: 0.35,
            snow_level: 0.05,
            radio_filter_hz: 1000.0,
            radio_filter_q: 1.0,
        }
    }
}

/// Time constants (seconds) for `set_target` automations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SmoothingConfig {
    pub weather: f64,
    pub radio_power: f64,
    pub tuning: f64,
    pub filter_drift: f64,
    pub programme_crossfade: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            weather: 1.5,
            radio_power: 0.1,
            tuning: 0.1,
            filter_drift: 0.2,
            programme_crossfade: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbConfig {
    /// Impulse response length.
    pub seconds: f64,
    /// Exponent of the `(1 - i/N)` decay curve.
    pub decay_exponent: f64,
    /// Wet level mixed back into the music compressor.
    pub wet: f64,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        ReverbConfig {
            seconds: 1.5,
            decay_exponent: 3.0,
            wet: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompressorConfig {
    /// Threshold in dB.
    pub threshold: f64,
    pub ratio: f64,
    /// Knee width in dB.
    pub knee: f64,
    /// Attack in seconds.
    pub attack: f64,
    /// Release in seconds.
    pub release: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig {
            threshold: -24.0,
            ratio: 12.0,
            knee: 30.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SequencerConfig {
    /// Seconds per sixteenth step (0.6 s is roughly 100 BPM).
    pub step_seconds: f64,
    pub melody_probability: f64,
    /// Chance that a melody note is doubled up an octave.
    pub octave_doubling_probability: f64,
    /// Max random detune per tonal note, in cents.
    pub detune_cents: f64,
    pub bass_gain: f64,
    pub bass_cutoff_hz: f64,
    pub melody_gain: f64,
    pub kick_gain: f64,
    pub snare_gain: f64,
    pub hat_gain: f64,
    /// Frequency of A4.
    pub tuning_pitch: f64,
    /// Bass roots, one chord per bar, as note names ("A1", "F#2").
    pub progression: Vec<String>,
    /// Melody scale as note names.
    pub scale: Vec<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            step_seconds: 0.6,
            melody_probability: 0.6,
            octave_doubling_probability: 0.3,
            detune_cents: 7.5,
            bass_gain: 0.2,
            bass_cutoff_hz: 400.0,
            melody_gain: 0.08,
            kick_gain: 0.5,
            snare_gain: 0.12,
            hat_gain: 0.04,
            tuning_pitch: 440.0,
            progression: ["A1", "F1", "C2", "G1"].map(String::from).to_vec(),
            scale: ["A4", "B4", "C5", "D5", "E5", "F5", "G5"].map(String::from).to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadioConfig {
    pub stations: Vec<Station>,
    pub min_frequency: f64,
    pub max_frequency: f64,
    /// Dial position at engine start.
    pub initial_frequency: f64,
    pub initial_volume: f64,
    /// Below this quality a weak signal may drop out.
    pub dropout_threshold: f64,
    pub dropout_probability: f64,
    /// Static level is `(1 - quality) * static_span + static_floor`.
    pub static_span: f64,
    pub static_floor: f64,
    /// Speaker bandpass drift per MHz of mistuning.
    pub drift_hz_per_mhz: f64,
    pub buzzer: BuzzerConfig,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            stations: vec![
                Station {
                    kind: StationKind::Music,
                    frequency: 96.0,
                    capture_bandwidth: 1.5,
                },
                Station {
                    kind: StationKind::Buzzer,
                    frequency: 104.5,
                    capture_bandwidth: 1.5,
                },
            ],
            min_frequency: 88.0,
            max_frequency: 108.0,
            initial_frequency: 100.0,
            initial_volume: 0.5,
            dropout_threshold: 0.8,
            dropout_probability: 0.1,
            static_span: 0.4,
            static_floor: 0.05,
            drift_hz_per_mhz: 500.0,
            buzzer: BuzzerConfig::default(),
        }
    }
}

/// Programme of the buzzer station: a monotone tone gated into bursts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuzzerConfig {
    pub frequency_hz: f64,
    /// Seconds from one burst onset to the next.
    pub period: f64,
    /// Fraction of each period the tone sounds.
    pub duty: f64,
    pub level: f64,
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        BuzzerConfig {
            frequency_hz: 440.0,
            period: 1.0,
            duty: 0.5,
            level: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClackConfig {
    /// Speed at which the clack period equals `base_delay`.
    pub reference_speed: f64,
    /// Seconds between clack pairs at the reference speed.
    pub base_delay: f64,
    /// Max random jitter added to each delay, in seconds.
    pub jitter: f64,
    /// Below this speed ratio the train counts as stopped.
    pub min_ratio: f64,
    /// Poll interval while stopped.
    pub slow_poll: f64,
    /// Lower bound on any computed delay.
    pub min_delay: f64,
    /// Gap between the two hits of a pair at the reference speed.
    pub pair_offset: f64,
    pub gain: f64,
    /// Speed ratio beyond which hits stop getting louder.
    pub max_gain_ratio: f64,
    pub second_hit_scale: f64,
    pub cutoff_hz: f64,
    pub hit_seconds: f64,
}

impl Default for ClackConfig {
    fn default() -> Self {
        ClackConfig {
            reference_speed: 80.0,
            base_delay: 1.2,
            jitter: 0.1,
            min_ratio: 0.1,
            slow_poll: 1.0,
            min_delay: 0.05,
            pair_offset: 0.14,
            gain: 0.3,
            max_gain_ratio: 2.0,
            second_hit_scale: 0.8,
            cutoff_hz: 900.0,
            hit_seconds: 0.08,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_inherits_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "sampleRate": 22050, "seed": 9 }"#).unwrap();
        assert_eq!(cfg.sample_rate, 22050.0);
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.sequencer, SequencerConfig::default());
        assert_eq!(cfg.radio.stations.len(), 2);
    }

    #[test]
    fn nested_partial_section() {
        let cfg = EngineConfig::from_json(r#"{ "clack": { "referenceSpeed": 40 } }"#).unwrap();
        assert_eq!(cfg.clack.reference_speed, 40.0);
        assert_eq!(cfg.clack.pair_offset, 0.14);
    }

    #[test]
    fn clack_section_is_clamped() {
        let cfg = EngineConfig::from_json(
            r#"{ "clack": { "minRatio": 0, "pairOffset": -1, "jitter": -0.2, "minDelay": 0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.clack.min_ratio, 0.1);
        assert_eq!(cfg.clack.pair_offset, 0.14);
        assert_eq!(cfg.clack.jitter, 0.2);
        assert_eq!(cfg.clack.min_delay, 0.05);

        let mut cfg = EngineConfig::default();
        cfg.clack.min_ratio = f64::NAN;
        assert_eq!(cfg.validated().clack.min_ratio, 0.1);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = EngineConfig::from_json("{ sampleRate: }").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = EngineConfig::from_json(
            r#"{ "sampleRate": -5, "maxVoices": 0, "buses": { "masterGain": 3.0 },
                 "radio": { "minFrequency": 108, "maxFrequency": 88 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.sample_rate, 8000.0);
        assert_eq!(cfg.max_voices, 1);
        assert_eq!(cfg.buses.master_gain, 1.0);
        assert!(cfg.radio.min_frequency < cfg.radio.max_frequency);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let cfg = EngineConfig::with_sample_rate(48000.0);
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["sampleRate"], 48000.0);
        assert_eq!(json["radio"]["stations"][0]["kind"], "music");
        assert!(json["clack"].get("referenceSpeed").is_some());
    }
}
