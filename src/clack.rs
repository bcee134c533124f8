//! Wheel clack generator.
//!
//! Each firing plays two short lowpassed noise hits, the front and rear
//! wheels crossing a rail joint. Cadence, pair spacing and loudness all
//! follow the speed ratio read at the moment of firing. Below
//! `min_ratio` the train counts as stopped: nothing fires and the
//! generator just polls again later.

use crate::config::ClackConfig;
use crate::dsp::envelope::Envelope;
use crate::dsp::filter::FilterType;
use crate::dsp::noise::NoiseBuffer;
use crate::dsp::voice::{Route, Voice};
use crate::random::EngineRng;
use crate::scheduler::TaskHandle;

const HIT_ATTACK: f64 = 0.002;

/// Shortest gap between two firings, whatever the config says.
const MIN_FIRE_GAP: f64 = 0.001;

/// The generator's persistent state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClackState {
    /// Clock time of the last firing that produced hits.
    pub last_fire_time: Option<f64>,
    /// The scheduled next firing.
    pub pending: Option<TaskHandle>,
}

/// One transient, relative to the firing time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClackHit {
    pub offset: f64,
    pub gain: f64,
}

/// `speed / reference`, never negative.
pub fn speed_ratio(speed: f64, reference_speed: f64) -> f64 {
    if !speed.is_finite() || reference_speed <= 0.0 {
        return 0.0;
    }
    (speed / reference_speed).max(0.0)
}

/// A zero ratio counts as stopped even when `min_ratio` is not positive.
fn is_moving(ratio: f64, min_ratio: f64) -> bool {
    ratio > 0.0 && ratio >= min_ratio
}

/// Seconds until the next firing, from the live speed. Always finite and
/// positive, so the clock moves between firings.
pub fn compute_next_delay(config: &ClackConfig, speed: f64, rng: &mut EngineRng) -> f64 {
    let ratio = speed_ratio(speed, config.reference_speed);
    let delay = if is_moving(ratio, config.min_ratio) {
        (config.base_delay / ratio + rng.jitter(config.jitter)).max(config.min_delay)
    } else {
        config.slow_poll
    };
    if delay.is_finite() { delay.max(MIN_FIRE_GAP) } else { config.slow_poll.max(MIN_FIRE_GAP).min(60.0) }
}

#[derive(Debug, Clone)]
pub struct ClackGenerator {
    config: ClackConfig,
    noise: NoiseBuffer,
    sample_rate: f64,
    state: ClackState,
}

impl ClackGenerator {
    pub fn new(config: &ClackConfig, noise: NoiseBuffer, sample_rate: f64) -> Self {
        ClackGenerator {
            config: config.clone(),
            noise,
            sample_rate,
            state: ClackState::default(),
        }
    }

    pub fn state(&self) -> ClackState {
        self.state
    }

    pub fn set_pending(&mut self, handle: Option<TaskHandle>) {
        self.state.pending = handle;
    }

    pub fn take_pending(&mut self) -> Option<TaskHandle> {
        self.state.pending.take()
    }

    pub fn next_delay(&self, speed: f64, rng: &mut EngineRng) -> f64 {
        compute_next_delay(&self.config, speed, rng)
    }

    /// Fire at clock time `now`. Returns the hit pair, or `None` when the
    /// train is (nearly) stopped.
    pub fn fire(&mut self, now: f64, speed: f64) -> Option<[ClackHit; 2]> {
        let ratio = speed_ratio(speed, self.config.reference_speed);
        if !is_moving(ratio, self.config.min_ratio) {
            return None;
        }
        self.state.last_fire_time = Some(now);
        let gain = self.config.gain * ratio.min(self.config.max_gain_ratio);
        Some([
            ClackHit { offset: 0.0, gain },
            ClackHit {
                offset: self.config.pair_offset / ratio,
                gain: gain * self.config.second_hit_scale,
            },
        ])
    }

    /// One cabin voice per hit, placed relative to `start_frame`.
    pub fn voices(&self, hits: &[ClackHit], start_frame: u64, rng: &mut EngineRng) -> Vec<Voice> {
        hits.iter()
            .map(|hit| {
                let env = Envelope::shaped(self.sample_rate, HIT_ATTACK, self.config.hit_seconds, hit.gain);
                let offset = (hit.offset * self.sample_rate).round() as u64;
                Voice::noise(self.noise.clone(), rng.index(self.noise.len()), env, Route::Cabin, self.sample_rate)
                    .with_filter(FilterType::Lowpass, self.config.cutoff_hz, 1.0)
                    .starting_at(start_frame.saturating_add(offset))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::noise::{NoiseKind, generate_noise};

    const SR: f64 = 8000.0;

    fn generator() -> ClackGenerator {
        let mut rng = EngineRng::new(1);
        let noise = generate_noise(NoiseKind::White, 0.5, SR, &mut rng);
        ClackGenerator::new(&ClackConfig::default(), noise, SR)
    }

    #[test]
    fn pair_offset_at_reference_speed() {
        let mut g = generator();
        let [a, b] = g.fire(0.0, 80.0).unwrap();
        assert_eq!(a.offset, 0.0);
        assert!((b.offset - 0.14).abs() < 1e-12);
    }

    #[test]
    fn pair_offset_halves_at_double_speed() {
        let mut g = generator();
        let [_, b] = g.fire(0.0, 160.0).unwrap();
        assert!((b.offset - 0.07).abs() < 1e-12);
    }

    #[test]
    fn stopped_train_fires_nothing_and_polls_slowly() {
        let mut g = generator();
        let mut rng = EngineRng::new(2);
        assert_eq!(g.fire(3.0, 7.9), None);
        assert_eq!(g.state().last_fire_time, None);
        assert_eq!(g.next_delay(7.9, &mut rng), 1.0);
        assert_eq!(g.next_delay(0.0, &mut rng), 1.0);
        assert_eq!(g.next_delay(f64::NAN, &mut rng), 1.0);
    }

    #[test]
    fn delay_tracks_speed_with_bounded_jitter() {
        let g = generator();
        let mut rng = EngineRng::new(3);
        for _ in 0..200 {
            let d = g.next_delay(80.0, &mut rng);
            assert!((1.1..=1.3).contains(&d), "delay {d}");
            let fast = g.next_delay(160.0, &mut rng);
            assert!((0.5..=0.7).contains(&fast), "delay {fast}");
        }
    }

    #[test]
    fn delay_has_a_floor() {
        let g = generator();
        let mut rng = EngineRng::new(4);
        for _ in 0..50 {
            assert!(g.next_delay(1.0e6, &mut rng) >= 0.05);
        }
    }

    #[test]
    fn louder_when_faster_up_to_a_cap() {
        let mut g = generator();
        let slow = g.fire(0.0, 40.0).unwrap()[0].gain;
        let fast = g.fire(1.0, 120.0).unwrap()[0].gain;
        let capped = g.fire(2.0, 1000.0).unwrap()[0].gain;
        assert!(fast > slow);
        assert!((capped - 0.6).abs() < 1e-12);
        let [a, b] = g.fire(3.0, 80.0).unwrap();
        assert!(b.gain < a.gain);
        assert_eq!(g.state().last_fire_time, Some(3.0));
    }

    #[test]
    fn zero_min_ratio_still_treats_a_halt_as_stopped() {
        let config = ClackConfig {
            min_ratio: 0.0,
            min_delay: 0.0,
            slow_poll: f64::NAN,
            ..ClackConfig::default()
        };
        let mut rng = EngineRng::new(1);
        let noise = generate_noise(NoiseKind::White, 0.5, SR, &mut rng);
        let mut g = ClackGenerator::new(&config, noise, SR);
        assert_eq!(g.fire(0.0, 0.0), None);
        assert_eq!(g.fire(0.0, -5.0), None);
        let d = g.next_delay(0.0, &mut rng);
        assert!(d.is_finite() && d > 0.0, "delay {d}");
        let crawl = g.next_delay(1.0e-300, &mut rng);
        assert!(crawl.is_finite() && crawl > 0.0, "delay {crawl}");
    }

    #[test]
    fn pending_handle_is_taken_once() {
        let mut g = generator();
        let mut s = crate::scheduler::Scheduler::new();
        let h = s.schedule(1.0, crate::scheduler::Task::ClackFire);
        g.set_pending(Some(h));
        assert_eq!(g.take_pending(), Some(h));
        assert_eq!(g.take_pending(), None);
        assert_eq!(g.state().pending, None);
    }

    #[test]
    fn far_offsets_saturate_instead_of_overflowing() {
        let g = generator();
        let mut rng = EngineRng::new(6);
        let hits = [ClackHit { offset: f64::INFINITY, gain: 0.1 }];
        let voices = g.voices(&hits, u64::MAX - 10, &mut rng);
        assert_eq!(voices[0].start_frame, u64::MAX);
        assert_eq!(voices[0].stop_frame, u64::MAX);
    }

    #[test]
    fn hits_become_offset_cabin_voices() {
        let mut g = generator();
        let mut rng = EngineRng::new(5);
        let hits = g.fire(0.0, 80.0).unwrap();
        let voices = g.voices(&hits, 100, &mut rng);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].start_frame, 100);
        assert_eq!(voices[1].start_frame, 100 + 1120);
        assert!(voices.iter().all(|v| v.route == Route::Cabin));
    }
}
