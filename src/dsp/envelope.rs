//! One-shot attack/release envelope for ephemeral voices.
//!
//! Level starts at exactly 0, rises linearly to `peak` over `attack`, then
//! falls exponentially toward `floor` over `release` and holds there until
//! the voice is stopped. It never reaches 0 while the voice sounds, so a
//! stop lands on an inaudible level instead of cutting a waveform mid-swing.

/// Level an envelope decays toward; 60 dB below full scale.
pub const RELEASE_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Release,
    Hold,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// Release time in seconds.
    pub release: f64,
    /// Level reached at the end of the attack.
    pub peak: f64,
    /// Level approached at the end of the release.
    pub floor: f64,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    stage_samples: usize,
    stage_counter: usize,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Envelope {
            attack: 0.05,
            release: 0.5,
            peak: 1.0,
            floor: RELEASE_FLOOR,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            stage_samples: 0,
            stage_counter: 0,
        }
    }

    /// Envelope with the given shape; `peak` is clamped non-negative.
    pub fn shaped(sample_rate: f64, attack: f64, release: f64, peak: f64) -> Self {
        Envelope {
            attack: attack.max(0.0),
            release: release.max(0.0),
            peak: if peak.is_finite() { peak.max(0.0) } else { 0.0 },
            ..Self::new(sample_rate)
        }
    }

    /// Seconds from trigger until the release completes.
    pub fn length(&self) -> f64 {
        self.attack + self.release
    }

    /// Trigger the envelope from silence.
    pub fn trigger(&mut self) {
        self.level = 0.0;
        self.stage = Stage::Attack;
        self.stage_samples = (self.attack * self.sample_rate) as usize;
        self.stage_counter = 0;
    }

    /// Generate the next envelope level.
    pub fn next_sample(&mut self) -> f64 {
        let floor = self.floor.min(self.peak);
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }
            Stage::Attack => {
                if self.stage_counter >= self.stage_samples {
                    self.level = self.peak;
                    self.enter_release();
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.peak * t;
                    self.stage_counter += 1;
                }
            }
            Stage::Release => {
                if self.stage_counter >= self.stage_samples || self.peak <= floor {
                    self.level = floor;
                    self.stage = Stage::Hold;
                } else {
                    // exponential ramp: peak * (floor/peak)^t
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.peak * (floor / self.peak).powf(t);
                    self.stage_counter += 1;
                }
            }
            Stage::Hold => {
                self.level = floor;
            }
        }
        self.level
    }

    /// True once the release has reached the floor.
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Hold
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    fn enter_release(&mut self) {
        self.stage = Stage::Release;
        self.stage_samples = (self.release * self.sample_rate) as usize;
        self.stage_counter = 0;
    }
}
