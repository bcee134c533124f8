//! Harmonic vocabulary of the generative track: a four-chord bass
//! progression and a seven-note melody scale, both given as note names.

use tracing::warn;

use crate::config::SequencerConfig;

/// Parse a note name like "C4", "F#3" or "Bb5" to a MIDI note number.
///
/// Follows the standard convention where C4 = 60 (middle C).
pub fn note_to_midi(note: &str) -> Option<i32> {
    let bytes = note.as_bytes();
    let semitone = match bytes.first()? {
        b'C' => 0,
        b'D' => 2,
        b'E' => 4,
        b'F' => 5,
        b'G' => 7,
        b'A' => 9,
        b'B' => 11,
        _ => return None,
    };

    let (semitone, rest) = match bytes.get(1) {
        Some(b'#') => (semitone + 1, &note[2..]),
        Some(b'b') => (semitone - 1, &note[2..]),
        _ => (semitone, &note[1..]),
    };
    let octave: i32 = rest.parse().ok()?;

    Some((octave + 1) * 12 + semitone)
}

/// Convert a MIDI note number to frequency. `tuning_pitch` is A4 (MIDI 69).
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}

/// Pitch tables resolved to frequencies once, at engine start.
#[derive(Debug, Clone, PartialEq)]
pub struct Harmony {
    roots: Vec<f64>,
    scale: Vec<f64>,
}

impl Harmony {
    /// Resolve the configured note names. Unparseable names are skipped;
    /// an empty table falls back to the stock one.
    pub fn from_config(config: &SequencerConfig) -> Self {
        let defaults = SequencerConfig::default();
        let resolve = |names: &[String], fallback: &[String]| -> Vec<f64> {
            let parsed = frequencies(names, config.tuning_pitch);
            if parsed.is_empty() { frequencies(fallback, config.tuning_pitch) } else { parsed }
        };
        Harmony {
            roots: resolve(&config.progression, &defaults.progression),
            scale: resolve(&config.scale, &defaults.scale),
        }
    }

    /// Bass root for `bar`; the progression repeats.
    pub fn root_for_bar(&self, bar: u64) -> f64 {
        self.roots[(bar % self.roots.len() as u64) as usize]
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn progression(&self) -> &[f64] {
        &self.roots
    }
}

fn frequencies(names: &[String], tuning_pitch: f64) -> Vec<f64> {
    names
        .iter()
        .filter_map(|name| match note_to_midi(name) {
            Some(midi) => Some(midi_to_frequency(midi, tuning_pitch)),
            None => {
                warn!(note = %name, "skipping unparseable note name");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_midi() {
        assert_eq!(note_to_midi("A4"), Some(69));
        assert_eq!(note_to_midi("C4"), Some(60));
        assert_eq!(note_to_midi("A1"), Some(33));
        assert_eq!(note_to_midi("F#2"), Some(42));
        assert_eq!(note_to_midi("Bb3"), Some(58));
        assert_eq!(note_to_midi("C-1"), Some(0));
        assert_eq!(note_to_midi("H4"), None);
        assert_eq!(note_to_midi(""), None);
        assert_eq!(note_to_midi("A"), None);
    }

    #[test]
    fn test_midi_to_frequency() {
        assert!((midi_to_frequency(69, 440.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_frequency(33, 440.0) - 55.0).abs() < 1e-9);
        assert!((midi_to_frequency(81, 432.0) - 864.0).abs() < 1e-9);
    }

    #[test]
    fn stock_progression_is_am_f_c_g() {
        let h = Harmony::from_config(&SequencerConfig::default());
        let roots = h.progression();
        assert_eq!(roots.len(), 4);
        assert!((roots[0] - 55.0).abs() < 1e-9, "A1");
        assert!((roots[1] - midi_to_frequency(29, 440.0)).abs() < 1e-9, "F1");
        assert!((roots[2] - midi_to_frequency(36, 440.0)).abs() < 1e-9, "C2");
        assert!((roots[3] - midi_to_frequency(31, 440.0)).abs() < 1e-9, "G1");
        assert_eq!(h.root_for_bar(4), h.root_for_bar(0));
        assert_eq!(h.root_for_bar(7), h.root_for_bar(3));
    }

    #[test]
    fn stock_scale_is_a_minor() {
        let h = Harmony::from_config(&SequencerConfig::default());
        assert_eq!(h.scale().len(), 7);
        assert!((h.scale()[0] - 440.0).abs() < 1e-9);
        assert!(h.scale().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn bad_names_are_skipped_and_empty_tables_fall_back() {
        let config = SequencerConfig {
            progression: vec!["D2".into(), "nope".into()],
            scale: vec!["?".into()],
            ..SequencerConfig::default()
        };
        let h = Harmony::from_config(&config);
        assert_eq!(h.progression().len(), 1);
        assert_eq!(h.scale().len(), 7);
    }
}
