//! Cabin state pushed in by the host application.

use serde::{Deserialize, Serialize};

/// Weather conditions that drive the precipitation bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    #[default]
    Clear,
    Cloudy,
    Rain,
    Snow,
}

impl Weather {
    /// Parse a host-side weather name. Unknown names read as clear skies.
    pub fn from_name(name: &str) -> Weather {
        match name.trim().to_ascii_lowercase().as_str() {
            "cloudy" => Weather::Cloudy,
            "rain" | "rainy" => Weather::Rain,
            "snow" | "snowy" => Weather::Snow,
            _ => Weather::Clear,
        }
    }
}

/// A snapshot of every input the engine reads.
///
/// The engine keeps its own copy and the schedulers read it fresh at each
/// tick, so long-running generators never act on a stale value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CabinInputs {
    pub audio_enabled: bool,
    pub weather: Weather,
    /// Hours since midnight. Stored for the host; no acoustic effect.
    pub time_of_day: f64,
    pub radio_on: bool,
    /// Dial position in MHz.
    pub radio_frequency: f64,
    pub radio_volume: f64,
    pub speed: f64,
}

impl Default for CabinInputs {
    fn default() -> Self {
        CabinInputs {
            audio_enabled: false,
            weather: Weather::Clear,
            time_of_day: 12.0,
            radio_on: false,
            radio_frequency: 100.0,
            radio_volume: 0.5,
            speed: 0.0,
        }
    }
}

/// Replace NaN/inf with `fallback`; the simulation never rejects input.
pub(crate) fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_names() {
        assert_eq!(Weather::from_name("rain"), Weather::Rain);
        assert_eq!(Weather::from_name(" Snow "), Weather::Snow);
        assert_eq!(Weather::from_name("cloudy"), Weather::Cloudy);
        assert_eq!(Weather::from_name("hail"), Weather::Clear);
    }

    #[test]
    fn inputs_deserialize_from_host_json() {
        let inputs: CabinInputs = serde_json::from_str(
            r#"{ "weather": "rain", "radioOn": true, "radioFrequency": 96.0 }"#,
        )
        .unwrap();
        assert_eq!(inputs.weather, Weather::Rain);
        assert!(inputs.radio_on);
        assert_eq!(inputs.radio_volume, 0.5);
    }
}
