//! Generative music for the radio's music station.

pub mod harmony;
pub mod instruments;
pub mod sequencer;
