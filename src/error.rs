use thiserror::Error;

/// Errors surfaced by the soundscape engine.
///
/// Only construction returns these to the caller; at runtime every
/// failure degrades to silence and is logged instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The host's audio output could not be created or resumed
    /// (e.g. autoplay policy waiting for a user gesture).
    #[error("render process unavailable: {0}")]
    RenderUnavailable(String),

    #[error("invalid engine config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}
