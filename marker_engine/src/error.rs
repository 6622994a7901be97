// Failures the engine reports. The JS wrappers turn them into rejected calls carrying the message.

use thiserror::Error;

/// Everything a config load or host event can fail with.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown marker: {0}")]
    UnknownMarker(u32),

    #[error("Unknown video {video} on marker {marker}")]
    UnknownVideo { marker: u32, video: u32 },

    #[error("Invalid quality level: {0}")]
    InvalidQuality(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
