//! Fehlertypen fuer die Audio-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Frame-Groesse: erwartet {erwartet}, erhalten {erhalten}")]
    FrameGroesse { erwartet: usize, erhalten: usize },

    #[error(transparent)]
    Core(#[from] airwave_core::CoreError),
}

impl From<audiopus::Error> for AudioError {
    fn from(e: audiopus::Error) -> Self {
        Self::CodecFehler(e.to_string())
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
