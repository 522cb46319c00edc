//! Fehlertypen des Sprachtransports

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Kanal ist nicht verbunden")]
    NichtVerbunden,

    #[error("Socket-Fehler: {0}")]
    Socket(#[from] std::io::Error),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] airwave_protocol::ProtocolError),

    #[error("Unvollstaendig gesendet: {gesendet} von {erwartet} Bytes")]
    Unvollstaendig { gesendet: usize, erwartet: usize },

    #[error("Heartbeat-Zeitueberschreitung nach {sekunden} s")]
    HeartbeatZeitueberschreitung { sekunden: u64 },
}

pub type VoiceResult<T> = Result<T, VoiceError>;
