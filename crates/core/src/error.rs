//! Fehlertypen fuer airwave-core
//!
//! Untergeordnete Crates definieren eigene Fehler und konvertieren
//! bei Bedarf via `#[from]`.

use thiserror::Error;

/// Result-Alias fuer airwave-core
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Fehler in den gemeinsamen Bausteinen
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Ungueltige Frame-Groesse: erwartet {erwartet}, erhalten {erhalten}")]
    FrameGroesse { erwartet: usize, erhalten: usize },

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl CoreError {
    /// Erstellt einen Konfigurationsfehler aus einer beliebigen Nachricht
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = CoreError::konfiguration("Abtastrate 44100 nicht unterstuetzt");
        assert_eq!(
            e.to_string(),
            "Konfigurationsfehler: Abtastrate 44100 nicht unterstuetzt"
        );
    }

    #[test]
    fn frame_groesse_anzeige() {
        let e = CoreError::FrameGroesse {
            erwartet: 960,
            erhalten: 480,
        };
        assert!(e.to_string().contains("960"));
        assert!(e.to_string().contains("480"));
    }
}
