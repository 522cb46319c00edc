//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `AW_LOG_LEVEL`: Filter-Ausdruck, z.B. `info` oder `airwave_voice=trace,info`
//! - `AW_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Callsign und Kanal-Tag stehen als Span-Felder an jeder Zeile.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "AW_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "AW_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Ungueltiges Log-Format: {0}")]
    UngueltigesFormat(String),

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingError::UngueltigesFormat(andere.to_string())),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `AW_LOG_LEVEL` und `AW_LOG_FORMAT` ueberschreiben die Parameter. Ein
/// ungueltiger Filter faellt auf `info` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = format_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format)?;

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| LoggingError::BereitsInitialisiert(e.to_string()))
}

/// Umgebung vor Konfiguration
fn format_waehlen(aus_env: Option<String>, konfiguriert: &str) -> Result<LogFormat, LoggingError> {
    aus_env.as_deref().unwrap_or(konfiguriert).parse()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    format.parse::<LogFormat>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(format_waehlen(Some("json".into()), "text").unwrap(), LogFormat::Json);
        assert_eq!(format_waehlen(None, "text").unwrap(), LogFormat::Text);
        assert!(format_waehlen(Some("xml".into()), "text").is_err());
    }

    #[test]
    fn zweite_initialisierung_schlaegt_fehl() {
        // Das erste Ergebnis haengt davon ab, ob ein anderer Test schneller war
        let _ = logging_initialisieren("warn", "text");
        let zweites = logging_initialisieren("warn", "text");
        assert!(matches!(zweites, Err(LoggingError::BereitsInitialisiert(_))));
    }
}
