//! Fehlertypen fuer das Transport-Protokoll
//!
//! Keiner dieser Fehler verlaesst die Netzwerkgrenze: der UDP-Kanal
//! protokolliert den Grund und verwirft das Paket.

use thiserror::Error;

/// Fehler beim Kapseln oder Entkapseln
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Datagramm zu kurz: {laenge} Bytes")]
    ZuKurz { laenge: usize },

    #[error("Datagramm zu gross: {groesse} Bytes (Maximum {maximum})")]
    ZuGross { groesse: usize, maximum: usize },

    #[error("Ungueltiger Header: {0}")]
    UngueltigerHeader(String),

    #[error("Unbekannter Krypto-Modus: {0}")]
    UnbekannterModus(u8),

    #[error("Authentifizierung fehlgeschlagen")]
    Authentifizierung,

    #[error("Verschluesselung fehlgeschlagen")]
    Verschluesselung,

    #[error("Ungueltiger DTO-Rahmen: {0}")]
    UngueltigerRahmen(String),

    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(String),

    #[error("Deserialisierung fehlgeschlagen: {0}")]
    Deserialisierung(String),

    #[error("Ungueltiger Schluessel: {0}")]
    Schluessel(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl From<rmp_serde::encode::Error> for ProtocolError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Self::Serialisierung(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ProtocolError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Self::Deserialisierung(e.to_string())
    }
}
