//! Stations-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass die Station ohne Konfigurationsdatei
//! im Loopback-Betrieb lauffaehig ist.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use airwave_core::{FrequenzHz, SitzungsParameter};
use airwave_protocol::ChannelConfig;
use airwave_voice::HeartbeatConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Vollstaendige Stations-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Callsign und Standort
    pub station: StationEinstellungen,
    /// Voice-Server und Kanal
    pub netzwerk: NetzwerkEinstellungen,
    /// Sitzungsparameter der Audio-Engine
    pub audio: SitzungsParameter,
    /// Konfigurierte Funkgeraete
    pub radios: Vec<RadioEinstellungen>,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationEinstellungen {
    pub callsign: String,
    pub lat_deg: f64,
    pub lon_deg: f64,
    /// Hoehe ueber dem Meeresspiegel in Metern
    pub hoehe_msl_m: f64,
    /// Hoehe ueber Grund in Metern
    pub hoehe_agl_m: f64,
    /// Funkeffekte auf den Ausgaben
    pub effekte: bool,
    /// Noise Gate + AGC auf dem Mikrofon
    pub eingangsfilter: bool,
}

impl Default for StationEinstellungen {
    fn default() -> Self {
        Self {
            callsign: "EDDF_TWR".into(),
            lat_deg: 50.0333,
            lon_deg: 8.5706,
            hoehe_msl_m: 111.0,
            hoehe_agl_m: 30.0,
            effekte: true,
            eingangsfilter: false,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Adresse des Voice-Servers (host:port)
    pub voice_server: String,
    /// JSON-Datei mit Kanal-Tag und Schluesseln der Sitzungsschicht
    pub kanal_datei: Option<String>,
    /// Unverschluesselte Pakete annehmen
    pub klartext_erlauben: bool,
    pub heartbeat_intervall_s: u64,
    pub heartbeat_timeout_s: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            voice_server: "127.0.0.1:50000".into(),
            kanal_datei: None,
            klartext_erlauben: false,
            heartbeat_intervall_s: 5,
            heartbeat_timeout_s: 45,
        }
    }
}

/// Ein Funkgeraet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioEinstellungen {
    pub frequenz: FrequenzHz,
    pub gain: f32,
    pub on_headset: bool,
    pub tx: bool,
    pub rx: bool,
    pub hf_squelch: bool,
}

impl Default for RadioEinstellungen {
    fn default() -> Self {
        Self {
            frequenz: 0,
            gain: 1.0,
            on_headset: true,
            tx: false,
            rx: true,
            hf_squelch: false,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl StationConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.station.callsign.trim().is_empty() {
            anyhow::bail!("station.callsign darf nicht leer sein");
        }
        if !airwave_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("logging.format '{}' ungueltig", self.logging.format);
        }
        self.audio.validieren().context("audio")?;

        let mut gesehen = HashSet::new();
        for radio in &self.radios {
            if radio.frequenz == 0 {
                anyhow::bail!("radios: Frequenz 0 ist ungueltig");
            }
            if !gesehen.insert(radio.frequenz) {
                anyhow::bail!("radios: Frequenz {} doppelt", radio.frequenz);
            }
            if !radio.tx && !radio.rx {
                anyhow::bail!("radios: Frequenz {} ohne tx und rx", radio.frequenz);
            }
        }
        Ok(())
    }

    pub fn voice_server_adresse(&self) -> anyhow::Result<SocketAddr> {
        self.netzwerk
            .voice_server
            .parse()
            .with_context(|| format!("netzwerk.voice_server '{}'", self.netzwerk.voice_server))
    }

    /// Kanal aus der Datei der Sitzungsschicht, sonst zufaellige Schluessel
    pub fn kanal_konfiguration(&self) -> anyhow::Result<ChannelConfig> {
        match &self.netzwerk.kanal_datei {
            Some(pfad) => {
                let json = std::fs::read_to_string(pfad)
                    .with_context(|| format!("Kanal-Datei '{pfad}' nicht lesbar"))?;
                ChannelConfig::aus_json(&json)
                    .with_context(|| format!("Kanal-Datei '{pfad}' ungueltig"))
            }
            None => {
                tracing::warn!("Keine Kanal-Datei, verwende zufaellige Schluessel (nur Loopback)");
                Ok(ChannelConfig::zufaellig(self.station.callsign.clone()))
            }
        }
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            intervall: Duration::from_secs(self.netzwerk.heartbeat_intervall_s.max(1)),
            timeout: Duration::from_secs(self.netzwerk.heartbeat_timeout_s.max(1)),
        }
    }
}
