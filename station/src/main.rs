//! Airwave Station – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet die Station.

use airwave_station::{config::StationConfig, Station};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("AIRWAVE_CONFIG").unwrap_or_else(|_| "airwave.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = StationConfig::laden(&config_pfad)?;

    airwave_observability::logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        callsign = %config.station.callsign,
        "Airwave Station wird initialisiert"
    );

    let station = Station::neu(config)?;
    station.starten().await?;

    Ok(())
}
