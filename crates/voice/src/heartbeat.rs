//! Heartbeat-Ueberwachung des Voice-Servers
//!
//! Sendet periodisch `H { callsign }` und wartet auf `HA`. Bleibt die
//! Bestaetigung laenger als der Timeout aus, endet die Ueberwachung mit
//! [`HeartbeatEnde::Zeitueberschreitung`]; der Aufrufer schliesst den Kanal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use airwave_protocol::dto::{Heartbeat, HeartbeatAck};
use parking_lot::Mutex;

use crate::udp::UdpChannel;

/// Zeitkonstanten der Ueberwachung
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub intervall: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            intervall: Duration::from_secs(5),
            timeout: Duration::from_secs(45),
        }
    }
}

/// Grund fuer das Ende der Ueberwachung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEnde {
    Beendet,
    Zeitueberschreitung,
}

pub struct HeartbeatUeberwachung {
    kanal: Arc<UdpChannel>,
    callsign: String,
    config: HeartbeatConfig,
    letzte_bestaetigung: Arc<Mutex<Instant>>,
}

impl HeartbeatUeberwachung {
    /// Registriert den `HA`-Handler am Kanal
    pub fn neu(kanal: Arc<UdpChannel>, callsign: impl Into<String>, config: HeartbeatConfig) -> Self {
        let letzte_bestaetigung = Arc::new(Mutex::new(Instant::now()));
        let zeitpunkt = Arc::clone(&letzte_bestaetigung);
        kanal.dto_empfaenger_registrieren(move |_: HeartbeatAck| {
            *zeitpunkt.lock() = Instant::now();
        });

        Self {
            kanal,
            callsign: callsign.into(),
            config,
            letzte_bestaetigung,
        }
    }

    /// Zeit seit der letzten Bestaetigung (oder seit dem Start)
    pub fn seit_bestaetigung(&self) -> Duration {
        self.letzte_bestaetigung.lock().elapsed()
    }

    /// Laeuft bis Shutdown oder Zeitueberschreitung
    pub async fn starten(self, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) -> HeartbeatEnde {
        *self.letzte_bestaetigung.lock() = Instant::now();
        let mut takt = tokio::time::interval(self.config.intervall);
        takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let ende = loop {
            tokio::select! {
                _ = takt.tick() => {
                    let vergangen = self.seit_bestaetigung();
                    if vergangen > self.config.timeout {
                        tracing::warn!(
                            callsign = %self.callsign,
                            sekunden = vergangen.as_secs(),
                            "Keine Heartbeat-Bestaetigung, Verbindung verloren"
                        );
                        break HeartbeatEnde::Zeitueberschreitung;
                    }
                    self.kanal.send_dto(&Heartbeat {
                        callsign: self.callsign.clone(),
                    });
                    tracing::trace!(callsign = %self.callsign, "Heartbeat gesendet");
                }

                _ = &mut shutdown_rx => break HeartbeatEnde::Beendet,
            }
        };

        self.kanal.dto_handler_entfernen(<HeartbeatAck as airwave_protocol::Dto>::NAME);
        ende
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
