//! airwave-station – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, UDP-Kanal, Heartbeat und Mischengine zu einer
//! headless laufenden Station. Die Geraete-Backends haengen sich ueber
//! [`RadioStack::ausgabe_quelle`] und [`RadioStack::mikrofon_senke`] an;
//! ohne Backend taktet die Station selbst und verwirft die Frames.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use airwave_audio::RadioStack;
use airwave_audio::ClientPosition;
use airwave_core::{Ausgabe, RadioEvent};
use airwave_protocol::CryptoMode;
use airwave_voice::{HeartbeatEnde, HeartbeatUeberwachung, UdpChannel};
use anyhow::Result;
use config::StationConfig;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// Haelt die laufende Station zusammen
pub struct Station {
    pub config: StationConfig,
    stack: Arc<RadioStack>,
}

impl Station {
    /// Erstellt die Mischengine und konfiguriert die Funkgeraete
    pub fn neu(config: StationConfig) -> Result<Self> {
        let stack = Arc::new(RadioStack::standard(
            config.audio.clone(),
            &config.station.callsign,
        )?);
        stack.position_setzen(ClientPosition {
            lat_deg: config.station.lat_deg,
            lon_deg: config.station.lon_deg,
            height_msl_m: config.station.hoehe_msl_m,
            height_agl_m: config.station.hoehe_agl_m,
        });

        for radio in &config.radios {
            stack.frequenz_hinzufuegen(radio.frequenz, radio.on_headset);
            stack.gain_setzen(radio.frequenz, radio.gain);
            stack.hf_squelch_setzen(radio.frequenz, radio.hf_squelch);
            stack.tx_setzen(radio.frequenz, radio.tx);
            stack.rx_setzen(radio.frequenz, radio.rx);
        }
        stack.ausgabe_effekte_setzen(config.station.effekte);
        stack.eingangsfilter_setzen(config.station.eingangsfilter);

        Ok(Self { config, stack })
    }

    pub fn stack(&self) -> &Arc<RadioStack> {
        &self.stack
    }

    /// Verbindet den Kanal und laeuft bis Ctrl-C oder Heartbeat-Timeout
    ///
    /// Reihenfolge:
    /// 1. UDP-Kanal verbinden, "AR"-Handler an die Engine binden
    /// 2. Transceiver-Liste erstellen (vergibt die Sende-IDs)
    /// 3. Empfangs-Loop und Heartbeat starten
    /// 4. Audio-Takt und Wartungsrunde bis zum Shutdown
    pub async fn starten(self) -> Result<()> {
        let callsign = self.config.station.callsign.clone();
        let kanal_config = self.config.kanal_konfiguration()?;
        let span = tracing::info_span!("udp", kanal = %kanal_config.channel_tag);
        let kanal = Arc::new(UdpChannel::neu(kanal_config, span));
        if self.config.netzwerk.klartext_erlauben {
            kanal.empfangsmodus_aktivieren(CryptoMode::Keine);
        }

        let ziel = self.config.voice_server_adresse()?;
        let lokal = kanal.verbinden(ziel).await?;
        self.stack.kanal_setzen(Some(Arc::clone(&kanal)));

        let transceiver = self.stack.transceiver_dto_erstellen();
        tracing::info!(
            callsign = %callsign,
            ziel = %ziel,
            lokal = %lokal,
            radios = self.config.radios.len(),
            transceiver = transceiver.len(),
            "Station verbunden"
        );
        tracing::debug!(transceiver = %serde_json::to_string(&transceiver)?, "Transceiver gemeldet");

        let (empfang_tx, empfang_rx) = oneshot::channel();
        let empfang = tokio::spawn({
            let kanal = Arc::clone(&kanal);
            async move { kanal.empfangs_loop_starten(empfang_rx).await }
        });

        let (heartbeat_tx, heartbeat_rx) = oneshot::channel();
        let mut heartbeat = tokio::spawn(
            HeartbeatUeberwachung::neu(Arc::clone(&kanal), callsign.clone(), self.config.heartbeat())
                .starten(heartbeat_rx),
        );

        let ergebnis = self.takt_loop(&mut heartbeat).await;

        // Shutdown: Loops beenden, Kanal vom Stack loesen
        let _ = empfang_tx.send(());
        let _ = heartbeat_tx.send(());
        self.stack.kanal_setzen(None);
        kanal.schliessen();
        match empfang.await {
            Ok(Err(e)) => tracing::warn!(fehler = %e, "Empfangs-Loop mit Fehler beendet"),
            Err(e) => tracing::warn!(fehler = %e, "Empfangs-Loop abgebrochen"),
            Ok(Ok(())) => {}
        }
        tracing::info!(
            gesendet = airwave_voice::UdpStatistik::wert(&kanal.statistik().gesendet),
            empfangen = airwave_voice::UdpStatistik::wert(&kanal.statistik().empfangen),
            "Station beendet"
        );
        ergebnis
    }

    /// Audio-Takt, Wartungsrunde und Ereignis-Log
    async fn takt_loop(
        &self,
        heartbeat: &mut tokio::task::JoinHandle<HeartbeatEnde>,
    ) -> Result<()> {
        let params = self.stack.params().clone();
        let frame_groesse = params.frame_groesse();
        let mut headset = vec![0.0f32; frame_groesse];
        let mut lautsprecher = vec![0.0f32; frame_groesse];
        let mikrofon = vec![0.0f32; frame_groesse];
        let events = self.stack.event_empfaenger();

        let mut takt = tokio::time::interval(Duration::from_millis(params.frame_laenge_ms as u64));
        takt.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut wartung = tokio::time::interval(Duration::from_millis(params.wartung_intervall_ms));
        wartung.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Station laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        loop {
            tokio::select! {
                _ = takt.tick() => {
                    self.stack.get_audio_frame(Ausgabe::Headset, &mut headset);
                    self.stack.get_audio_frame(Ausgabe::Lautsprecher, &mut lautsprecher);
                    // Ohne Mikrofon-Backend: Stille haelt die Sendesequenz im Takt
                    self.stack.put_audio_frame(&mikrofon);

                    for event in events.try_iter() {
                        match event {
                            RadioEvent::RxOffen { frequenz } => tracing::info!(
                                frequenz,
                                sender = ?self.stack.letzter_sender(frequenz),
                                "Empfang beginnt"
                            ),
                            RadioEvent::RxGeschlossen { frequenz } => {
                                tracing::info!(frequenz, "Empfang beendet")
                            }
                        }
                    }
                }
                _ = wartung.tick() => {
                    let entfernt = self.stack.wartung();
                    tracing::debug!(
                        entfernt,
                        streams = self.stack.stream_anzahl(),
                        "Wartungsrunde"
                    );
                }
                ende = &mut *heartbeat => {
                    return match ende {
                        Ok(HeartbeatEnde::Zeitueberschreitung) => {
                            Err(anyhow::anyhow!("Voice-Server antwortet nicht mehr"))
                        }
                        Ok(HeartbeatEnde::Beendet) => Ok(()),
                        Err(e) => Err(anyhow::anyhow!("Heartbeat-Task abgebrochen: {e}")),
                    };
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    tracing::info!("Shutdown-Signal empfangen, Station wird beendet");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::RadioEinstellungen;

    #[test]
    fn radios_aus_konfiguration() {
        let mut config = StationConfig::default();
        config.radios = vec![
            RadioEinstellungen {
                frequenz: 121_500_000,
                tx: true,
                ..Default::default()
            },
            RadioEinstellungen {
                frequenz: 118_100_000,
                on_headset: false,
                ..Default::default()
            },
        ];
        let station = Station::neu(config).unwrap();
        assert_eq!(station.stack().frequenzen(), vec![118_100_000, 121_500_000]);
        assert_eq!(station.stack().transceiver_dto_erstellen().len(), 2);
    }

    #[test]
    fn eingangsfilter_aus_konfiguration() {
        let mut config = StationConfig::default();
        config.station.eingangsfilter = true;
        let station = Station::neu(config).unwrap();
        assert!(station.stack().eingangsfilter_aktiv());
    }
}
