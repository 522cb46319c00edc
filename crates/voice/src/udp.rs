//! UDP-Kanal zum Voice-Server
//!
//! Bindet einen [`CryptoChannel`] an einen verbundenen UDP-Socket.
//!
//! ## Ablauf
//!
//! ```text
//! Senden:   DTO -> kapseln_dto(seq++) -> try_send
//!
//! Empfang:  recv -> entkapseln -> Modus erlaubt? -> Kanal-Tag passt?
//!                -> SequenceTest -> Laengenpraefix -> Handler[dto_name]
//! ```
//!
//! Jede Abweisung wird geloggt und das Paket verworfen. Sprachverkehr
//! vertraegt Verluste, es gibt keine Wiederholung.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use airwave_protocol::channel::MAX_DATAGRAMM_GROESSE;
use airwave_protocol::{
    ChannelConfig, CryptoChannel, CryptoMode, Dto, EntkapselteNachricht, SequenceTest,
    SequenzStatus,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use crate::error::{VoiceError, VoiceResult};

/// Handler fuer einen DTO-Namen; erhaelt den msgpack-Body
pub type DtoHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Zaehler des Kanals (lock-frei)
#[derive(Debug, Default)]
pub struct UdpStatistik {
    pub gesendet: AtomicU64,
    pub sende_verworfen: AtomicU64,
    pub empfangen: AtomicU64,
    pub zugestellt: AtomicU64,
    pub verworfen: AtomicU64,
    pub ueberlaeufe: AtomicU64,
}

impl UdpStatistik {
    fn zaehlen(zaehler: &AtomicU64) {
        zaehler.fetch_add(1, Ordering::Relaxed);
    }

    pub fn wert(zaehler: &AtomicU64) -> u64 {
        zaehler.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// UdpChannel
// ---------------------------------------------------------------------------

/// Verschluesselter Datagramm-Kanal mit Sequenzpruefung und DTO-Dispatch
pub struct UdpChannel {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    krypto: RwLock<CryptoChannel>,
    empfangs_sequenz: Mutex<SequenceTest>,
    sende_sequenz: AtomicU64,
    sende_modus: CryptoMode,
    /// Bitmaske erlaubter Empfangsmodi (`1 << modus`)
    erlaubte_modi: AtomicU8,
    handler: DashMap<String, DtoHandler>,
    statistik: UdpStatistik,
    /// Weckt laufende Empfangs-Loops beim Schliessen
    geschlossen: Notify,
    span: tracing::Span,
}

impl UdpChannel {
    /// Erstellt einen unverbundenen Kanal
    ///
    /// Alle Logzeilen laufen im uebergebenen `span`.
    pub fn neu(config: ChannelConfig, span: tracing::Span) -> Self {
        Self {
            socket: Mutex::new(None),
            krypto: RwLock::new(CryptoChannel::mit_konfiguration(config)),
            empfangs_sequenz: Mutex::new(SequenceTest::default()),
            sende_sequenz: AtomicU64::new(0),
            sende_modus: CryptoMode::ChaCha20Poly1305,
            erlaubte_modi: AtomicU8::new(CryptoMode::ChaCha20Poly1305.maske()),
            handler: DashMap::new(),
            statistik: UdpStatistik::default(),
            geschlossen: Notify::new(),
            span,
        }
    }

    /// Kanal mit eigenem Span `udp_kanal{tag=...}`
    pub fn mit_standard_span(config: ChannelConfig) -> Self {
        let span = tracing::info_span!("udp_kanal", tag = %config.channel_tag);
        Self::neu(config, span)
    }

    /// Sendemodus festlegen (Standard: ChaCha20-Poly1305)
    pub fn mit_sendemodus(mut self, modus: CryptoMode) -> Self {
        self.sende_modus = modus;
        self
    }

    // -----------------------------------------------------------------------
    // Verbindung
    // -----------------------------------------------------------------------

    /// Bindet einen lokalen Socket und verbindet ihn mit `ziel`
    pub async fn verbinden(&self, ziel: SocketAddr) -> VoiceResult<SocketAddr> {
        let lokal = match ziel.ip() {
            IpAddr::V4(ip) if ip.is_loopback() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(lokal).await?;
        socket.connect(ziel).await?;
        let lokale_adresse = socket.local_addr()?;

        *self.socket.lock() = Some(Arc::new(socket));
        self.span.in_scope(|| {
            tracing::info!(ziel = %ziel, lokal = %lokale_adresse, "UDP-Kanal verbunden");
        });
        Ok(lokale_adresse)
    }

    pub fn ist_verbunden(&self) -> bool {
        self.socket.lock().is_some()
    }

    pub fn lokale_adresse(&self) -> VoiceResult<SocketAddr> {
        let socket = self.socket.lock().clone().ok_or(VoiceError::NichtVerbunden)?;
        Ok(socket.local_addr()?)
    }

    /// Schliesst den Socket und setzt die Empfangssequenz zurueck
    ///
    /// Laufende Sendeaufrufe anderer Threads werden danach still verworfen,
    /// ein laufender Empfangs-Loop endet.
    pub fn schliessen(&self) {
        let alt = self.socket.lock().take();
        self.empfangs_sequenz.lock().zuruecksetzen();
        self.geschlossen.notify_waiters();
        if alt.is_some() {
            self.span.in_scope(|| tracing::info!("UDP-Kanal geschlossen"));
        }
    }

    // -----------------------------------------------------------------------
    // Konfiguration
    // -----------------------------------------------------------------------

    /// Uebernimmt neue Schluessel; bei neuem Empfangsschluessel beginnt die
    /// Gegenstelle mit neuer Sequenz, daher wird der SequenceTest zurueckgesetzt
    pub fn kanal_konfiguration_setzen(&self, config: ChannelConfig) {
        let empfang_neu = self.krypto.write().kanal_konfiguration_setzen(config);
        if empfang_neu {
            self.empfangs_sequenz.lock().zuruecksetzen();
        }
        self.span.in_scope(|| {
            tracing::debug!(empfangsschluessel_neu = empfang_neu, "Kanal-Konfiguration gesetzt");
        });
    }

    pub fn kanal_tag(&self) -> String {
        self.krypto.read().kanal_tag().to_string()
    }

    pub fn empfangsmodus_aktivieren(&self, modus: CryptoMode) {
        self.erlaubte_modi.fetch_or(modus.maske(), Ordering::AcqRel);
    }

    pub fn empfangsmodus_deaktivieren(&self, modus: CryptoMode) {
        self.erlaubte_modi.fetch_and(!modus.maske(), Ordering::AcqRel);
    }

    pub fn empfangsmodus_erlaubt(&self, modus: CryptoMode) -> bool {
        self.erlaubte_modi.load(Ordering::Acquire) & modus.maske() != 0
    }

    // -----------------------------------------------------------------------
    // Handler
    // -----------------------------------------------------------------------

    /// Registriert einen Handler fuer den DTO-Namen (ersetzt einen vorhandenen)
    pub fn dto_handler_registrieren<F>(&self, name: &str, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.handler.insert(name.to_string(), Arc::new(handler));
    }

    /// Registriert einen typisierten Handler; nicht dekodierbare Bodies werden verworfen
    pub fn dto_empfaenger_registrieren<T, F>(&self, handler: F)
    where
        T: Dto + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let span = self.span.clone();
        self.dto_handler_registrieren(T::NAME, move |body| match T::dekodieren(body) {
            Ok(dto) => handler(dto),
            Err(e) => span.in_scope(|| {
                tracing::debug!(dto = T::NAME, fehler = %e, "DTO nicht dekodierbar");
            }),
        });
    }

    pub fn dto_handler_entfernen(&self, name: &str) -> bool {
        self.handler.remove(name).is_some()
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Kapselt und sendet ein DTO
    ///
    /// Blockiert nie: ohne Socket, bei `WouldBlock` oder unvollstaendigem
    /// Schreiben wird das Paket verworfen und `false` zurueckgegeben.
    pub fn send_dto<T: Dto>(&self, dto: &T) -> bool {
        let _guard = self.span.enter();
        let Some(socket) = self.socket.lock().clone() else {
            UdpStatistik::zaehlen(&self.statistik.sende_verworfen);
            tracing::trace!(dto = T::NAME, "Kein Socket, DTO verworfen");
            return false;
        };

        let sequenz = self.sende_sequenz.fetch_add(1, Ordering::AcqRel);
        let datagramm = match self.krypto.read().kapseln_dto(dto, sequenz, self.sende_modus) {
            Ok(d) => d,
            Err(e) => {
                UdpStatistik::zaehlen(&self.statistik.sende_verworfen);
                tracing::warn!(dto = T::NAME, sequenz, fehler = %e, "Kapseln fehlgeschlagen");
                return false;
            }
        };

        match socket.try_send(&datagramm) {
            Ok(n) if n == datagramm.len() => {
                UdpStatistik::zaehlen(&self.statistik.gesendet);
                tracing::trace!(dto = T::NAME, sequenz, bytes = n, "DTO gesendet");
                true
            }
            Ok(n) => {
                UdpStatistik::zaehlen(&self.statistik.sende_verworfen);
                let fehler = VoiceError::Unvollstaendig {
                    gesendet: n,
                    erwartet: datagramm.len(),
                };
                tracing::warn!(dto = T::NAME, sequenz, fehler = %fehler, "Paket verworfen");
                false
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                UdpStatistik::zaehlen(&self.statistik.sende_verworfen);
                tracing::debug!(dto = T::NAME, sequenz, "Socket voll, Paket verworfen");
                false
            }
            Err(e) => {
                UdpStatistik::zaehlen(&self.statistik.sende_verworfen);
                tracing::warn!(dto = T::NAME, sequenz, fehler = %e, "UDP-Sendefehler");
                false
            }
        }
    }

    /// Naechste Sende-Sequenznummer
    pub fn sende_sequenz(&self) -> u64 {
        self.sende_sequenz.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Empfang
    // -----------------------------------------------------------------------

    /// Empfangs-Loop; laeuft bis `shutdown_rx` ausloest oder der Kanal geschlossen wird
    pub async fn empfangs_loop_starten(
        &self,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> VoiceResult<()> {
        let socket = self.socket.lock().clone().ok_or(VoiceError::NichtVerbunden)?;
        // Puffer wird pro Datagramm wiederverwendet
        let mut buf = vec![0u8; MAX_DATAGRAMM_GROESSE];

        self.span.in_scope(|| tracing::info!("Empfangs-Loop gestartet"));

        loop {
            tokio::select! {
                ergebnis = socket.recv(&mut buf) => {
                    match ergebnis {
                        Ok(len) => {
                            self.paket_verarbeiten(&buf[..len]);
                            // schliessen() waehrend der Verarbeitung verpasst das Notify
                            if !self.ist_verbunden() {
                                break;
                            }
                        }
                        Err(e) => {
                            // ICMP-Fehler der Gegenstelle sind nicht fatal
                            self.span.in_scope(|| {
                                tracing::debug!(fehler = %e, "UDP-Empfangsfehler");
                            });
                            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        }
                    }
                }

                _ = &mut shutdown_rx => {
                    self.span.in_scope(|| tracing::info!("Empfangs-Loop: Shutdown-Signal"));
                    break;
                }

                _ = self.geschlossen.notified() => {
                    self.span.in_scope(|| tracing::info!("Empfangs-Loop: Kanal geschlossen"));
                    break;
                }
            }
        }

        Ok(())
    }

    /// Verarbeitet ein Datagramm; gibt `true` zurueck wenn ein Handler aufgerufen wurde
    pub fn paket_verarbeiten(&self, daten: &[u8]) -> bool {
        let _guard = self.span.enter();
        UdpStatistik::zaehlen(&self.statistik.empfangen);

        let nachricht = match self.nachricht_pruefen(daten) {
            Some(n) => n,
            None => {
                UdpStatistik::zaehlen(&self.statistik.verworfen);
                return false;
            }
        };

        let body = match nachricht.dto_body() {
            Ok(b) => b,
            Err(e) => {
                UdpStatistik::zaehlen(&self.statistik.verworfen);
                tracing::debug!(dto = %nachricht.dto_name, fehler = %e, "DTO-Rahmen ungueltig");
                return false;
            }
        };

        // Handler aus der Map klonen, damit kein Shard-Lock ueber den Aufruf haelt
        let handler = self
            .handler
            .get(&nachricht.dto_name)
            .map(|h| Arc::clone(h.value()));
        match handler {
            Some(h) => {
                h(body);
                UdpStatistik::zaehlen(&self.statistik.zugestellt);
                true
            }
            None => {
                UdpStatistik::zaehlen(&self.statistik.verworfen);
                tracing::trace!(dto = %nachricht.dto_name, "Kein Handler registriert");
                false
            }
        }
    }

    pub fn statistik(&self) -> &UdpStatistik {
        &self.statistik
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    fn nachricht_pruefen(&self, daten: &[u8]) -> Option<EntkapselteNachricht> {
        let nachricht = {
            let krypto = self.krypto.read();
            match krypto.entkapseln(daten) {
                Ok(n) => {
                    if n.kanal_tag != krypto.kanal_tag() {
                        tracing::debug!(
                            erhalten = %n.kanal_tag,
                            erwartet = %krypto.kanal_tag(),
                            "Fremder Kanal-Tag"
                        );
                        return None;
                    }
                    n
                }
                Err(e) => {
                    tracing::debug!(bytes = daten.len(), fehler = %e, "Datagramm verworfen");
                    return None;
                }
            }
        };

        if !self.empfangsmodus_erlaubt(nachricht.modus) {
            tracing::debug!(modus = ?nachricht.modus, "Modus nicht erlaubt");
            return None;
        }

        match self.empfangs_sequenz.lock().empfangen(nachricht.sequenz) {
            SequenzStatus::Ok => {}
            SequenzStatus::Veraltet => {
                tracing::trace!(sequenz = nachricht.sequenz, "Duplikat verworfen");
                return None;
            }
            SequenzStatus::Ueberlauf => {
                UdpStatistik::zaehlen(&self.statistik.ueberlaeufe);
                tracing::debug!(sequenz = nachricht.sequenz, "Sequenzsprung");
            }
        }

        Some(nachricht)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
