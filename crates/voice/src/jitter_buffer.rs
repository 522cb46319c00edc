//! Jitter Buffer fuer komprimierte Sprachframes
//!
//! Ordnet eingehende Frames nach Zeitstempel (Sequenzzaehler des Senders)
//! und gibt pro Audio-Tick genau eine Entscheidung zurueck:
//! - [`JitterErgebnis::Paket`]: der erwartete Frame liegt vor
//! - [`JitterErgebnis::Fehlend`]: der erwartete Frame fehlt, Abspielposition rueckt vor
//! - [`JitterErgebnis::Einfuegung`]: Buffer fuellt sich noch (Vorlauf)
//!
//! ## Performance-Eigenschaften
//! - O(log n) Einfuegen (BTreeMap nach Zeitstempel sortiert)
//! - O(log n) Entnahme des erwarteten Frames
//! - Keine Locks (Synchronisation erfolgt pro Stream auf hoeherer Ebene)

use std::collections::BTreeMap;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Modus des Jitter Buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterBufferModus {
    /// Vorlauf passt sich dem gemessenen Ankunfts-Jitter an
    Adaptiv,
    /// Vorlauf ist konstant `vorlauf_pakete`
    Fixed,
}

/// Konfiguration fuer den Jitter Buffer
#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    pub modus: JitterBufferModus,
    /// Frames, die vor dem Abspielstart vorliegen muessen (Minimum im adaptiven Modus)
    pub vorlauf_pakete: usize,
    /// Maximale Anzahl gepufferter Frames
    pub max_pakete: usize,
    /// Abstand zur Abspielposition, ab dem neu synchronisiert wird
    pub max_luecke: u64,
    /// Dauer eines Frames in Millisekunden (fuer die Jitter-Schaetzung)
    pub frame_dauer_ms: u32,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            modus: JitterBufferModus::Adaptiv,
            vorlauf_pakete: 2,
            max_pakete: 50,
            max_luecke: 25,
            frame_dauer_ms: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistiken
// ---------------------------------------------------------------------------

/// Statistiken des Jitter Buffers (Snapshot)
#[derive(Debug, Clone, Default)]
pub struct JitterBufferStatistik {
    /// Eingefuegte Frames gesamt
    pub empfangen: u64,
    /// Ausgegebene Frames
    pub abgespielt: u64,
    /// Verworfene Duplikate
    pub duplikate: u64,
    /// Zu spaet eingetroffene Frames (hinter der Abspielposition)
    pub verspaetet: u64,
    /// Als fehlend gemeldete Ticks
    pub fehlend: u64,
    /// Neusynchronisationen nach grossen Spruengen
    pub resyncs: u64,
    /// Ankunfts-Jitter in Millisekunden (Standardabweichung)
    pub jitter_ms: f64,
    /// Aktueller Fuellstand
    pub fuellstand: usize,
    /// Aktueller Ziel-Vorlauf
    pub ziel_vorlauf: usize,
}

// ---------------------------------------------------------------------------
// JitterBuffer
// ---------------------------------------------------------------------------

/// Ein gepufferter Frame
#[derive(Debug, Clone, PartialEq)]
pub struct JitterPaket {
    pub zeitstempel: u64,
    /// Anzahl Ticks, die dieser Frame abdeckt
    pub spanne: u32,
    pub daten: Vec<u8>,
}

/// Ergebnis eines Abhol-Aufrufs
#[derive(Debug, Clone, PartialEq)]
pub enum JitterErgebnis {
    Paket(JitterPaket),
    Fehlend,
    Einfuegung,
}

/// Jitter Buffer fuer einen einzelnen Sprecher
pub struct JitterBuffer {
    config: JitterBufferConfig,
    pakete: BTreeMap<u64, JitterPaket>,
    /// Abspielposition; `None` solange der Vorlauf laeuft
    naechster: Option<u64>,
    /// Zuletzt bekannte Position, bleibt ueber Vorlauf-Phasen erhalten
    letzte_position: Option<u64>,
    /// Ticks, die ein nicht leerer Buffer schon im Vorlauf wartet
    wartende_ticks: usize,
    statistik: JitterBufferStatistik,
    // Ankunftszeiten fuer die Jitter-Schaetzung (Welford)
    letzte_ankunft: Option<(Instant, u64)>,
    jitter_mittel: f64,
    jitter_m2: f64,
    jitter_n: u64,
    ziel_vorlauf: usize,
}

impl JitterBuffer {
    pub fn neu(config: JitterBufferConfig) -> Self {
        let ziel_vorlauf = config.vorlauf_pakete.min(config.max_pakete);
        Self {
            config,
            pakete: BTreeMap::new(),
            naechster: None,
            letzte_position: None,
            wartende_ticks: 0,
            statistik: JitterBufferStatistik::default(),
            letzte_ankunft: None,
            jitter_mittel: 0.0,
            jitter_m2: 0.0,
            jitter_n: 0,
            ziel_vorlauf,
        }
    }

    pub fn standard() -> Self {
        Self::neu(JitterBufferConfig::default())
    }

    /// Fuegt einen Frame ein
    pub fn einfuegen(&mut self, zeitstempel: u64, spanne: u32, daten: Vec<u8>) {
        self.statistik.empfangen += 1;
        self.jitter_messen(zeitstempel);

        let referenz = self.naechster.or(self.letzte_position);
        if let Some(position) = referenz {
            if zeitstempel.abs_diff(position) > self.config.max_luecke {
                // Sender ist weit gesprungen (neue Aussendung): Zeitbasis verwerfen
                tracing::debug!(
                    zeitstempel,
                    position,
                    "Jitter Buffer: Sprung, neue Synchronisation"
                );
                self.pakete.clear();
                self.naechster = None;
                self.letzte_position = None;
                self.wartende_ticks = 0;
                self.statistik.resyncs += 1;
            } else if self.naechster.is_some() && zeitstempel < position {
                self.statistik.verspaetet += 1;
                tracing::trace!(zeitstempel, position, "Verspaeteter Frame verworfen");
                return;
            }
        }

        if self.pakete.contains_key(&zeitstempel) {
            self.statistik.duplikate += 1;
            return;
        }

        self.pakete.insert(
            zeitstempel,
            JitterPaket {
                zeitstempel,
                spanne: spanne.max(1),
                daten,
            },
        );

        // Ueberlauf: aeltesten Frame verwerfen
        if self.pakete.len() > self.config.max_pakete {
            if let Some((&aeltester, _)) = self.pakete.iter().next() {
                self.pakete.remove(&aeltester);
                tracing::warn!(zeitstempel = aeltester, "Jitter Buffer voll: Frame verworfen");
            }
        }

        if self.config.modus == JitterBufferModus::Adaptiv {
            self.ziel_vorlauf_anpassen();
        }
        self.statistik.fuellstand = self.pakete.len();
        self.statistik.ziel_vorlauf = self.ziel_vorlauf;
    }

    /// Holt die Entscheidung fuer den naechsten Tick
    pub fn holen(&mut self) -> JitterErgebnis {
        let position = match self.naechster {
            Some(p) => p,
            None => {
                let Some((&erster, _)) = self.pakete.iter().next() else {
                    return JitterErgebnis::Einfuegung;
                };
                // Start bei vollem Vorlauf oder wenn der erste Frame lange genug gewartet hat
                let ziel = self.ziel_vorlauf.max(1);
                if self.pakete.len() < ziel && self.wartende_ticks < ziel {
                    self.wartende_ticks += 1;
                    return JitterErgebnis::Einfuegung;
                }
                self.wartende_ticks = 0;
                self.naechster = Some(erster);
                erster
            }
        };

        self.statistik.fuellstand = self.pakete.len();
        match self.pakete.remove(&position) {
            Some(paket) => {
                let weiter = position + paket.spanne as u64;
                self.naechster = Some(weiter);
                self.letzte_position = Some(weiter);
                self.statistik.abgespielt += 1;
                self.statistik.fuellstand = self.pakete.len();
                JitterErgebnis::Paket(paket)
            }
            None => {
                self.naechster = Some(position + 1);
                self.letzte_position = Some(position + 1);
                self.statistik.fehlend += 1;
                JitterErgebnis::Fehlend
            }
        }
    }

    /// Verwirft gepufferte Frames und die Abspielposition
    ///
    /// Die Jitter-Statistik bleibt erhalten.
    pub fn zuruecksetzen(&mut self) {
        self.pakete.clear();
        self.naechster = None;
        self.letzte_position = None;
        self.wartende_ticks = 0;
        self.letzte_ankunft = None;
        self.statistik.fuellstand = 0;
    }

    pub fn fuellstand(&self) -> usize {
        self.pakete.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.pakete.is_empty()
    }

    pub fn ziel_vorlauf(&self) -> usize {
        self.ziel_vorlauf
    }

    pub fn statistik(&self) -> &JitterBufferStatistik {
        &self.statistik
    }

    /// Ankunfts-Jitter als Standardabweichung in Millisekunden
    pub fn jitter_ms(&self) -> f64 {
        if self.jitter_n < 2 {
            return 0.0;
        }
        (self.jitter_m2 / (self.jitter_n - 1) as f64).sqrt()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    /// Abweichung der Ankunftszeit vom Sendetakt (Welford-Online-Algorithmus)
    fn jitter_messen(&mut self, zeitstempel: u64) {
        let jetzt = Instant::now();
        if let Some((letzte_zeit, letzter_ts)) = self.letzte_ankunft {
            if zeitstempel > letzter_ts {
                let ankunft_ms = jetzt.duration_since(letzte_zeit).as_secs_f64() * 1000.0;
                let erwartet_ms = (zeitstempel - letzter_ts) as f64 * self.config.frame_dauer_ms as f64;
                let abweichung = ankunft_ms - erwartet_ms;

                self.jitter_n += 1;
                let delta = abweichung - self.jitter_mittel;
                self.jitter_mittel += delta / self.jitter_n as f64;
                let delta2 = abweichung - self.jitter_mittel;
                self.jitter_m2 += delta * delta2;
                self.statistik.jitter_ms = self.jitter_ms();
            }
        }
        self.letzte_ankunft = Some((jetzt, zeitstempel));
    }

    /// Ziel-Vorlauf = Jitter in Frames + 1, mindestens `vorlauf_pakete`
    fn ziel_vorlauf_anpassen(&mut self) {
        let frame_ms = self.config.frame_dauer_ms.max(1) as f64;
        let benoetigt = (self.jitter_ms() / frame_ms).ceil() as usize + 1;
        self.ziel_vorlauf = benoetigt
            .max(self.config.vorlauf_pakete)
            .min(self.config.max_pakete);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(vorlauf: usize, max: usize) -> JitterBuffer {
        JitterBuffer::neu(JitterBufferConfig {
            modus: JitterBufferModus::Fixed,
            vorlauf_pakete: vorlauf,
            max_pakete: max,
            max_luecke: 25,
            frame_dauer_ms: 20,
        })
    }

    fn zeitstempel(e: JitterErgebnis) -> Option<u64> {
        match e {
            JitterErgebnis::Paket(p) => Some(p.zeitstempel),
            _ => None,
        }
    }

    #[test]
    fn vorlauf_meldet_einfuegung() {
        let mut buf = fixed(3, 10);
        assert_eq!(buf.holen(), JitterErgebnis::Einfuegung);
        buf.einfuegen(10, 1, vec![1]);
        buf.einfuegen(11, 1, vec![2]);
        assert_eq!(buf.holen(), JitterErgebnis::Einfuegung);
        buf.einfuegen(12, 1, vec![3]);
        assert_eq!(zeitstempel(buf.holen()), Some(10));
    }

    #[test]
    fn einzelner_frame_startet_nach_wartezeit() {
        let mut buf = fixed(3, 10);
        buf.einfuegen(7, 1, vec![]);
        for _ in 0..3 {
            assert_eq!(buf.holen(), JitterErgebnis::Einfuegung);
        }
        assert_eq!(zeitstempel(buf.holen()), Some(7));
    }

    #[test]
    fn reihenfolge_wird_hergestellt() {
        let mut buf = fixed(5, 10);
        for ts in [2u64, 0, 1, 4, 3] {
            buf.einfuegen(ts, 1, vec![ts as u8]);
        }
        let folge: Vec<_> = (0..5).filter_map(|_| zeitstempel(buf.holen())).collect();
        assert_eq!(folge, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn luecke_meldet_fehlend() {
        let mut buf = fixed(1, 10);
        buf.einfuegen(0, 1, vec![0]);
        buf.einfuegen(2, 1, vec![2]);
        assert_eq!(zeitstempel(buf.holen()), Some(0));
        assert_eq!(buf.holen(), JitterErgebnis::Fehlend);
        assert_eq!(zeitstempel(buf.holen()), Some(2));
        assert_eq!(buf.holen(), JitterErgebnis::Fehlend);
        assert_eq!(buf.statistik().fehlend, 2);
    }

    #[test]
    fn duplikate_und_verspaetete_verworfen() {
        let mut buf = fixed(1, 10);
        buf.einfuegen(5, 1, vec![]);
        buf.einfuegen(5, 1, vec![]);
        assert_eq!(buf.statistik().duplikate, 1);
        assert_eq!(zeitstempel(buf.holen()), Some(5));
        buf.einfuegen(4, 1, vec![]);
        assert_eq!(buf.statistik().verspaetet, 1);
        assert!(buf.ist_leer());
    }

    #[test]
    fn ueberlauf_verwirft_aeltesten() {
        let mut buf = fixed(1, 3);
        for ts in 0..4u64 {
            buf.einfuegen(ts, 1, vec![]);
        }
        assert_eq!(buf.fuellstand(), 3);
        assert_eq!(zeitstempel(buf.holen()), Some(1));
    }

    #[test]
    fn grosser_sprung_synchronisiert_neu() {
        let mut buf = fixed(1, 10);
        buf.einfuegen(0, 1, vec![]);
        assert_eq!(zeitstempel(buf.holen()), Some(0));
        // neue Aussendung weit spaeter
        buf.einfuegen(500, 1, vec![]);
        assert_eq!(buf.statistik().resyncs, 1);
        assert_eq!(zeitstempel(buf.holen()), Some(500));
    }

    #[test]
    fn spanne_rueckt_mehrere_ticks_vor() {
        let mut buf = fixed(1, 10);
        buf.einfuegen(0, 2, vec![]);
        buf.einfuegen(2, 1, vec![]);
        assert_eq!(zeitstempel(buf.holen()), Some(0));
        assert_eq!(zeitstempel(buf.holen()), Some(2));
    }

    #[test]
    fn zuruecksetzen_behaelt_statistik() {
        let mut buf = fixed(1, 10);
        buf.einfuegen(0, 1, vec![]);
        buf.einfuegen(1, 1, vec![]);
        let _ = buf.holen();
        buf.zuruecksetzen();
        assert!(buf.ist_leer());
        assert_eq!(buf.statistik().empfangen, 2);
        assert_eq!(buf.statistik().abgespielt, 1);
        assert_eq!(buf.holen(), JitterErgebnis::Einfuegung);
    }

    #[test]
    fn adaptiver_vorlauf_bleibt_in_grenzen() {
        let mut buf = JitterBuffer::standard();
        for ts in 0..20u64 {
            buf.einfuegen(ts, 1, vec![]);
        }
        assert!(buf.ziel_vorlauf() >= 2);
        assert!(buf.ziel_vorlauf() <= 50);
    }
}
