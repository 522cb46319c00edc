//! Zustand eines Funkgeraets (eine Frequenz)

use airwave_core::FrequenzHz;
use airwave_protocol::dto::TransceiverDto;

use crate::dsp::{AudioProcessor, EffektGenerator, SimpleCompressor, VhfFilter};

/// Ein konfiguriertes Funkgeraet
#[derive(Debug)]
pub struct RadioState {
    pub frequenz: FrequenzHz,
    pub gain: f32,
    pub on_headset: bool,
    pub tx: bool,
    pub rx: bool,
    /// Keine Funkeffekte (Filter, Kompressor, Rauschbetten)
    pub effekte_umgehen: bool,
    /// HF-Rauschbett stumm
    pub hf_squelch: bool,
    /// Callsign der letzten empfangenen Aussendung
    pub letzter_sender: Option<String>,
    /// Transceiver aus der Stationsliste; leer = Client-Position
    pub transceiver: Vec<TransceiverDto>,
    /// IDs aus dem letzten Transceiver-Abgleich
    pub(crate) transceiver_ids: Vec<u16>,
    /// Gemischte Streams im letzten Tick
    pub(crate) letzte_rx_anzahl: u32,
    pub(crate) effekte: RadioEffekte,
}

impl RadioState {
    pub(crate) fn neu(frequenz: FrequenzHz, sample_rate: u32) -> Self {
        Self {
            frequenz,
            gain: 1.0,
            on_headset: false,
            tx: false,
            rx: false,
            effekte_umgehen: false,
            hf_squelch: false,
            letzter_sender: None,
            transceiver: Vec::new(),
            transceiver_ids: Vec::new(),
            letzte_rx_anzahl: 0,
            effekte: RadioEffekte::neu(sample_rate),
        }
    }

    /// Anzahl der im letzten Tick gemischten Streams
    pub fn empfangene_streams(&self) -> u32 {
        self.letzte_rx_anzahl
    }

    /// Setzt die Effekt-Slots zurueck; der Klick laeuft auf Wunsch weiter
    pub(crate) fn effekte_zuruecksetzen(&mut self, klick_behalten: bool) {
        if !klick_behalten {
            self.effekte.klick = None;
            self.letzte_rx_anzahl = 0;
        }
        self.effekte.blockton = None;
        self.effekte.knacken = None;
        self.effekte.vhf_rauschen = None;
        self.effekte.hf_rauschen = None;
        self.effekte.ac_bus = None;
    }
}

/// Effektkette und Effekt-Slots eines Geraets
#[derive(Debug)]
pub(crate) struct RadioEffekte {
    pub vhf_filter: VhfFilter,
    pub kompressor: SimpleCompressor,
    pub klick: Option<EffektGenerator>,
    pub blockton: Option<EffektGenerator>,
    pub knacken: Option<EffektGenerator>,
    pub vhf_rauschen: Option<EffektGenerator>,
    pub hf_rauschen: Option<EffektGenerator>,
    pub ac_bus: Option<EffektGenerator>,
}

impl RadioEffekte {
    fn neu(sample_rate: u32) -> Self {
        let rate = sample_rate as f32;
        Self {
            vhf_filter: VhfFilter::neu(rate),
            kompressor: SimpleCompressor::standard(rate),
            klick: None,
            blockton: None,
            knacken: None,
            vhf_rauschen: None,
            hf_rauschen: None,
            ac_bus: None,
        }
    }

    /// Filter und Kompressor auf den Kanalpuffer
    pub fn kette_anwenden(&mut self, kanal: &mut [f32]) {
        self.vhf_filter.verarbeiten(kanal);
        self.kompressor.verarbeiten(kanal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{RecordedSample, WhiteNoise};
    use std::sync::Arc;

    #[test]
    fn neues_geraet_standardwerte() {
        let radio = RadioState::neu(121_500_000, 48_000);
        assert_eq!(radio.gain, 1.0);
        assert!(!radio.tx && !radio.rx);
        assert!(radio.letzter_sender.is_none());
        assert_eq!(radio.empfangene_streams(), 0);
    }

    #[test]
    fn zuruecksetzen_behaelt_klick() {
        let mut radio = RadioState::neu(121_500_000, 48_000);
        radio.effekte.klick = Some(EffektGenerator::Aufnahme(RecordedSample::neu(
            Arc::new(vec![0.1; 10]),
            false,
        )));
        radio.effekte.knacken = Some(EffektGenerator::Weiss(WhiteNoise::neu(0.1)));
        radio.letzte_rx_anzahl = 2;

        radio.effekte_zuruecksetzen(true);
        assert!(radio.effekte.klick.is_some());
        assert!(radio.effekte.knacken.is_none());
        assert_eq!(radio.letzte_rx_anzahl, 2);

        radio.effekte_zuruecksetzen(false);
        assert!(radio.effekte.klick.is_none());
        assert_eq!(radio.letzte_rx_anzahl, 0);
    }
}
