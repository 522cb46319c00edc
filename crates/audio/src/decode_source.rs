//! Dekodierquelle pro entferntem Sprecher
//!
//! Jitter Buffer + eigener Opus-Decoder. Der Zustand laeuft
//! Neu -> Aktiv (erstes Paket) -> Endend (Paket mit `last_packet`)
//! -> Geschlossen (Endsequenz erreicht oder Stille-Timeout).

use std::time::Instant;

use airwave_core::{AudioSource, SitzungsParameter, SourceStatus};
use airwave_protocol::dto::AudioRxOnTransceivers;
use airwave_voice::jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferModus, JitterErgebnis};

use crate::codec::OpusDecoder;
use crate::error::AudioResult;

pub struct VoiceDecodeSource {
    jitter: JitterBuffer,
    decoder: OpusDecoder,
    /// Erwarteter Frame (Sequenz des Senders)
    aktueller_frame: u64,
    /// Sequenz des Pakets mit `last_packet`, solange die Aussendung endet
    ende_sequenz: Option<u64>,
    stille_frames: u32,
    stille_grenze: u32,
    aktiv: bool,
    /// Stream wurde geschlossen; die naechste Aussendung startet mit leerem Buffer
    geschlossen: bool,
    letzte_aktivitaet: Instant,
    span: tracing::Span,
}

impl VoiceDecodeSource {
    pub fn neu(params: &SitzungsParameter, span: tracing::Span) -> AudioResult<Self> {
        let config = JitterBufferConfig {
            modus: JitterBufferModus::Adaptiv,
            vorlauf_pakete: params.jitter_vorlauf_pakete,
            max_pakete: params.jitter_max_pakete,
            frame_dauer_ms: params.frame_laenge_ms,
            ..Default::default()
        };
        Ok(Self {
            jitter: JitterBuffer::neu(config),
            decoder: OpusDecoder::neu(params)?,
            aktueller_frame: 0,
            ende_sequenz: None,
            stille_frames: 0,
            stille_grenze: params.stille_frames,
            aktiv: false,
            geschlossen: false,
            letzte_aktivitaet: Instant::now(),
            span,
        })
    }

    /// Legt ein empfangenes Paket in den Jitter Buffer
    ///
    /// Der Sender zaehlt in Sendepausen weiter. Nach einem geschlossenen
    /// Stream beginnt die Wiedergabe deshalb beim ersten neuen Paket statt
    /// die Luecke mit PLC aufzufuellen.
    pub fn audio_dto_anhaengen(&mut self, dto: &AudioRxOnTransceivers) {
        let sequenz = dto.sequence_counter as u64;
        if self.geschlossen {
            self.leeren();
            self.geschlossen = false;
        }
        self.ende_sequenz = dto.last_packet.then_some(sequenz);
        self.jitter.einfuegen(sequenz, 1, dto.audio.clone());
        self.stille_frames = 0;
        self.letzte_aktivitaet = Instant::now();
        self.aktiv = true;
    }

    /// Leert den Buffer und setzt den Decoder zurueck; Jitter-Statistik bleibt
    pub fn leeren(&mut self) {
        self.jitter.zuruecksetzen();
        if let Err(e) = self.decoder.zuruecksetzen() {
            self.span.in_scope(|| tracing::warn!(fehler = %e, "Decoder-Reset fehlgeschlagen"));
        }
    }

    /// Ob der letzte `get_frame` erfolgreich war
    pub fn ist_aktiv(&self) -> bool {
        self.aktiv
    }

    pub fn letzte_aktivitaet(&self) -> Instant {
        self.letzte_aktivitaet
    }

    pub fn jitter_buffer(&self) -> &JitterBuffer {
        &self.jitter
    }

    fn frame_holen(&mut self, puffer: &mut [f32]) -> SourceStatus {
        match self.jitter.holen() {
            JitterErgebnis::Fehlend => {
                self.aktueller_frame += 1;
                match self.ende_sequenz {
                    Some(ende) if self.aktueller_frame >= ende => {
                        puffer.fill(0.0);
                        SourceStatus::Closed
                    }
                    _ => match self.decoder.decode_plc(puffer) {
                        Ok(_) => SourceStatus::Ok,
                        Err(e) => {
                            tracing::warn!(fehler = %e, "PLC fehlgeschlagen");
                            puffer.fill(0.0);
                            SourceStatus::Error
                        }
                    },
                }
            }
            JitterErgebnis::Einfuegung => {
                puffer.fill(0.0);
                SourceStatus::Ok
            }
            JitterErgebnis::Paket(paket) => {
                self.aktueller_frame = paket.zeitstempel;
                match self.decoder.decode(&paket.daten, puffer) {
                    Ok(_) => SourceStatus::Ok,
                    Err(e) => {
                        tracing::warn!(
                            sequenz = paket.zeitstempel,
                            fehler = %e,
                            "Frame nicht dekodierbar"
                        );
                        puffer.fill(0.0);
                        SourceStatus::Error
                    }
                }
            }
        }
    }
}

impl AudioSource for VoiceDecodeSource {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        let span = self.span.clone();
        let _guard = span.enter();

        let mut status = self.frame_holen(puffer);

        // Stille-Timeout unabhaengig von der Endsequenz
        if self.jitter.ist_leer() {
            self.stille_frames += 1;
            if self.stille_frames > self.stille_grenze && status != SourceStatus::Error {
                status = SourceStatus::Closed;
            }
        }

        if status == SourceStatus::Closed {
            self.geschlossen = true;
        }
        if status != SourceStatus::Ok {
            if self.aktiv {
                tracing::debug!(status = ?status, frame = self.aktueller_frame, "Stream beendet");
            }
            self.aktiv = false;
        }
        status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OpusEncoder;

    fn params() -> SitzungsParameter {
        SitzungsParameter {
            jitter_vorlauf_pakete: 1,
            ..Default::default()
        }
    }

    fn quelle() -> VoiceDecodeSource {
        VoiceDecodeSource::neu(&params(), tracing::Span::none()).unwrap()
    }

    fn paket(enc: &mut OpusEncoder, seq: u32, letztes: bool) -> AudioRxOnTransceivers {
        let pcm: Vec<f32> = (0..960).map(|i| ((i as f32) * 0.05).sin() * 0.4).collect();
        AudioRxOnTransceivers {
            callsign: "DLH123".into(),
            sequence_counter: seq,
            audio: enc.encode(&pcm).unwrap(),
            last_packet: letztes,
            transceivers: vec![],
        }
    }

    #[test]
    fn neu_ist_inaktiv() {
        assert!(!quelle().ist_aktiv());
    }

    #[test]
    fn ein_paket_dann_stille_schliesst() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        q.audio_dto_anhaengen(&paket(&mut enc, 0, false));
        assert!(q.ist_aktiv());

        let mut puffer = vec![0.0f32; 960];
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);

        let mut aufrufe = 1;
        let status = loop {
            let s = q.get_frame(&mut puffer);
            aufrufe += 1;
            if s != SourceStatus::Ok || aufrufe > 40 {
                break s;
            }
        };
        assert_eq!(status, SourceStatus::Closed);
        // Mehr als die Stille-Grenze, aber nicht unbegrenzt
        assert!(aufrufe > 10 && aufrufe <= 14, "aufrufe = {aufrufe}");
        assert!(!q.ist_aktiv());
    }

    #[test]
    fn letztes_paket_schliesst_an_endsequenz() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        for seq in 0..=4 {
            q.audio_dto_anhaengen(&paket(&mut enc, seq, seq == 4));
        }

        let mut puffer = vec![0.0f32; 960];
        for _ in 0..5 {
            assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
            assert!(q.ist_aktiv());
        }
        // Frame-Zaehler steht auf 4, der naechste fehlende Frame beendet den Stream
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Closed);
        assert!(puffer.iter().all(|s| *s == 0.0));
        assert!(!q.ist_aktiv());
    }

    #[test]
    fn fehlendes_paket_vor_ende_nutzt_plc() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        for seq in [0u32, 1, 3] {
            q.audio_dto_anhaengen(&paket(&mut enc, seq, seq == 3));
        }
        let mut puffer = vec![0.0f32; 960];
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        // Sequenz 2 fehlt, Ende (3) noch nicht erreicht
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Closed);
    }

    #[test]
    fn neues_paket_reaktiviert() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        q.audio_dto_anhaengen(&paket(&mut enc, 0, true));
        let mut puffer = vec![0.0f32; 960];
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Closed);
        assert!(!q.ist_aktiv());

        q.audio_dto_anhaengen(&paket(&mut enc, 200, false));
        assert!(q.ist_aktiv());
    }

    #[test]
    fn neue_aussendung_startet_ohne_luecke() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        for seq in 0..=4 {
            q.audio_dto_anhaengen(&paket(&mut enc, seq, seq == 4));
        }
        let mut puffer = vec![0.0f32; 960];
        let status = loop {
            let s = q.get_frame(&mut puffer);
            if s != SourceStatus::Ok {
                break s;
            }
        };
        assert_eq!(status, SourceStatus::Closed);

        // Sender hat waehrend der Pause weitergezaehlt (Abstand < 25)
        for seq in 25..35 {
            q.audio_dto_anhaengen(&paket(&mut enc, seq, false));
        }
        let fehlend = q.jitter_buffer().statistik().fehlend;
        assert_eq!(q.get_frame(&mut puffer), SourceStatus::Ok);
        // Sequenz 25 wurde dekodiert, keine PLC-Frames fuer 5..24
        assert_eq!(q.jitter_buffer().statistik().fehlend, fehlend);
        assert_eq!(q.jitter_buffer().fuellstand(), 9);
    }

    #[test]
    fn leeren_verwirft_pakete() {
        let mut enc = OpusEncoder::neu(&params()).unwrap();
        let mut q = quelle();
        q.audio_dto_anhaengen(&paket(&mut enc, 0, false));
        q.audio_dto_anhaengen(&paket(&mut enc, 1, false));
        q.leeren();
        assert!(q.jitter_buffer().ist_leer());
        assert_eq!(q.jitter_buffer().statistik().empfangen, 2);
    }
}
