//! RadioStack – Mischengine fuer Empfang und Senden
//!
//! ```text
//! Netz:   "AR" -> rx_sprachpaket -> VoiceDecodeSource (pro Callsign)
//! Tick:   get_audio_frame(Ausgabe) -> Streams ziehen -> pro Geraet mischen
//!         -> Effekte -> Ausgabepuffer
//! Mikro:  put_audio_frame -> VU -> [Eingangsfilter] -> Opus -> "AT"
//! ```
//!
//! Geraete-Tabelle, Stream-Tabelle und jeder Stream haben einen eigenen
//! Mutex. Die Tabellen sind nur fuer Lookups gesperrt, dekodiert wird
//! unter der Sperre des einzelnen Streams. Sperrreihenfolge:
//! Geraete -> Streams -> Stream.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use airwave_core::audio::{mischen, spitzenwert};
use airwave_core::{
    ist_hf, Ausgabe, AudioSink, AudioSource, FrequenzHz, RadioEvent, SitzungsParameter,
    SourceStatus,
};
use airwave_protocol::dto::{
    AudioRxOnTransceivers, AudioTxOnTransceivers, RxTransceiver, StationTransceiver,
    TransceiverDto, TxTransceiver,
};
use airwave_protocol::Dto;
use airwave_voice::UdpChannel;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use super::state::RadioState;
use super::{
    hoerbar, knack_faktor, AC_BUS_GAIN_HF, AC_BUS_GAIN_VHF, BLOCKTON_GAIN, BLOCKTON_HZ,
    HF_RAUSCHEN_GAIN, HF_SPRACH_GAIN, KLICK_GAIN, PEGEL_MINIMUM_DB, VHF_RAUSCHEN_GAIN,
    VU_FENSTER_MS,
};
use crate::decode_source::VoiceDecodeSource;
use crate::dsp::{
    effekt_mischen, AudioProcessor, EffektGenerator, EffektRessourcen, EingangsFilter,
    RecordedSample, SineTone,
};
use crate::encode_sink::VoiceEncodeSink;
use crate::error::AudioResult;
use crate::metering::RollingAverage;

/// Ereignisse, die ohne Leser gepuffert werden
const EVENT_KAPAZITAET: usize = 256;

/// Standort des Clients; Ersatz fuer Geraete ohne Stations-Transceiver
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClientPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_msl_m: f64,
    pub height_agl_m: f64,
}

struct StreamEintrag {
    quelle: VoiceDecodeSource,
    /// Transceiver des letzten Pakets
    transceiver: Vec<RxTransceiver>,
}

type StreamRef = Arc<Mutex<StreamEintrag>>;

/// Arbeitspuffer einer Ausgabe, ueber Ticks wiederverwendet
struct AusgabePuffer {
    misch: Vec<f32>,
    kanal: Vec<f32>,
    effekt: Vec<f32>,
    kopfhoerer_frequenzen: Vec<FrequenzHz>,
    kandidaten: Vec<StreamRef>,
    frames: Vec<Vec<f32>>,
    /// In diesem Tick erfolgreich gezogene Streams mit Index in `frames`
    gezogen: Vec<(StreamRef, usize)>,
}

impl AusgabePuffer {
    fn neu(frame_groesse: usize) -> Self {
        Self {
            misch: vec![0.0; frame_groesse],
            kanal: vec![0.0; frame_groesse],
            effekt: vec![0.0; frame_groesse],
            kopfhoerer_frequenzen: Vec::new(),
            kandidaten: Vec::new(),
            frames: Vec::new(),
            gezogen: Vec::new(),
        }
    }
}

/// Zustand, den der Kodier-Callback braucht
struct Sendepfad {
    kanal: RwLock<Option<Arc<UdpChannel>>>,
    callsign: RwLock<String>,
    ptt: AtomicBool,
    letzter_ptt: AtomicBool,
    sequenz: AtomicU32,
}

impl Sendepfad {
    /// Haengt Transceiver, Sequenz und Callsign an und sendet "AT"
    fn komprimiert_senden(&self, radios: &Mutex<BTreeMap<FrequenzHz, RadioState>>, audio: &[u8]) {
        let ptt = self.ptt.load(Ordering::Acquire);
        self.letzter_ptt.store(ptt, Ordering::Release);
        let sequenz = self.sequenz.fetch_add(1, Ordering::AcqRel);

        let Some(kanal) = self.kanal.read().clone() else {
            trace!(sequenz, "Kein Kanal, Sprachframe verworfen");
            return;
        };
        if !kanal.ist_verbunden() {
            trace!(sequenz, "Kanal geschlossen, Sprachframe verworfen");
            return;
        }

        let transceivers = radios
            .lock()
            .values()
            .filter(|r| r.tx)
            .flat_map(|r| r.transceiver_ids.iter().map(|id| TxTransceiver { id: *id }))
            .collect();

        let dto = AudioTxOnTransceivers {
            callsign: self.callsign.read().clone(),
            sequence_counter: sequenz,
            audio: audio.to_vec(),
            last_packet: !ptt,
            transceivers,
        };
        if !kanal.send_dto(&dto) {
            debug!(sequenz, "Sprachframe nicht gesendet");
        }
    }
}

struct MikrofonPfad {
    sink: VoiceEncodeSink,
    filter: Option<EingangsFilter>,
    puffer: Vec<f32>,
}

/// Mischengine fuer alle Funkgeraete einer Station
pub struct RadioStack {
    params: SitzungsParameter,
    frame_groesse: usize,
    ressourcen: Arc<EffektRessourcen>,
    radios: Arc<Mutex<BTreeMap<FrequenzHz, RadioState>>>,
    streams: Mutex<HashMap<String, StreamRef>>,
    headset: Mutex<AusgabePuffer>,
    lautsprecher: Mutex<AusgabePuffer>,
    sender: Arc<Sendepfad>,
    mikrofon: Mutex<MikrofonPfad>,
    vu: Mutex<RollingAverage>,
    rt: AtomicBool,
    eingehende_streams: AtomicU32,
    position: RwLock<ClientPosition>,
    event_tx: Sender<RadioEvent>,
    event_rx: Receiver<RadioEvent>,
    span: tracing::Span,
}

impl RadioStack {
    pub fn neu(
        params: SitzungsParameter,
        callsign: impl Into<String>,
        ressourcen: Arc<EffektRessourcen>,
        span: tracing::Span,
    ) -> AudioResult<Self> {
        params.validieren()?;
        let frame_groesse = params.frame_groesse();

        let radios = Arc::new(Mutex::new(BTreeMap::new()));
        let sender = Arc::new(Sendepfad {
            kanal: RwLock::new(None),
            callsign: RwLock::new(callsign.into()),
            ptt: AtomicBool::new(false),
            letzter_ptt: AtomicBool::new(false),
            sequenz: AtomicU32::new(0),
        });

        let mut sink = VoiceEncodeSink::neu(&params)?;
        {
            let radios = Arc::clone(&radios);
            let sender = Arc::clone(&sender);
            sink.callback_setzen(Box::new(move |daten| {
                sender.komprimiert_senden(&radios, daten);
            }));
        }

        let vu_fenster = (VU_FENSTER_MS / params.frame_laenge_ms).max(1) as usize;
        let (event_tx, event_rx) = bounded(EVENT_KAPAZITAET);

        span.in_scope(|| {
            info!(
                sample_rate = params.sample_rate_hz,
                frame_groesse, "RadioStack erstellt"
            );
        });

        Ok(Self {
            frame_groesse,
            ressourcen,
            radios,
            streams: Mutex::new(HashMap::new()),
            headset: Mutex::new(AusgabePuffer::neu(frame_groesse)),
            lautsprecher: Mutex::new(AusgabePuffer::neu(frame_groesse)),
            sender,
            mikrofon: Mutex::new(MikrofonPfad {
                sink,
                filter: None,
                puffer: vec![0.0; frame_groesse],
            }),
            vu: Mutex::new(RollingAverage::neu(vu_fenster, PEGEL_MINIMUM_DB)),
            rt: AtomicBool::new(false),
            eingehende_streams: AtomicU32::new(0),
            position: RwLock::new(ClientPosition::default()),
            event_tx,
            event_rx,
            span,
            params,
        })
    }

    /// Mit synthetischen Effekt-Samples und eigenem Span
    pub fn standard(params: SitzungsParameter, callsign: &str) -> AudioResult<Self> {
        let ressourcen = Arc::new(EffektRessourcen::synthetisieren(params.sample_rate_hz));
        let span = tracing::info_span!("radio_stack", callsign = %callsign);
        Self::neu(params, callsign, ressourcen, span)
    }

    pub fn params(&self) -> &SitzungsParameter {
        &self.params
    }

    // -----------------------------------------------------------------------
    // Geraete-Konfiguration
    // -----------------------------------------------------------------------

    /// Legt ein Geraet an (oder setzt es zurueck): Empfang an, Senden aus
    pub fn frequenz_hinzufuegen(&self, frequenz: FrequenzHz, on_headset: bool) {
        let mut radios = self.radios.lock();
        let radio = radios
            .entry(frequenz)
            .or_insert_with(|| RadioState::neu(frequenz, self.params.sample_rate_hz));
        radio.on_headset = on_headset;
        radio.tx = false;
        radio.rx = true;
        radio.effekte_umgehen = false;
        self.span
            .in_scope(|| debug!(frequenz, on_headset, "Frequenz hinzugefuegt"));
    }

    pub fn hat_frequenz(&self, frequenz: FrequenzHz) -> bool {
        self.radios.lock().contains_key(&frequenz)
    }

    pub fn frequenzen(&self) -> Vec<FrequenzHz> {
        self.radios.lock().keys().copied().collect()
    }

    /// Wendet `f` auf ein vorhandenes Geraet an; `false` wenn unbekannt
    fn radio_aendern(&self, frequenz: FrequenzHz, f: impl FnOnce(&mut RadioState)) -> bool {
        match self.radios.lock().get_mut(&frequenz) {
            Some(radio) => {
                f(radio);
                true
            }
            None => false,
        }
    }

    pub fn gain_setzen(&self, frequenz: FrequenzHz, gain: f32) -> bool {
        self.radio_aendern(frequenz, |r| r.gain = gain.max(0.0))
    }

    pub fn on_headset_setzen(&self, frequenz: FrequenzHz, on_headset: bool) -> bool {
        self.radio_aendern(frequenz, |r| r.on_headset = on_headset)
    }

    pub fn effekte_umgehen_setzen(&self, frequenz: FrequenzHz, umgehen: bool) -> bool {
        self.radio_aendern(frequenz, |r| r.effekte_umgehen = umgehen)
    }

    pub fn hf_squelch_setzen(&self, frequenz: FrequenzHz, squelch: bool) -> bool {
        self.radio_aendern(frequenz, |r| r.hf_squelch = squelch)
    }

    /// Funkeffekte fuer alle Geraete ein- oder ausschalten
    pub fn ausgabe_effekte_setzen(&self, aktiv: bool) {
        for radio in self.radios.lock().values_mut() {
            radio.effekte_umgehen = !aktiv;
        }
    }

    /// Senden auf einer Frequenz; ohne Senden und Empfangen wird das Geraet entfernt
    pub fn tx_setzen(&self, frequenz: FrequenzHz, tx: bool) {
        let mut radios = self.radios.lock();
        let rx = radios.get(&frequenz).is_some_and(|r| r.rx);
        if !tx && !rx {
            if radios.remove(&frequenz).is_some() {
                self.span.in_scope(|| debug!(frequenz, "Frequenz entfernt"));
            }
            return;
        }
        radios
            .entry(frequenz)
            .or_insert_with(|| RadioState::neu(frequenz, self.params.sample_rate_hz))
            .tx = tx;
    }

    /// Empfang auf einer Frequenz; ohne Senden und Empfangen wird das Geraet entfernt
    pub fn rx_setzen(&self, frequenz: FrequenzHz, rx: bool) {
        let mut radios = self.radios.lock();
        let tx = radios.get(&frequenz).is_some_and(|r| r.tx);
        if !rx && !tx {
            if radios.remove(&frequenz).is_some() {
                self.span.in_scope(|| debug!(frequenz, "Frequenz entfernt"));
            }
            return;
        }
        radios
            .entry(frequenz)
            .or_insert_with(|| RadioState::neu(frequenz, self.params.sample_rate_hz))
            .rx = rx;
    }

    /// Ersetzt die Transceiver einer Frequenz; IDs vergibt `transceiver_dto_erstellen`
    pub fn transceiver_setzen(&self, frequenz: FrequenzHz, transceiver: &[StationTransceiver]) -> bool {
        self.radio_aendern(frequenz, |r| {
            r.transceiver = transceiver
                .iter()
                .map(|t| t.als_transceiver(frequenz))
                .collect();
            r.transceiver_ids.clear();
        })
    }

    pub fn position_setzen(&self, position: ClientPosition) {
        *self.position.write() = position;
    }

    pub fn callsign_setzen(&self, callsign: impl Into<String>) {
        *self.sender.callsign.write() = callsign.into();
    }

    /// Flache Transceiver-Liste mit fortlaufenden IDs
    ///
    /// Geraete ohne Stations-Transceiver melden die Client-Position. Die
    /// vergebenen IDs werden in ausgehende Sprachpakete eingetragen.
    pub fn transceiver_dto_erstellen(&self) -> Vec<TransceiverDto> {
        let position = *self.position.read();
        let mut radios = self.radios.lock();
        let mut liste = Vec::new();
        let mut id: u16 = 0;

        for radio in radios.values_mut() {
            radio.transceiver_ids.clear();
            if radio.transceiver.is_empty() {
                liste.push(TransceiverDto {
                    id,
                    frequency: radio.frequenz,
                    lat_deg: position.lat_deg,
                    lon_deg: position.lon_deg,
                    height_msl_m: position.height_msl_m,
                    height_agl_m: position.height_agl_m,
                });
                radio.transceiver_ids.push(id);
                id = id.wrapping_add(1);
            } else {
                for transceiver in radio.transceiver.iter_mut() {
                    transceiver.id = id;
                    liste.push(transceiver.clone());
                    radio.transceiver_ids.push(id);
                    id = id.wrapping_add(1);
                }
            }
        }
        liste
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn letzter_sender(&self, frequenz: FrequenzHz) -> Option<String> {
        self.radios
            .lock()
            .get(&frequenz)
            .and_then(|r| r.letzter_sender.clone())
    }

    /// Ob im letzten Tick auf der Frequenz empfangen wurde
    pub fn rx_aktiv(&self, frequenz: FrequenzHz) -> bool {
        self.radios
            .lock()
            .get(&frequenz)
            .is_some_and(|r| r.letzte_rx_anzahl > 0)
    }

    /// Ob auf der Frequenz gerade gesendet wird
    pub fn tx_aktiv(&self, frequenz: FrequenzHz) -> bool {
        let tx = self.radios.lock().get(&frequenz).is_some_and(|r| r.tx);
        tx && self.sender.ptt.load(Ordering::Acquire)
    }

    /// VU-Pegel des Mikrofons in dBFS
    pub fn vu(&self) -> f64 {
        self.vu.lock().mittelwert().max(PEGEL_MINIMUM_DB)
    }

    /// Spitzenpegel des Mikrofons im VU-Fenster in dBFS
    pub fn peak(&self) -> f64 {
        self.vu.lock().maximum().max(PEGEL_MINIMUM_DB)
    }

    /// Streams, die im letzten Tick einen Frame geliefert haben
    pub fn eingehende_streams(&self) -> u32 {
        self.eingehende_streams.load(Ordering::Acquire)
    }

    pub fn stream_anzahl(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn tx_sequenz(&self) -> u32 {
        self.sender.sequenz.load(Ordering::Acquire)
    }

    /// Empfaenger fuer RX-Ereignisse; mehrere Empfaenger teilen sich die Ereignisse
    pub fn event_empfaenger(&self) -> Receiver<RadioEvent> {
        self.event_rx.clone()
    }

    // -----------------------------------------------------------------------
    // Steuerung
    // -----------------------------------------------------------------------

    pub fn ptt_setzen(&self, gedrueckt: bool) {
        self.sender.ptt.store(gedrueckt, Ordering::Release);
    }

    pub fn ptt(&self) -> bool {
        self.sender.ptt.load(Ordering::Acquire)
    }

    /// RT: Headset-Geraete zusaetzlich auf den Lautsprecher legen
    pub fn rt_setzen(&self, aktiv: bool) {
        self.rt.store(aktiv, Ordering::Release);
    }

    /// Noise Gate + AGC vor dem Encoder
    pub fn eingangsfilter_setzen(&self, aktiv: bool) {
        let mut mikrofon = self.mikrofon.lock();
        match (aktiv, mikrofon.filter.is_some()) {
            (true, false) => {
                mikrofon.filter = Some(EingangsFilter::neu(
                    self.params.sample_rate_hz,
                    self.frame_groesse,
                ));
            }
            (false, true) => mikrofon.filter = None,
            _ => {}
        }
    }

    pub fn eingangsfilter_aktiv(&self) -> bool {
        self.mikrofon.lock().filter.is_some()
    }

    /// Bindet den UDP-Kanal; der "AR"-Handler wandert vom alten zum neuen Kanal
    pub fn kanal_setzen(self: &Arc<Self>, kanal: Option<Arc<UdpChannel>>) {
        let mut aktuell = self.sender.kanal.write();
        if let Some(alt) = aktuell.take() {
            alt.dto_handler_entfernen(AudioRxOnTransceivers::NAME);
        }
        if let Some(neu) = &kanal {
            let stack = Arc::downgrade(self);
            neu.dto_empfaenger_registrieren(move |dto: AudioRxOnTransceivers| {
                if let Some(stack) = stack.upgrade() {
                    stack.rx_sprachpaket(&dto);
                }
            });
        }
        *aktuell = kanal;
    }

    /// Verwirft alle Streams und den Sendezustand
    pub fn zuruecksetzen(&self) {
        self.streams.lock().clear();
        self.sender.sequenz.store(0, Ordering::Release);
        self.sender.ptt.store(false, Ordering::Release);
        self.sender.letzter_ptt.store(false, Ordering::Release);
        if let Err(e) = self.mikrofon.lock().sink.zuruecksetzen() {
            self.span
                .in_scope(|| warn!(fehler = %e, "Encoder-Reset fehlgeschlagen"));
        }
    }

    /// Entfernt Streams ohne Pakete seit `stream_timeout_ms`; gibt die Anzahl zurueck
    pub fn wartung(&self) -> usize {
        let timeout = Duration::from_millis(self.params.stream_timeout_ms);
        let _guard = self.span.enter();
        let mut streams = self.streams.lock();
        let vorher = streams.len();
        streams.retain(|callsign, stream| {
            let behalten = stream.lock().quelle.letzte_aktivitaet().elapsed() <= timeout;
            if !behalten {
                debug!(callsign = %callsign, "Inaktiven Stream entfernt");
            }
            behalten
        });
        vorher - streams.len()
    }

    // -----------------------------------------------------------------------
    // Empfang
    // -----------------------------------------------------------------------

    /// Nimmt ein Sprachpaket an, wenn eine seiner Frequenzen empfangen wird
    pub fn rx_sprachpaket(&self, dto: &AudioRxOnTransceivers) -> bool {
        let _guard = self.span.enter();

        let mut hoert_zu = false;
        {
            let mut radios = self.radios.lock();
            for transceiver in &dto.transceivers {
                if let Some(radio) = radios.get_mut(&transceiver.frequency) {
                    if radio.rx {
                        radio.letzter_sender = Some(dto.callsign.clone());
                        hoert_zu = true;
                        break;
                    }
                }
            }
        }
        if !hoert_zu {
            trace!(callsign = %dto.callsign, "Kein Empfang auf den Frequenzen des Pakets");
            return false;
        }

        let stream = {
            let mut streams = self.streams.lock();
            match streams.get(&dto.callsign) {
                Some(stream) => Arc::clone(stream),
                None => {
                    let span = tracing::debug_span!("stream", callsign = %dto.callsign);
                    let quelle = match VoiceDecodeSource::neu(&self.params, span) {
                        Ok(q) => q,
                        Err(e) => {
                            warn!(callsign = %dto.callsign, fehler = %e, "Decoder nicht erstellt");
                            return false;
                        }
                    };
                    let stream = Arc::new(Mutex::new(StreamEintrag {
                        quelle,
                        transceiver: Vec::new(),
                    }));
                    streams.insert(dto.callsign.clone(), Arc::clone(&stream));
                    debug!(callsign = %dto.callsign, "Neuer Stream");
                    stream
                }
            }
        };

        let mut eintrag = stream.lock();
        eintrag.quelle.audio_dto_anhaengen(dto);
        eintrag.transceiver.clone_from(&dto.transceivers);
        true
    }

    // -----------------------------------------------------------------------
    // Ausgabe
    // -----------------------------------------------------------------------

    /// Mischt einen Frame fuer die Ausgabe
    ///
    /// Liefert immer `Ok` (ggf. Stille), ausser bei falscher Puffergroesse.
    pub fn get_audio_frame(&self, ausgabe: Ausgabe, puffer: &mut [f32]) -> SourceStatus {
        if puffer.len() != self.frame_groesse {
            puffer.fill(0.0);
            self.span.in_scope(|| {
                warn!(
                    erwartet = self.frame_groesse,
                    erhalten = puffer.len(),
                    "Ausgabepuffer mit falscher Groesse"
                );
            });
            return SourceStatus::Error;
        }

        let headset = ausgabe.ist_headset();
        let rt = self.rt.load(Ordering::Acquire);
        let mut zustand = match ausgabe {
            Ausgabe::Headset => self.headset.lock(),
            Ausgabe::Lautsprecher => self.lautsprecher.lock(),
        };
        let zustand = &mut *zustand;

        // Streams werden nach dem ersten Transceiver geroutet
        zustand.kopfhoerer_frequenzen.clear();
        zustand.kopfhoerer_frequenzen.extend(
            self.radios
                .lock()
                .values()
                .filter(|r| r.on_headset)
                .map(|r| r.frequenz),
        );
        zustand.kandidaten.clear();
        zustand
            .kandidaten
            .extend(self.streams.lock().values().cloned());

        self.streams_ziehen(zustand, headset, rt);

        zustand.misch.fill(0.0);
        {
            let ptt = self.sender.ptt.load(Ordering::Acquire);
            let mut radios = self.radios.lock();
            for radio in radios.values_mut() {
                if hoerbar(radio.on_headset, headset, rt) {
                    self.radio_mischen(radio, zustand, ptt);
                }
            }
        }

        zustand.gezogen.clear();
        zustand.kandidaten.clear();
        puffer.copy_from_slice(&zustand.misch);
        SourceStatus::Ok
    }

    /// Zieht pro Tick genau einen Frame aus jedem hoerbaren, aktiven Stream
    fn streams_ziehen(&self, zustand: &mut AusgabePuffer, headset: bool, rt: bool) {
        let AusgabePuffer {
            kopfhoerer_frequenzen,
            kandidaten,
            frames,
            gezogen,
            ..
        } = zustand;
        gezogen.clear();

        for stream in kandidaten.iter() {
            let mut eintrag = stream.lock();
            let Some(frequenz) = eintrag.transceiver.first().map(|t| t.frequency) else {
                continue;
            };
            if frequenz == 0 {
                continue;
            }
            let auf_headset = kopfhoerer_frequenzen.contains(&frequenz);
            if !hoerbar(auf_headset, headset, rt) || !eintrag.quelle.ist_aktiv() {
                continue;
            }

            let index = gezogen.len();
            if frames.len() <= index {
                frames.push(vec![0.0; self.frame_groesse]);
            }
            // Nicht-Ok: fuer diesen Tick Stille, kein zweiter Versuch
            if eintrag.quelle.get_frame(&mut frames[index]) == SourceStatus::Ok {
                gezogen.push((Arc::clone(stream), index));
            }
        }
        self.eingehende_streams
            .store(gezogen.len() as u32, Ordering::Release);
    }

    fn radio_mischen(&self, radio: &mut RadioState, zustand: &mut AusgabePuffer, ptt: bool) {
        let AusgabePuffer {
            misch,
            kanal,
            effekt,
            frames,
            gezogen,
            ..
        } = zustand;
        kanal.fill(0.0);

        // Eigene Aussendung wird nicht mitgehoert
        if ptt && radio.tx {
            radio.effekte_zuruecksetzen(false);
            return;
        }

        let frequenz = radio.frequenz;
        let gain = radio.gain;
        let umgehen = radio.effekte_umgehen;
        let mut knack_gain = 0.0f32;
        let mut vhf_gain = 0.0f32;
        let mut hf_gain = 0.0f32;
        let mut ac_bus_gain = 0.0f32;
        let mut anzahl = 0u32;

        for (stream, index) in gezogen.iter() {
            let distanz = stream
                .lock()
                .transceiver
                .iter()
                .find(|t| t.frequency == frequenz)
                .map(|t| t.distance_ratio);
            let Some(distanz) = distanz else {
                continue;
            };

            let mut sprach_gain = 1.0f32;
            if !umgehen {
                if ist_hf(frequenz) {
                    hf_gain = if radio.hf_squelch { 0.0 } else { HF_RAUSCHEN_GAIN };
                    vhf_gain = 0.0;
                    ac_bus_gain = AC_BUS_GAIN_HF;
                    sprach_gain = HF_SPRACH_GAIN;
                } else {
                    let faktor = knack_faktor(distanz);
                    vhf_gain = VHF_RAUSCHEN_GAIN;
                    ac_bus_gain = AC_BUS_GAIN_VHF;
                    knack_gain += 2.0 * faktor;
                    sprach_gain = 1.0 - 3.7 * faktor;
                }
            }
            mischen(kanal, &frames[*index], sprach_gain * gain);
            anzahl += 1;
        }

        if anzahl > 0 {
            if radio.letzte_rx_anzahl == 0 {
                self.event_senden(RadioEvent::RxOffen { frequenz });
            }
            let fx = &mut radio.effekte;
            if !umgehen {
                fx.kette_anwenden(kanal);
                let r = &self.ressourcen;
                bett_mischen(&mut fx.knacken, &r.knacken, knack_gain * gain, kanal, effekt);
                bett_mischen(&mut fx.hf_rauschen, &r.hf_rauschen, hf_gain * gain, kanal, effekt);
                bett_mischen(&mut fx.vhf_rauschen, &r.vhf_rauschen, vhf_gain * gain, kanal, effekt);
                bett_mischen(&mut fx.ac_bus, &r.ac_bus, ac_bus_gain * gain, kanal, effekt);
            }
            if anzahl > 1 {
                if fx.blockton.is_none() {
                    fx.blockton = Some(EffektGenerator::Ton(SineTone::neu(
                        BLOCKTON_HZ,
                        self.params.sample_rate_hz,
                    )));
                }
                effekt_mischen(&mut fx.blockton, BLOCKTON_GAIN * gain, kanal, effekt);
            } else {
                fx.blockton = None;
            }
        } else {
            radio.effekte_zuruecksetzen(true);
            if radio.letzte_rx_anzahl > 0 {
                radio.effekte.klick = Some(EffektGenerator::Aufnahme(RecordedSample::neu(
                    Arc::clone(&self.ressourcen.klick),
                    false,
                )));
                self.event_senden(RadioEvent::RxGeschlossen { frequenz });
            }
        }
        radio.letzte_rx_anzahl = anzahl;

        effekt_mischen(&mut radio.effekte.klick, KLICK_GAIN * gain, kanal, effekt);
        mischen(misch, kanal, 1.0);
    }

    fn event_senden(&self, event: RadioEvent) {
        self.span.in_scope(|| debug!(?event, "Radio-Ereignis"));
        // Audio-Thread blockiert nie; ohne Leser gehen Ereignisse verloren
        if self.event_tx.try_send(event).is_err() {
            trace!(?event, "Ereignis-Kanal voll");
        }
    }

    // -----------------------------------------------------------------------
    // Mikrofon
    // -----------------------------------------------------------------------

    /// Nimmt einen Mikrofon-Frame an
    ///
    /// Ohne PTT im aktuellen und letzten Frame wird nur die Sendesequenz
    /// weitergezaehlt, damit die Gegenseite im Takt bleibt.
    pub fn put_audio_frame(&self, pcm: &[f32]) {
        if pcm.len() != self.frame_groesse {
            self.span.in_scope(|| {
                warn!(
                    erwartet = self.frame_groesse,
                    erhalten = pcm.len(),
                    "Mikrofon-Frame mit falscher Groesse"
                );
            });
            return;
        }

        let spitze_db = (20.0 * (spitzenwert(pcm) as f64).log10()).clamp(PEGEL_MINIMUM_DB, 0.0);
        self.vu.lock().hinzufuegen(spitze_db);

        let ptt = self.sender.ptt.load(Ordering::Acquire);
        let letzter_ptt = self.sender.letzter_ptt.load(Ordering::Acquire);
        if !ptt && !letzter_ptt {
            self.sender.sequenz.fetch_add(1, Ordering::AcqRel);
            return;
        }

        let mut mikrofon = self.mikrofon.lock();
        let MikrofonPfad {
            sink,
            filter,
            puffer,
        } = &mut *mikrofon;
        // Neue Aussendung: keine Praediktion aus der letzten mitnehmen
        if ptt && !letzter_ptt {
            if let Err(e) = sink.zuruecksetzen() {
                self.span
                    .in_scope(|| warn!(fehler = %e, "Encoder-Reset fehlgeschlagen"));
            }
        }
        match filter {
            Some(filter) => {
                puffer.copy_from_slice(pcm);
                filter.verarbeiten(puffer);
                sink.put_frame(puffer);
            }
            None => sink.put_frame(pcm),
        }
    }

    /// Pull-Quelle fuer ein Ausgabegeraet
    pub fn ausgabe_quelle(self: &Arc<Self>, ausgabe: Ausgabe) -> AusgabeQuelle {
        AusgabeQuelle {
            stack: Arc::clone(self),
            ausgabe,
        }
    }

    /// Push-Senke fuer das Mikrofon
    pub fn mikrofon_senke(self: &Arc<Self>) -> MikrofonSenke {
        MikrofonSenke {
            stack: Arc::clone(self),
        }
    }
}

/// Legt bei Bedarf ein Rauschbett als Schleife an und mischt es
fn bett_mischen(
    slot: &mut Option<EffektGenerator>,
    daten: &Arc<Vec<f32>>,
    gain: f32,
    kanal: &mut [f32],
    effekt: &mut [f32],
) {
    if gain > 0.0 && slot.is_none() {
        *slot = Some(EffektGenerator::Aufnahme(RecordedSample::neu(
            Arc::clone(daten),
            true,
        )));
    }
    effekt_mischen(slot, gain, kanal, effekt);
}

/// Ausgabe des RadioStack als [`AudioSource`] fuer ein Geraete-Backend
pub struct AusgabeQuelle {
    stack: Arc<RadioStack>,
    ausgabe: Ausgabe,
}

impl AudioSource for AusgabeQuelle {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        self.stack.get_audio_frame(self.ausgabe, puffer)
    }
}

/// Mikrofon-Eingang des RadioStack als [`AudioSink`]
pub struct MikrofonSenke {
    stack: Arc<RadioStack>,
}

impl AudioSink for MikrofonSenke {
    fn put_frame(&mut self, puffer: &[f32]) {
        self.stack.put_audio_frame(puffer);
    }
}
