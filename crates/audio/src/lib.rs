//! airwave-audio – Funk-Mischengine
//!
//! Empfangs- und Sendepfad einer ATC-Station:
//! - Opus Encoding/Decoding
//! - Dekodierquelle pro entferntem Sprecher (Jitter Buffer + PLC)
//! - Kodiersenke fuer das Mikrofon
//! - Funkeffekte: VHF-Filter, Kompressor, Rauschbetten, Block-Ton, Klick
//! - Mikrofon-Eingangsfilter (Noise Gate + AGC)
//! - VU-/Spitzenmessung
//! - [`RadioStack`]: Mischung pro Frequenz und Ausgabe

pub mod codec;
pub mod decode_source;
pub mod dsp;
pub mod encode_sink;
pub mod error;
pub mod metering;
pub mod radio;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{OpusDecoder, OpusEncoder};
pub use decode_source::VoiceDecodeSource;
pub use dsp::{AudioProcessor, EffektRessourcen, EingangsFilter};
pub use encode_sink::{KomprimiertCallback, VoiceEncodeSink};
pub use error::{AudioError, AudioResult};
pub use metering::RollingAverage;
pub use radio::{AusgabeQuelle, ClientPosition, MikrofonSenke, RadioStack};
